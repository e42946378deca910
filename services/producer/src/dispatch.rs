//! Job dispatch onto the outbound channel.
//!
//! Delivery is at most once: a job counts as sent once the channel has
//! accepted it, nothing is acknowledged by the workers.

use environment::{EnvironmentError, EnvironmentJob};
use metrics::counter;
use sim_common::CorrelationKey;
use storage::{JobSink, OutboundJob, StorageError};
use thiserror::Error;
use tracing::debug;

use crate::config::DispatchMode;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to serialize job {id}: {source}")]
    Serialize {
        id: String,
        #[source]
        source: EnvironmentError,
    },

    #[error("Transport failure: {0}")]
    Transport(#[from] StorageError),
}

/// Serializes jobs and writes them to a [`JobSink`].
pub struct JobDispatcher<J> {
    sink: J,
    mode: DispatchMode,
    sent: u64,
}

impl<J: JobSink> JobDispatcher<J> {
    pub fn new(sink: J, mode: DispatchMode) -> Self {
        Self {
            sink,
            mode,
            sent: 0,
        }
    }

    /// Wire id of a job, `<setup_id>-<env_id>`.
    pub fn job_id(key: &CorrelationKey) -> String {
        format!("{}-{}", key.setup_id, key.env_id)
    }

    /// Send one job. In awaited mode this returns only once the channel
    /// has accepted the job.
    pub async fn dispatch(&mut self, job: &EnvironmentJob) -> Result<(), DispatchError> {
        let id = Self::job_id(&job.custom_id);
        let payload = job.to_json().map_err(|source| DispatchError::Serialize {
            id: id.clone(),
            source,
        })?;

        debug!(job_id = %id, nodata = job.is_nodata(), bytes = payload.len(), "Dispatching job");
        let outbound = OutboundJob { id, payload };
        match self.mode {
            DispatchMode::Awaited => self.sink.send(outbound).await?,
            DispatchMode::FireAndForget => self.sink.push(outbound).await?,
        }

        self.sent += 1;
        counter!("producer_jobs_sent_total").increment(1);
        Ok(())
    }

    /// Tell the workers that no more jobs follow.
    pub async fn finish(&mut self) -> Result<(), DispatchError> {
        self.sink.close().await?;
        Ok(())
    }

    /// Jobs accepted by the channel so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }
}
