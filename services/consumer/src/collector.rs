//! Result collection.
//!
//! Reads result messages until the end-of-stream sentinel and writes each
//! successful message to the CSV file of its location. A run replaces files
//! left by earlier runs and appends results that share a location.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use metrics::counter;
use sim_common::{CorrelationKey, InboundMessage, ResultMessage};
use storage::{ResultSource, StorageError};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::output::render_blocks;

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Failed to create output directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport failure: {0}")]
    Transport(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Reading,
    Done,
}

/// Counters of one collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    pub received: u64,
    /// Messages carrying worker errors
    pub failed: u64,
    /// Messages answering nodata jobs
    pub nodata: u64,
    /// Messages whose key has no spatial identity
    pub unaddressed: u64,
    /// Results written, counting appends to the same file
    pub written: u64,
}

/// Path of the output file for a key, `<out>/<setup_id>/<stem>.csv`.
pub fn output_path(out_dir: &Path, key: &CorrelationKey) -> Option<PathBuf> {
    let spatial = key.spatial_id()?;
    Some(
        out_dir
            .join(key.setup_id.to_string())
            .join(format!("{}.csv", spatial.file_stem())),
    )
}

pub struct ResultCollector {
    out_dir: PathBuf,
    created_dirs: HashSet<u32>,
    /// Files written in this run. The first write to a file replaces
    /// whatever an earlier run left there, later writes append.
    written_files: HashSet<PathBuf>,
    state: CollectorState,
    stats: CollectorStats,
}

impl ResultCollector {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            created_dirs: HashSet::new(),
            written_files: HashSet::new(),
            state: CollectorState::Reading,
            stats: CollectorStats::default(),
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn stats(&self) -> CollectorStats {
        self.stats
    }

    /// Read from `source` until it reports the end of the stream.
    pub async fn run<R: ResultSource>(
        &mut self,
        source: &mut R,
    ) -> Result<CollectorStats, CollectorError> {
        info!(out_dir = %self.out_dir.display(), "Collecting results");

        while self.state == CollectorState::Reading {
            match source.next_message().await? {
                InboundMessage::Result(msg) => self.handle(&msg).await?,
                InboundMessage::Done => {
                    self.state = CollectorState::Done;
                }
            }
        }

        info!(
            received = self.stats.received,
            failed = self.stats.failed,
            nodata = self.stats.nodata,
            unaddressed = self.stats.unaddressed,
            written = self.stats.written,
            "Result stream finished"
        );
        Ok(self.stats)
    }

    /// Handle a single result message.
    pub async fn handle(&mut self, msg: &ResultMessage) -> Result<(), CollectorError> {
        let key = &msg.custom_id;
        self.stats.received += 1;
        counter!("consumer_messages_total").increment(1);

        if msg.has_errors() {
            self.stats.failed += 1;
            counter!("consumer_messages_failed_total").increment(1);
            for error in &msg.errors {
                warn!(setup_id = key.setup_id, env_id = key.env_id, error = %error, "Worker reported an error");
            }
            return Ok(());
        }

        if key.nodata {
            self.stats.nodata += 1;
            debug!(setup_id = key.setup_id, env_id = key.env_id, "Nodata result");
            return Ok(());
        }

        let Some(path) = output_path(&self.out_dir, key) else {
            self.stats.unaddressed += 1;
            warn!(setup_id = key.setup_id, env_id = key.env_id, "Result has no location, skipping");
            return Ok(());
        };

        self.ensure_setup_dir(key.setup_id).await?;

        let text = render_blocks(&msg.data);
        let first_write = !self.written_files.contains(&path);
        write_result(&path, text.as_bytes(), first_write)
            .await
            .map_err(|source| CollectorError::Write {
                path: path.clone(),
                source,
            })?;
        self.written_files.insert(path.clone());

        self.stats.written += 1;
        counter!("consumer_files_written_total").increment(1);
        debug!(setup_id = key.setup_id, env_id = key.env_id, path = %path.display(), "Wrote result");
        Ok(())
    }

    async fn ensure_setup_dir(&mut self, setup_id: u32) -> Result<(), CollectorError> {
        if self.created_dirs.contains(&setup_id) {
            return Ok(());
        }

        let path = self.out_dir.join(setup_id.to_string());
        fs::create_dir_all(&path)
            .await
            .map_err(|source| CollectorError::CreateDir {
                path: path.clone(),
                source,
            })?;
        info!(setup_id, path = %path.display(), "Created output directory");
        self.created_dirs.insert(setup_id);
        Ok(())
    }
}

async fn write_result(path: &Path, bytes: &[u8], truncate: bool) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.create(true);
    if truncate {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.flush().await
}
