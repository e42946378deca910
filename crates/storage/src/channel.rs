//! Channel traits and the in-process implementation.
//!
//! The producer writes serialized jobs to a [`JobSink`]; the consumer reads
//! worker results from a [`ResultSource`] until it yields
//! [`InboundMessage::Done`].

use async_trait::async_trait;
use sim_common::{InboundMessage, ResultMessage};
use tokio::sync::mpsc;

use crate::error::{Result, StorageError};

/// A serialized job ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundJob {
    /// Human readable id, e.g. `3-117`
    pub id: String,
    /// JSON body
    pub payload: String,
}

/// Outbound job channel.
#[async_trait]
pub trait JobSink: Send {
    /// Send a job, waiting until the channel has room for it.
    async fn send(&mut self, job: OutboundJob) -> Result<()>;

    /// Send a job without waiting for room. Sinks that cannot skip the
    /// wait send as usual.
    async fn push(&mut self, job: OutboundJob) -> Result<()> {
        self.send(job).await
    }

    /// Signal that no more jobs follow.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Inbound result channel.
#[async_trait]
pub trait ResultSource: Send {
    /// Next message. Returns [`InboundMessage::Done`] once the stream ends
    /// and keeps returning it afterwards.
    async fn next_message(&mut self) -> Result<InboundMessage>;
}

/// Bounded in-process job channel.
pub fn job_channel(capacity: usize) -> (ChannelJobSink, mpsc::Receiver<OutboundJob>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ChannelJobSink { tx: Some(tx) }, rx)
}

/// Bounded in-process result channel. Dropping every sender ends the stream.
pub fn result_channel(capacity: usize) -> (mpsc::Sender<ResultMessage>, ChannelResultSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ChannelResultSource { rx })
}

pub struct ChannelJobSink {
    tx: Option<mpsc::Sender<OutboundJob>>,
}

#[async_trait]
impl JobSink for ChannelJobSink {
    async fn send(&mut self, job: OutboundJob) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(StorageError::ChannelClosed)?;
        tx.send(job).await.map_err(|_| StorageError::ChannelClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

pub struct ChannelResultSource {
    rx: mpsc::Receiver<ResultMessage>,
}

#[async_trait]
impl ResultSource for ChannelResultSource {
    async fn next_message(&mut self) -> Result<InboundMessage> {
        Ok(match self.rx.recv().await {
            Some(msg) => InboundMessage::Result(Box::new(msg)),
            None => InboundMessage::Done,
        })
    }
}
