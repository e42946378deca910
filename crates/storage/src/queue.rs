//! Redis Streams-based job and result queues.
//!
//! Jobs are appended to the jobs stream as `kind=job job_id=<id> data=<json>`
//! entries. Workers read them through the `jobs_group` consumer group and
//! acknowledge each job once taken, so the group's lag plus its pending
//! count is the backlog awaited sends wait on.
//!
//! Workers append results to the results stream as `kind=result data=<json>`
//! and finish it with a single `kind=done` entry. The collector reads through
//! the `results_group` consumer group, so every run only sees entries no
//! earlier run has acknowledged.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, streams::*, AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use sim_common::{InboundMessage, ResultMessage};
use tracing::{debug, info, warn};

use crate::channel::{JobSink, OutboundJob, ResultSource};
use crate::error::{Result, StorageError};

const KIND_FIELD: &str = "kind";
const DATA_FIELD: &str = "data";
const JOB_ID_FIELD: &str = "job_id";

/// Read id for entries never delivered to the group.
const NEW_ENTRIES: &str = ">";
/// Read id for this consumer's delivered but unacknowledged entries.
const OWN_HISTORY: &str = "0";

/// Stream names and flow control settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub jobs_stream: String,
    pub results_stream: String,
    /// Consumer group the workers read jobs through
    pub jobs_group: String,
    /// Consumer group the collector reads results through
    pub results_group: String,
    /// Consumer name of the collector within `results_group`
    pub consumer_name: String,
    /// Jobs allowed in the backlog before awaited sends wait
    pub max_pending: u64,
    /// How often a waiting send checks the backlog, in milliseconds
    pub poll_interval_ms: u64,
    /// How long one result read blocks, in milliseconds
    pub block_ms: usize,
    /// Entries fetched per result read
    pub batch_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            jobs_stream: "crop:jobs".to_string(),
            results_stream: "crop:results".to_string(),
            jobs_group: "crop-workers".to_string(),
            results_group: "crop-collectors".to_string(),
            consumer_name: "collector".to_string(),
            max_pending: 1000,
            poll_interval_ms: 200,
            block_ms: 5000,
            batch_size: 100,
        }
    }
}

/// Connect to Redis, retrying at a fixed interval until the server answers.
///
/// With `max_attempts` set, gives up after that many failed attempts. An
/// unparseable URL fails immediately.
pub async fn connect_with_retry(
    redis_url: &str,
    interval: Duration,
    max_attempts: Option<u32>,
) -> Result<MultiplexedConnection> {
    let client = Client::open(redis_url)?;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => {
                info!(url = %redis_url, attempt, "Connected to Redis");
                return Ok(conn);
            }
            Err(e) => {
                if max_attempts.map_or(false, |max| attempt >= max) {
                    return Err(e.into());
                }
                warn!(
                    url = %redis_url,
                    attempt,
                    error = %e,
                    "Redis not reachable, retrying in {:?}",
                    interval
                );
                tokio::time::sleep(interval).await;
            }
        }
    }
}

/// Create a consumer group starting at new entries, and the stream with it.
/// An existing group keeps its position.
async fn ensure_group(conn: &mut MultiplexedConnection, stream: &str, group: &str) -> Result<()> {
    let created: redis::RedisResult<()> = conn.xgroup_create_mkstream(stream, group, "$").await;
    match created {
        Ok(()) => {
            info!(stream, group, "Created consumer group");
            Ok(())
        }
        Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Backpressure
// ============================================================================

/// Number of jobs queued but not yet finished by a worker.
#[async_trait]
pub trait QueueDepth: Send {
    async fn depth(&mut self) -> Result<u64>;
}

/// Wait until the queue depth drops below `max`. Returns the depth seen
/// last.
pub async fn wait_for_room<D: QueueDepth + ?Sized>(
    queue: &mut D,
    max: u64,
    poll: Duration,
) -> Result<u64> {
    loop {
        let depth = queue.depth().await?;
        if depth < max {
            return Ok(depth);
        }
        debug!(depth, max, "Job backlog full, waiting");
        tokio::time::sleep(poll).await;
    }
}

/// Backlog of a consumer group: entries not yet delivered plus entries
/// delivered but not acknowledged.
///
/// Servers before Redis 7 report no lag; the lag is then derived from the
/// group's read counter when `stream_len` is given, and taken as zero
/// otherwise.
pub fn group_backlog(group: &StreamInfoGroup, stream_len: Option<u64>) -> u64 {
    let lag = group
        .lag
        .map(|lag| lag as u64)
        .or_else(|| {
            let read = group.entries_read? as u64;
            stream_len.map(|len| len.saturating_sub(read))
        })
        .unwrap_or(0);
    lag + group.pending as u64
}

/// Jobs stream writer.
pub struct RedisJobSink {
    conn: MultiplexedConnection,
    config: StreamConfig,
}

impl RedisJobSink {
    /// Create the jobs consumer group if needed and return the sink.
    pub async fn open(mut conn: MultiplexedConnection, config: StreamConfig) -> Result<Self> {
        ensure_group(&mut conn, &config.jobs_stream, &config.jobs_group).await?;
        Ok(Self { conn, config })
    }

    /// Jobs not yet delivered to a worker or not yet acknowledged by one.
    pub async fn backlog(&mut self) -> Result<u64> {
        let reply: StreamInfoGroupsReply = self.conn.xinfo_groups(&self.config.jobs_stream).await?;
        let group = reply
            .groups
            .iter()
            .find(|g| g.name == self.config.jobs_group)
            .ok_or_else(|| StorageError::MissingGroup {
                stream: self.config.jobs_stream.clone(),
                group: self.config.jobs_group.clone(),
            })?;

        let stream_len = if group.lag.is_none() {
            let len: u64 = self.conn.xlen(&self.config.jobs_stream).await?;
            Some(len)
        } else {
            None
        };
        Ok(group_backlog(group, stream_len))
    }

    async fn append(&mut self, job: &OutboundJob) -> Result<String> {
        let entry_id: String = redis::cmd("XADD")
            .arg(&self.config.jobs_stream)
            .arg("*")
            .arg(KIND_FIELD)
            .arg("job")
            .arg(JOB_ID_FIELD)
            .arg(&job.id)
            .arg(DATA_FIELD)
            .arg(&job.payload)
            .query_async(&mut self.conn)
            .await?;
        Ok(entry_id)
    }
}

#[async_trait]
impl QueueDepth for RedisJobSink {
    async fn depth(&mut self) -> Result<u64> {
        self.backlog().await
    }
}

#[async_trait]
impl JobSink for RedisJobSink {
    async fn send(&mut self, job: OutboundJob) -> Result<()> {
        let max = self.config.max_pending;
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        wait_for_room(&mut *self, max, poll).await?;
        self.append(&job).await?;
        Ok(())
    }

    async fn push(&mut self, job: OutboundJob) -> Result<()> {
        self.append(&job).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let _: String = redis::cmd("XADD")
            .arg(&self.config.jobs_stream)
            .arg("*")
            .arg(KIND_FIELD)
            .arg("done")
            .query_async(&mut self.conn)
            .await?;
        Ok(())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Decoded messages of one read and the entry ids to acknowledge.
#[derive(Debug, Default)]
struct DecodedBatch {
    messages: Vec<InboundMessage>,
    ack_ids: Vec<String>,
}

/// Decode entries up to and including the first `done`. Entries after it
/// stay unacknowledged for the next run.
fn decode_batch(entries: &[StreamId]) -> DecodedBatch {
    let mut batch = DecodedBatch::default();
    for entry in entries {
        batch.ack_ids.push(entry.id.clone());
        match decode_entry(entry) {
            Ok(InboundMessage::Done) => {
                batch.messages.push(InboundMessage::Done);
                break;
            }
            Ok(msg) => batch.messages.push(msg),
            Err(e) => warn!(error = %e, "Dropping result entry"),
        }
    }
    batch
}

/// Results stream reader.
///
/// Starts with the entries this consumer was handed earlier but never
/// acknowledged, then reads entries new to the group.
pub struct RedisResultSource {
    conn: MultiplexedConnection,
    config: StreamConfig,
    read_id: &'static str,
    buffer: VecDeque<InboundMessage>,
    done: bool,
}

impl RedisResultSource {
    /// Create the results consumer group if needed and return the source.
    pub async fn open(mut conn: MultiplexedConnection, config: StreamConfig) -> Result<Self> {
        ensure_group(&mut conn, &config.results_stream, &config.results_group).await?;
        Ok(Self {
            conn,
            config,
            read_id: OWN_HISTORY,
            buffer: VecDeque::new(),
            done: false,
        })
    }

    async fn read_batch(&mut self) -> Result<()> {
        let mut opts = StreamReadOptions::default()
            .group(&self.config.results_group, &self.config.consumer_name)
            .count(self.config.batch_size);
        if self.read_id == NEW_ENTRIES {
            opts = opts.block(self.config.block_ms);
        }

        let reply: Option<StreamReadReply> = self
            .conn
            .xread_options(&[&self.config.results_stream], &[self.read_id], &opts)
            .await?;

        let entries: Vec<StreamId> = reply
            .map(|r| r.keys)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|key| key.ids)
            .collect();

        if entries.is_empty() && self.read_id == OWN_HISTORY {
            debug!("No unacknowledged results left, reading new entries");
            self.read_id = NEW_ENTRIES;
            return Ok(());
        }

        let batch = decode_batch(&entries);
        if !batch.ack_ids.is_empty() {
            let _: u64 = self
                .conn
                .xack(&self.config.results_stream, &self.config.results_group, &batch.ack_ids)
                .await?;
        }
        self.buffer.extend(batch.messages);
        Ok(())
    }
}

fn decode_entry(entry: &StreamId) -> Result<InboundMessage> {
    let malformed = |message: String| StorageError::MalformedEntry {
        id: entry.id.clone(),
        message,
    };

    let kind: String = entry
        .get(KIND_FIELD)
        .unwrap_or_else(|| "result".to_string());
    if kind == "done" {
        return Ok(InboundMessage::Done);
    }

    let data: Vec<u8> = entry
        .get(DATA_FIELD)
        .ok_or_else(|| malformed("missing data field".to_string()))?;
    let msg: ResultMessage =
        serde_json::from_slice(&data).map_err(|e| malformed(e.to_string()))?;
    Ok(InboundMessage::Result(Box::new(msg)))
}

#[async_trait]
impl ResultSource for RedisResultSource {
    async fn next_message(&mut self) -> Result<InboundMessage> {
        loop {
            if self.done {
                return Ok(InboundMessage::Done);
            }
            if let Some(msg) = self.buffer.pop_front() {
                if msg == InboundMessage::Done {
                    self.done = true;
                    self.buffer.clear();
                }
                return Ok(msg);
            }
            self.read_batch().await?;
        }
    }
}
