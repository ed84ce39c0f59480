//! Event Consumer
//!
//! Pulls sale-line events from the topic in delivery order, casts them,
//! buffers the typed records, and flushes full batches to the store.
//! Offsets are committed only after the flush that covers them has
//! succeeded, which makes delivery at-least-once: a crash between flush
//! and commit re-delivers the batch on restart and the resulting duplicate
//! inserts are accepted by design.
//!
//! A shutdown signal is observed at the poll boundary; the consumer then
//! drains: it flushes whatever is buffered, commits, and terminates, so no
//! record already pulled from the channel is silently dropped.

use crate::buffer::BatchBuffer;
use crate::cast::cast_event;
use crate::sink::RecordSink;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Message, OwnedMessage};
use rdkafka::topic_partition_list::{Offset, TopicPartitionList};
use sfp_common::config::{ConsumerConfig, KafkaConfig};
use sfp_common::types::SaleLineEvent;
use sfp_common::{PipelineError, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Tracks, per partition, the highest offset among events whose records
/// (or logged drops) are covered by the next flush. Committing a
/// partition's entry means committing `highest + 1`, the next position to
/// read from.
#[derive(Debug, Default)]
pub struct OffsetLedger {
    pending: HashMap<(String, i32), i64>,
}

impl OffsetLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `offset` on `topic`/`partition` has been consumed into
    /// the current batch.
    pub fn observe(&mut self, topic: &str, partition: i32, offset: i64) {
        self.pending
            .entry((topic.to_string(), partition))
            .and_modify(|highest| *highest = (*highest).max(offset))
            .or_insert(offset);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Positions to commit: one past the highest observed offset per
    /// partition.
    pub fn committable(&self) -> Vec<(String, i32, i64)> {
        self.pending
            .iter()
            .map(|((topic, partition), highest)| (topic.clone(), *partition, highest + 1))
            .collect()
    }

    /// Forget all tracked offsets after a successful commit.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Writes consumed positions back to the channel after their batch has
/// been durably flushed.
pub trait OffsetCommitter {
    fn commit_offsets(&self, positions: &[(String, i32, i64)]) -> Result<()>;
}

impl OffsetCommitter for StreamConsumer {
    fn commit_offsets(&self, positions: &[(String, i32, i64)]) -> Result<()> {
        let mut list = TopicPartitionList::new();
        for (topic, partition, next) in positions {
            list.add_partition_offset(topic, *partition, Offset::Offset(*next))
                .map_err(|e| PipelineError::Transport(e.to_string()))?;
        }

        self.commit(&list, CommitMode::Sync)
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        debug!(partitions = list.count(), "Committed consumer position");
        Ok(())
    }
}

/// In-memory committer for tests: records each committed position set in
/// call order and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingCommitter {
    commits: RefCell<Vec<Vec<(String, i32, i64)>>>,
}

impl RecordingCommitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position sets committed so far, in commit order.
    pub fn commits(&self) -> Vec<Vec<(String, i32, i64)>> {
        self.commits.borrow().clone()
    }
}

impl OffsetCommitter for RecordingCommitter {
    fn commit_offsets(&self, positions: &[(String, i32, i64)]) -> Result<()> {
        self.commits.borrow_mut().push(positions.to_vec());
        Ok(())
    }
}

/// Flush `buffer` into `sink`, retrying transient failures with
/// exponential backoff up to the configured attempt budget. The buffer is
/// preserved across failed attempts; the final error escalates to the
/// caller as a fatal stop.
pub async fn flush_with_retry<S: RecordSink>(
    buffer: &mut BatchBuffer,
    sink: &mut S,
    settings: &ConsumerConfig,
) -> Result<usize> {
    let mut backoff = Duration::from_millis(settings.flush_backoff_ms);
    let mut attempt: u32 = 1;

    loop {
        match buffer.flush(sink).await {
            Ok(written) => return Ok(written),
            Err(e) if attempt < settings.max_flush_attempts => {
                warn!(
                    attempt,
                    max_attempts = settings.max_flush_attempts,
                    error = %e,
                    "Flush failed; retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => {
                error!(
                    attempts = settings.max_flush_attempts,
                    error = %e,
                    "Flush failed permanently; buffered records retained, offsets not committed"
                );
                return Err(e);
            }
        }
    }
}

/// Flush the current batch and, on success, advance the committed
/// position past every event the batch covered.
///
/// The commit is gated on the flush: a flush that exhausts its retry
/// budget returns the error with the ledger untouched, so the committed
/// position never passes an unflushed batch. A batch that produced no
/// records (every event dropped by the caster) commits nothing:
/// redelivering malformed events is harmless and the degenerate empty
/// flush stays a no-op.
pub async fn flush_and_commit<S: RecordSink, C: OffsetCommitter>(
    buffer: &mut BatchBuffer,
    sink: &mut S,
    ledger: &mut OffsetLedger,
    committer: &C,
    settings: &ConsumerConfig,
) -> Result<usize> {
    if buffer.is_empty() {
        return Ok(0);
    }

    let written = flush_with_retry(buffer, sink, settings).await?;
    info!(rows = written, "Inserted batch");

    if !ledger.is_empty() {
        committer.commit_offsets(&ledger.committable())?;
        ledger.clear();
    }
    Ok(written)
}

/// One consumer-group member: owns its channel subscription, its batch
/// buffer, and its store sink. No state outlives the instance.
pub struct SalesConsumer<S: RecordSink> {
    consumer: StreamConsumer,
    sink: S,
    buffer: BatchBuffer,
    ledger: OffsetLedger,
    settings: ConsumerConfig,
    dropped: u64,
}

impl<S: RecordSink> SalesConsumer<S> {
    /// Subscribe to the sales topic with manual offset commits.
    ///
    /// Auto-commit is disabled: the channel library committing positions on
    /// its own schedule would break the flush-before-commit contract.
    pub fn new(kafka: &KafkaConfig, settings: ConsumerConfig, sink: S) -> Result<Self> {
        settings.validate()?;

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &kafka.brokers)
            .set("group.id", &kafka.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        consumer
            .subscribe(&[kafka.topic.as_str()])
            .map_err(|e| PipelineError::Transport(e.to_string()))?;

        let buffer = BatchBuffer::with_capacity(settings.batch_size);

        Ok(Self {
            consumer,
            sink,
            buffer,
            ledger: OffsetLedger::new(),
            settings,
            dropped: 0,
        })
    }

    /// Poll until interrupted, then drain.
    pub async fn run(mut self) -> Result<()> {
        info!(batch_size = self.settings.batch_size, "Consumer started");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested; draining buffered records");
                    break;
                }
                // Detach the polled message so the consumer handle is free
                // again while the record is cast and buffered.
                polled = self.consumer.recv() => match polled.map(|message| message.detach()) {
                    Ok(message) => self.handle_message(&message).await?,
                    Err(e) => {
                        // Transport errors are never fatal to the pipeline.
                        warn!(error = %e, "Poll failed; continuing");
                    }
                },
            }
        }

        // Drain flush below threshold, then commit, then release resources.
        self.flush_and_commit().await?;
        info!(dropped = self.dropped, "Consumer terminated");
        Ok(())
    }

    async fn handle_message(&mut self, message: &OwnedMessage) -> Result<()> {
        self.ledger
            .observe(message.topic(), message.partition(), message.offset());

        let Some(payload) = message.payload() else {
            self.dropped += 1;
            warn!(offset = message.offset(), "Dropping event without payload");
            return Ok(());
        };

        let event: SaleLineEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                self.dropped += 1;
                warn!(
                    offset = message.offset(),
                    error = %e,
                    "Dropping undecodable event"
                );
                return Ok(());
            }
        };

        let record = match cast_event(&event) {
            Ok(record) => record,
            Err(e) => {
                self.dropped += 1;
                warn!(
                    offset = message.offset(),
                    error = %e,
                    "Dropping malformed event"
                );
                return Ok(());
            }
        };

        debug!(
            invoice_no = %record.invoice_no,
            offset = message.offset(),
            "Buffered record"
        );

        if self.buffer.append(record) {
            self.flush_and_commit().await?;
        }
        Ok(())
    }

    async fn flush_and_commit(&mut self) -> Result<()> {
        flush_and_commit(
            &mut self.buffer,
            &mut self.sink,
            &mut self.ledger,
            &self.consumer,
            &self.settings,
        )
        .await?;
        Ok(())
    }
}
