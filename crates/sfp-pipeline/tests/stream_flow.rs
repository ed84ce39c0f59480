//! Streaming-path flow tests
//!
//! Exercises the cast → buffer → flush chain end to end against the
//! in-memory sink, covering the batching, drain, and retry behavior the
//! consumer relies on.

use sfp_common::config::ConsumerConfig;
use sfp_pipeline::buffer::BatchBuffer;
use sfp_pipeline::cast::cast_event;
use sfp_pipeline::consumer::flush_with_retry;
use sfp_pipeline::producer::EventGenerator;
use sfp_pipeline::sink::MemorySink;

fn fast_settings() -> ConsumerConfig {
    ConsumerConfig {
        batch_size: 10,
        max_flush_attempts: 3,
        flush_backoff_ms: 1,
    }
}

#[tokio::test]
async fn twenty_five_events_flush_as_ten_ten_five() {
    let mut generator = EventGenerator::with_seed(11);
    let mut buffer = BatchBuffer::with_capacity(10);
    let mut sink = MemorySink::new();

    for _ in 0..25 {
        let record = cast_event(&generator.next_event()).unwrap();
        if buffer.append(record) {
            buffer.flush(&mut sink).await.unwrap();
        }
    }

    // Two full flushes happened mid-stream; five records remain pending.
    assert_eq!(sink.batches().len(), 2);
    assert_eq!(buffer.len(), 5);

    // Graceful shutdown drains the remainder regardless of fill level.
    let drained = buffer.flush(&mut sink).await.unwrap();
    assert_eq!(drained, 5);
    assert_eq!(sink.batches().len(), 3);
    assert_eq!(sink.batches()[0].len(), 10);
    assert_eq!(sink.batches()[1].len(), 10);
    assert_eq!(sink.batches()[2].len(), 5);
    assert_eq!(sink.records().len(), 25);
}

#[tokio::test]
async fn malformed_timestamps_never_reach_the_sink() {
    let mut buffer = BatchBuffer::with_capacity(10);
    let mut sink = MemorySink::new();

    // A batch consisting only of uncastable events buffers nothing,
    // so the degenerate flush is a no-op and nothing is committed.
    for raw in [
        r#"{"InvoiceNo": 1, "InvoiceDate": "not a date"}"#,
        r#"{"InvoiceNo": 2}"#,
        r#"{"InvoiceNo": 3, "InvoiceDate": "2011-12-09 08:26:00"}"#,
    ] {
        let event = serde_json::from_str(raw).unwrap();
        if cast_event(&event).is_ok() {
            panic!("event should have been dropped: {raw}");
        }
    }

    assert!(buffer.is_empty());
    assert_eq!(buffer.flush(&mut sink).await.unwrap(), 0);
    assert!(sink.batches().is_empty());
}

#[tokio::test]
async fn round_trip_preserves_field_values() {
    let mut generator = EventGenerator::with_seed(23);
    let mut buffer = BatchBuffer::with_capacity(1);
    let mut sink = MemorySink::new();

    let event = generator.next_event();
    let cast = cast_event(&event).unwrap();
    let expected = cast.clone();

    assert!(buffer.append(cast));
    buffer.flush(&mut sink).await.unwrap();

    assert_eq!(sink.records(), vec![expected]);
}

#[tokio::test]
async fn flush_outage_then_recovery_writes_batch_exactly_once() {
    let mut generator = EventGenerator::with_seed(5);
    let mut buffer = BatchBuffer::with_capacity(10);
    // First attempt hits a simulated store outage, the retry succeeds.
    let mut sink = MemorySink::failing(1);

    for _ in 0..10 {
        let record = cast_event(&generator.next_event()).unwrap();
        buffer.append(record);
    }

    let written = flush_with_retry(&mut buffer, &mut sink, &fast_settings())
        .await
        .unwrap();

    assert_eq!(written, 10);
    assert!(buffer.is_empty());
    // Exactly one durable batch: the failed attempt persisted nothing,
    // so the retried flush introduced no duplicates.
    assert_eq!(sink.batches().len(), 1);
    assert_eq!(sink.records().len(), 10);
}

#[tokio::test]
async fn exhausted_retries_keep_records_for_redelivery() {
    let mut generator = EventGenerator::with_seed(9);
    let mut buffer = BatchBuffer::with_capacity(10);
    let mut sink = MemorySink::failing(10);

    for _ in 0..10 {
        let record = cast_event(&generator.next_event()).unwrap();
        buffer.append(record);
    }

    let result = flush_with_retry(&mut buffer, &mut sink, &fast_settings()).await;

    assert!(result.is_err());
    // The buffer still holds every record: nothing was acknowledged, so a
    // restarted consumer re-reads the same events from the channel.
    assert_eq!(buffer.len(), 10);
    assert!(sink.records().is_empty());
}
