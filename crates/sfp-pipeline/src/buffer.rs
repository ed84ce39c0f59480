//! Batch Buffer
//!
//! Accumulates cast records until the configured threshold, at which point
//! the caller is expected to flush. `flush` is the only path that persists:
//! on success the buffer empties; on failure it is left untouched so the
//! same records can be retried. Consumption progress must never be
//! committed for events whose records still sit in an unflushed buffer.

use crate::sink::RecordSink;
use sfp_common::types::SaleLineRecord;
use sfp_common::Result;

/// Ordered, bounded accumulator of records awaiting persistence.
#[derive(Debug)]
pub struct BatchBuffer {
    records: Vec<SaleLineRecord>,
    capacity: usize,
}

impl BatchBuffer {
    /// A buffer that reports "threshold reached" at exactly `capacity`
    /// records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one record; returns true exactly when the buffer has reached
    /// its threshold and must be flushed before the next append.
    pub fn append(&mut self, record: SaleLineRecord) -> bool {
        self.records.push(record);
        self.records.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Persist the buffered records through `sink`.
    ///
    /// On success the buffer is emptied and the number of written records
    /// returned. On failure the buffer is unchanged and the error is
    /// surfaced for the caller to retry or escalate. Flushing an empty
    /// buffer is a no-op returning 0.
    pub async fn flush<S: RecordSink>(&mut self, sink: &mut S) -> Result<usize> {
        if self.records.is_empty() {
            return Ok(0);
        }
        sink.write_batch(&self.records).await?;
        let written = self.records.len();
        self.records.clear();
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use chrono::NaiveDate;

    fn record(invoice_no: &str) -> SaleLineRecord {
        SaleLineRecord {
            invoice_no: invoice_no.to_string(),
            stock_code: "85123A".to_string(),
            description: None,
            quantity: 1,
            invoice_date: NaiveDate::from_ymd_opt(2011, 12, 9)
                .unwrap()
                .and_hms_opt(8, 26, 0)
                .unwrap(),
            unit_price: 2.55,
            customer_id: 17850.0,
            country: Some("United Kingdom".to_string()),
        }
    }

    #[test]
    fn test_append_reports_threshold_exactly_at_capacity() {
        let mut buffer = BatchBuffer::with_capacity(3);
        assert!(!buffer.append(record("1")));
        assert!(!buffer.append(record("2")));
        assert!(buffer.append(record("3")));
        assert_eq!(buffer.len(), 3);
    }

    #[tokio::test]
    async fn test_flush_empties_buffer_and_returns_count() {
        let mut buffer = BatchBuffer::with_capacity(2);
        let mut sink = MemorySink::new();
        buffer.append(record("1"));
        buffer.append(record("2"));

        let written = buffer.flush(&mut sink).await.unwrap();
        assert_eq!(written, 2);
        assert!(buffer.is_empty());
        assert_eq!(sink.records().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_flush_preserves_records() {
        let mut buffer = BatchBuffer::with_capacity(2);
        let mut sink = MemorySink::failing(1);
        buffer.append(record("1"));
        buffer.append(record("2"));

        assert!(buffer.flush(&mut sink).await.is_err());
        assert_eq!(buffer.len(), 2);
        assert!(sink.records().is_empty());

        // Retry persists the identical records exactly once.
        let written = buffer.flush(&mut sink).await.unwrap();
        assert_eq!(written, 2);
        assert!(buffer.is_empty());
        assert_eq!(sink.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let mut buffer = BatchBuffer::with_capacity(2);
        let mut sink = MemorySink::new();

        assert_eq!(buffer.flush(&mut sink).await.unwrap(), 0);
        assert!(sink.batches().is_empty());
    }
}
