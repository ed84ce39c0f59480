//! Record sinks — where flushed batches land
//!
//! A [`RecordSink`] only performs the write; buffering and flush policy live
//! in [`crate::buffer::BatchBuffer`]. [`PostgresSink`] is the production
//! sink; [`MemorySink`] backs the store-free tests with injectable failures.

use async_trait::async_trait;
use sfp_common::config::StoreConfig;
use sfp_common::types::{SaleLineRecord, COLUMNS, TABLE_NAME};
use sfp_common::{PipelineError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

/// Destination for a flushed batch of typed records.
///
/// `write_batch` must be all-or-nothing from the caller's point of view:
/// on error the caller assumes none of the batch was durably written and
/// will retry the same records.
#[async_trait]
pub trait RecordSink: Send {
    async fn write_batch(&mut self, records: &[SaleLineRecord]) -> Result<()>;
}

/// Writes batches to `online_retail_data` with one multi-row `INSERT`
/// statement per batch.
#[derive(Debug)]
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the environment-derived store settings.
    ///
    /// The pool is capped at a single connection: the store connection is
    /// exclusively owned by the consumer instance using it.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&config.connection_url())
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordSink for PostgresSink {
    async fn write_batch(&mut self, records: &[SaleLineRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(insert_prefix());
        builder.push_values(records, |mut row, record| {
            row.push_bind(&record.invoice_no)
                .push_bind(&record.stock_code)
                .push_bind(record.description.as_deref())
                .push_bind(record.quantity)
                .push_bind(record.invoice_date)
                .push_bind(record.unit_price)
                .push_bind(record.customer_id)
                .push_bind(record.country.as_deref());
        });

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;

        debug!(rows = records.len(), "Batch written to {}", TABLE_NAME);
        Ok(())
    }
}

/// `INSERT INTO online_retail_data ("InvoiceNo", ...) ` in canonical
/// column order; `push_values` appends the `VALUES` clause.
fn insert_prefix() -> String {
    let quoted: Vec<String> = COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
    format!("INSERT INTO {} ({}) ", TABLE_NAME, quoted.join(", "))
}

/// In-memory sink for tests: records every successfully written batch and
/// can be primed to fail a number of times first.
#[derive(Debug, Default)]
pub struct MemorySink {
    batches: Vec<Vec<SaleLineRecord>>,
    failures_remaining: u32,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose next `failures` write attempts fail before succeeding.
    pub fn failing(failures: u32) -> Self {
        Self {
            batches: Vec::new(),
            failures_remaining: failures,
        }
    }

    /// Batches written so far, in flush order.
    pub fn batches(&self) -> &[Vec<SaleLineRecord>] {
        &self.batches
    }

    /// All written records, flattened in write order.
    pub fn records(&self) -> Vec<SaleLineRecord> {
        self.batches.iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn write_batch(&mut self, records: &[SaleLineRecord]) -> Result<()> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(PipelineError::Database(
                "simulated store outage".to_string(),
            ));
        }
        self.batches.push(records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_prefix_uses_canonical_column_order() {
        let prefix = insert_prefix();
        assert!(prefix.starts_with("INSERT INTO online_retail_data ("));
        assert!(prefix.contains(
            "\"InvoiceNo\", \"StockCode\", \"Description\", \"Quantity\", \
             \"InvoiceDate\", \"UnitPrice\", \"CustomerID\", \"Country\""
        ));
    }

    #[tokio::test]
    async fn test_memory_sink_fails_then_recovers() {
        let mut sink = MemorySink::failing(1);
        let records = vec![];

        assert!(sink.write_batch(&records).await.is_err());
        assert!(sink.write_batch(&records).await.is_ok());
        assert_eq!(sink.batches().len(), 1);
    }
}
