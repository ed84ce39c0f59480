//! Bulk Loader
//!
//! Streams a cleaned dataset into the store through PostgreSQL's
//! `COPY FROM STDIN` protocol instead of row-at-a-time inserts. The whole
//! copy runs inside one transaction: any failure rolls the entire load
//! back, so the table never holds a partial bulk load. The column list
//! sent to the copy protocol matches the declared table order exactly.

use crate::schema;
use sfp_common::config::StoreConfig;
use sfp_common::types::{SaleLineRecord, COLUMNS, TABLE_NAME};
use sfp_common::{PipelineError, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Timestamp rendering understood by the copy protocol's CSV parser.
const COPY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One bulk-load run owning its own store connection pool.
#[derive(Debug)]
pub struct BulkLoader {
    pool: PgPool,
}

impl BulkLoader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the environment-derived store settings.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&config.connection_url())
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;
        Ok(Self::new(pool))
    }

    /// Ensure the table exists, then copy every record in one transaction.
    ///
    /// Returns the number of rows the store reports as copied. On any
    /// error the transaction is dropped, which rolls back the whole load.
    pub async fn load(&self, records: &[SaleLineRecord]) -> Result<u64> {
        schema::ensure_table(&self.pool, &COLUMNS).await?;

        if records.is_empty() {
            info!("Nothing to load");
            return Ok(0);
        }

        let payload = render_copy_payload(records)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;

        let statement = copy_statement();
        let mut copy = (&mut *tx)
            .copy_in_raw(&statement)
            .await
            .map_err(|e| PipelineError::BulkLoad(e.to_string()))?;
        copy.send(payload.as_slice())
            .await
            .map_err(|e| PipelineError::BulkLoad(e.to_string()))?;
        let rows = copy
            .finish()
            .await
            .map_err(|e| PipelineError::BulkLoad(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;

        info!(rows, table = TABLE_NAME, "Bulk load complete");
        Ok(rows)
    }
}

/// `COPY online_retail_data ("InvoiceNo", ...) FROM STDIN` in canonical
/// column order, CSV framed, empty string as NULL.
fn copy_statement() -> String {
    let quoted: Vec<String> = COLUMNS.iter().map(|c| format!("\"{}\"", c)).collect();
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT csv, NULL '')",
        TABLE_NAME,
        quoted.join(", ")
    )
}

/// Render the cleaned records as the CSV byte stream fed to the copy
/// protocol, fields in canonical column order.
fn render_copy_payload(records: &[SaleLineRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(Vec::new());

    for record in records {
        let fields = [
            record.invoice_no.clone(),
            record.stock_code.clone(),
            record.description.clone().unwrap_or_default(),
            record.quantity.to_string(),
            record
                .invoice_date
                .format(COPY_TIMESTAMP_FORMAT)
                .to_string(),
            record.unit_price.to_string(),
            record.customer_id.to_string(),
            record.country.clone().unwrap_or_default(),
        ];
        writer
            .write_record(&fields)
            .map_err(|e| PipelineError::BulkLoad(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::BulkLoad(e.to_string()))
}
