//! Schema Deriver
//!
//! Maps the dataset's column names onto a fixed relational type mapping and
//! creates the target table when absent. Creation is idempotent
//! (`CREATE TABLE IF NOT EXISTS`); an unknown column or a DDL failure is
//! fatal to the bulk run before any row is sent.

use sfp_common::types::TABLE_NAME;
use sfp_common::{PipelineError, Result};
use sqlx::PgPool;
use tracing::info;

/// The fixed column-name → PostgreSQL-type mapping.
pub fn column_type(column: &str) -> Option<&'static str> {
    match column {
        "InvoiceNo" | "StockCode" | "Description" | "Country" => Some("TEXT"),
        "Quantity" => Some("INTEGER"),
        "InvoiceDate" => Some("TIMESTAMP"),
        "UnitPrice" | "CustomerID" => Some("NUMERIC"),
        _ => None,
    }
}

/// Render the idempotent DDL for `columns`, in the given order.
pub fn create_table_sql(columns: &[&str]) -> Result<String> {
    let mut definitions = Vec::with_capacity(columns.len());
    for column in columns {
        let pg_type = column_type(column).ok_or_else(|| {
            PipelineError::Schema(format!("No relational type mapping for column '{}'", column))
        })?;
        definitions.push(format!("\"{}\" {}", column, pg_type));
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        TABLE_NAME,
        definitions.join(", ")
    ))
}

/// Create the target table if it does not exist yet.
pub async fn ensure_table(pool: &PgPool, columns: &[&str]) -> Result<()> {
    let sql = create_table_sql(columns)?;
    sqlx::query(&sql)
        .execute(pool)
        .await
        .map_err(|e| PipelineError::Schema(e.to_string()))?;
    info!(table = TABLE_NAME, "Target table ensured");
    Ok(())
}
