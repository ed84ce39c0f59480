//! Cleaning rules — bulk path
//!
//! Unlike the tolerant streaming caster, the bulk path is strict before
//! persistence: rows missing critical values are dropped, the timestamp
//! must parse, and only rows with positive quantity and unit price
//! survive. Text fields are trimmed with blanks replaced by the
//! `"UNKNOWN"` sentinel.

use chrono::NaiveDateTime;
use csv::StringRecord;
use sfp_common::types::{SaleLineRecord, COLUMNS, INVOICE_DATE_FORMAT, UNKNOWN};
use sfp_common::{PipelineError, Result};
use std::path::Path;
use tracing::{debug, info};

// Column indices in the canonical order.
const INVOICE_NO: usize = 0;
const STOCK_CODE: usize = 1;
const DESCRIPTION: usize = 2;
const QUANTITY: usize = 3;
const INVOICE_DATE: usize = 4;
const UNIT_PRICE: usize = 5;
const CUSTOMER_ID: usize = 6;
const COUNTRY: usize = 7;

/// Per-reason drop counts for one cleaning run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    /// Rows that survived every rule
    pub kept: usize,

    /// Rows missing one of the critical fields
    pub missing_required: usize,

    /// Rows whose `InvoiceDate` did not match the fixed pattern
    pub bad_timestamp: usize,

    /// Rows with quantity <= 0 or unit price <= 0
    pub non_positive: usize,
}

impl CleanReport {
    pub fn dropped(&self) -> usize {
        self.missing_required + self.bad_timestamp + self.non_positive
    }
}

/// The cleaned, strictly typed dataset ready for the bulk copy.
#[derive(Debug)]
pub struct CleanedDataset {
    pub records: Vec<SaleLineRecord>,
    pub report: CleanReport,
}

enum RowOutcome {
    Kept(Box<SaleLineRecord>),
    MissingRequired,
    BadTimestamp,
    NonPositive,
}

/// Read and clean a CSV dataset with exactly the canonical eight columns.
///
/// The header must match the canonical column order; anything else is a
/// schema error before any row is read.
pub fn clean_csv_file(path: &Path) -> Result<CleanedDataset> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| PipelineError::Parse(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::Parse(e.to_string()))?;
    verify_headers(headers)?;

    let mut records = Vec::new();
    let mut report = CleanReport::default();

    for row in reader.records() {
        let row = row.map_err(|e| PipelineError::Parse(e.to_string()))?;
        match clean_row(&row) {
            RowOutcome::Kept(record) => {
                report.kept += 1;
                records.push(*record);
            }
            RowOutcome::MissingRequired => report.missing_required += 1,
            RowOutcome::BadTimestamp => report.bad_timestamp += 1,
            RowOutcome::NonPositive => report.non_positive += 1,
        }
    }

    info!(
        kept = report.kept,
        dropped = report.dropped(),
        missing_required = report.missing_required,
        bad_timestamp = report.bad_timestamp,
        non_positive = report.non_positive,
        "Cleaning complete"
    );

    Ok(CleanedDataset { records, report })
}

fn verify_headers(headers: &StringRecord) -> Result<()> {
    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    if found != COLUMNS {
        return Err(PipelineError::Schema(format!(
            "Unexpected dataset columns: expected {:?}, found {:?}",
            COLUMNS, found
        )));
    }
    Ok(())
}

fn non_blank(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Trim a text field, substituting the sentinel for blanks.
fn text_or_unknown(raw: &str) -> String {
    non_blank(raw).unwrap_or(UNKNOWN).to_string()
}

fn clean_row(row: &StringRecord) -> RowOutcome {
    let field = |index: usize| row.get(index).unwrap_or("");

    // Critical values first: a row missing any of these never reaches the
    // type coercion below.
    let (Some(invoice_no), Some(stock_code), Some(date_raw), Some(quantity_raw), Some(price_raw)) = (
        non_blank(field(INVOICE_NO)),
        non_blank(field(STOCK_CODE)),
        non_blank(field(INVOICE_DATE)),
        non_blank(field(QUANTITY)),
        non_blank(field(UNIT_PRICE)),
    ) else {
        return RowOutcome::MissingRequired;
    };

    let Ok(invoice_date) = NaiveDateTime::parse_from_str(date_raw, INVOICE_DATE_FORMAT) else {
        debug!(raw = date_raw, "Dropping row with unparsable InvoiceDate");
        return RowOutcome::BadTimestamp;
    };

    let quantity = quantity_raw
        .parse::<i32>()
        .ok()
        .or_else(|| quantity_raw.parse::<f64>().ok().map(|v| v as i32))
        .unwrap_or(0);
    let unit_price = price_raw.parse::<f64>().unwrap_or(0.0);

    // Row-level invariant of the bulk path: only positive sales persist.
    if quantity <= 0 || unit_price <= 0.0 {
        return RowOutcome::NonPositive;
    }

    let customer_id = field(CUSTOMER_ID).trim().parse::<f64>().unwrap_or(0.0);

    RowOutcome::Kept(Box::new(SaleLineRecord {
        invoice_no: text_or_unknown(invoice_no),
        stock_code: text_or_unknown(stock_code),
        description: Some(text_or_unknown(field(DESCRIPTION))),
        quantity,
        invoice_date,
        unit_price,
        customer_id,
        country: Some(text_or_unknown(field(COUNTRY))),
    }))
}
