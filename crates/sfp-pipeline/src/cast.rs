//! Record Caster — streaming path
//!
//! Converts one loosely typed [`SaleLineEvent`] into a strictly typed
//! [`SaleLineRecord`]. The streaming rules favor availability: every field
//! is coerced independently, numeric fields default to zero on absence or
//! parse failure, and identifiers are preserved as the stringified raw
//! value. The single hard failure is an absent or unparsable `InvoiceDate`,
//! since a malformed timestamp cannot self-correct; such records are
//! dropped by the caller, never retried.

use chrono::NaiveDateTime;
use serde_json::Value;
use sfp_common::types::{SaleLineEvent, SaleLineRecord, INVOICE_DATE_FORMAT};
use thiserror::Error;
use tracing::debug;

/// A per-record casting failure. The offending record is discarded;
/// the batch it would have joined is unaffected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CastError {
    #[error("InvoiceDate is missing")]
    MissingTimestamp,

    #[error("InvoiceDate '{0}' does not match pattern DD/MM/YYYY HH:MM")]
    UnparsableTimestamp(String),
}

/// Cast a wire event into its persisted form, applying the streaming
/// coercion rules field by field.
pub fn cast_event(event: &SaleLineEvent) -> Result<SaleLineRecord, CastError> {
    let invoice_date = parse_timestamp(event.invoice_date.as_ref())?;

    Ok(SaleLineRecord {
        invoice_no: text(event.invoice_no.as_ref()),
        stock_code: text(event.stock_code.as_ref()),
        description: optional_text(event.description.as_ref()),
        quantity: integer("Quantity", event.quantity.as_ref()),
        invoice_date,
        unit_price: numeric("UnitPrice", event.unit_price.as_ref()),
        customer_id: numeric("CustomerID", event.customer_id.as_ref()),
        country: optional_text(event.country.as_ref()),
    })
}

/// Stringify a loose JSON value the way the wire format intends: strings
/// pass through, numbers render in decimal, null becomes empty.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn text(value: Option<&Value>) -> String {
    value.map(stringify).unwrap_or_default().trim().to_string()
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => {
            let s = stringify(v).trim().to_string();
            (!s.is_empty()).then_some(s)
        }
    }
}

fn parse_timestamp(value: Option<&Value>) -> Result<NaiveDateTime, CastError> {
    let raw = match value {
        Some(Value::String(s)) => s.trim(),
        Some(other) => {
            return Err(CastError::UnparsableTimestamp(stringify(other)));
        }
        None => return Err(CastError::MissingTimestamp),
    };
    NaiveDateTime::parse_from_str(raw, INVOICE_DATE_FORMAT)
        .map_err(|_| CastError::UnparsableTimestamp(raw.to_string()))
}

/// Coerce a loose value to i32, defaulting to 0. A defaulted zero is logged
/// so it stays distinguishable from a genuine zero in traces.
fn integer(field: &'static str, value: Option<&Value>) -> i32 {
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .or_else(|| n.as_f64().map(|v| v as i32)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i32>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().map(|v| v as i32)),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        debug!(field, raw = ?value, "Numeric field defaulted to 0");
        0
    })
}

/// Coerce a loose value to f64, defaulting to 0.0, with the same
/// defaulted-value logging as [`integer`].
fn numeric(field: &'static str, value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        debug!(field, raw = ?value, "Numeric field defaulted to 0");
        0.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> SaleLineEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_cast_valid_event() {
        let event = event(json!({
            "InvoiceNo": 600042,
            "StockCode": "85123A",
            "Description": "WHITE METAL LANTERN",
            "Quantity": 6,
            "InvoiceDate": "09/12/2011 08:26",
            "UnitPrice": 2.55,
            "CustomerID": "17850",
            "Country": "United Kingdom"
        }));

        let record = cast_event(&event).unwrap();
        assert_eq!(record.invoice_no, "600042");
        assert_eq!(record.stock_code, "85123A");
        assert_eq!(record.description.as_deref(), Some("WHITE METAL LANTERN"));
        assert_eq!(record.quantity, 6);
        assert_eq!(
            record.invoice_date,
            NaiveDateTime::parse_from_str("09/12/2011 08:26", INVOICE_DATE_FORMAT).unwrap()
        );
        assert_eq!(record.unit_price, 2.55);
        assert_eq!(record.customer_id, 17850.0);
        assert_eq!(record.country.as_deref(), Some("United Kingdom"));
    }

    #[test]
    fn test_missing_timestamp_is_hard_failure() {
        let event = event(json!({ "InvoiceNo": "1", "Quantity": 2 }));
        assert_eq!(cast_event(&event).unwrap_err(), CastError::MissingTimestamp);
    }

    #[test]
    fn test_unparsable_timestamp_is_hard_failure() {
        let event = event(json!({ "InvoiceDate": "2011-12-09 08:26" }));
        assert_eq!(
            cast_event(&event).unwrap_err(),
            CastError::UnparsableTimestamp("2011-12-09 08:26".to_string())
        );
    }

    #[test]
    fn test_numeric_defaults_to_zero() {
        let event = event(json!({
            "InvoiceDate": "09/12/2011 08:26",
            "Quantity": "not-a-number",
            "UnitPrice": null
        }));

        let record = cast_event(&event).unwrap();
        assert_eq!(record.quantity, 0);
        assert_eq!(record.unit_price, 0.0);
        assert_eq!(record.customer_id, 0.0);
    }

    #[test]
    fn test_numeric_strings_are_parsed() {
        let event = event(json!({
            "InvoiceDate": "09/12/2011 08:26",
            "Quantity": "3",
            "UnitPrice": "4.75",
            "CustomerID": 12345
        }));

        let record = cast_event(&event).unwrap();
        assert_eq!(record.quantity, 3);
        assert_eq!(record.unit_price, 4.75);
        assert_eq!(record.customer_id, 12345.0);
    }

    #[test]
    fn test_identifiers_preserved_without_sentinel() {
        // Streaming path keeps the stringified raw value, including blanks.
        let event = event(json!({
            "InvoiceNo": "",
            "InvoiceDate": "09/12/2011 08:26"
        }));

        let record = cast_event(&event).unwrap();
        assert_eq!(record.invoice_no, "");
        assert_eq!(record.stock_code, "");
        assert!(record.description.is_none());
        assert!(record.country.is_none());
    }

    #[test]
    fn test_numeric_invoice_no_is_stringified() {
        let event = event(json!({
            "InvoiceNo": 600000,
            "InvoiceDate": "09/12/2011 08:26"
        }));

        let record = cast_event(&event).unwrap();
        assert_eq!(record.invoice_no, "600000");
    }
}
