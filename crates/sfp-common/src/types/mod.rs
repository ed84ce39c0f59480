//! Domain types for the SFP pipeline
//!
//! Two forms of a sale line exist in the system: the loosely typed wire form
//! carried over the message channel ([`SaleLineEvent`]) and the strictly
//! typed form persisted to PostgreSQL ([`SaleLineRecord`]).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Target relational table populated by both pipeline paths.
pub const TABLE_NAME: &str = "online_retail_data";

/// The single accepted `InvoiceDate` pattern (`DD/MM/YYYY HH:MM`).
pub const INVOICE_DATE_FORMAT: &str = "%d/%m/%Y %H:%M";

/// Sentinel substituted for blank text fields on the bulk path.
pub const UNKNOWN: &str = "UNKNOWN";

/// Canonical column order shared by schema derivation, the streaming insert,
/// and the bulk copy. The copy protocol requires this order to match the
/// declared table order exactly.
pub const COLUMNS: [&str; 8] = [
    "InvoiceNo",
    "StockCode",
    "Description",
    "Quantity",
    "InvoiceDate",
    "UnitPrice",
    "CustomerID",
    "Country",
];

/// One sale-line message as it travels the channel.
///
/// Every field is optional and loosely typed: upstream producers emit
/// numbers or strings interchangeably, and malformed values are possible.
/// No invariant is enforced at this layer; the caster decides what survives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleLineEvent {
    #[serde(rename = "InvoiceNo", skip_serializing_if = "Option::is_none")]
    pub invoice_no: Option<Value>,

    #[serde(rename = "StockCode", skip_serializing_if = "Option::is_none")]
    pub stock_code: Option<Value>,

    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,

    #[serde(rename = "Quantity", skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Value>,

    #[serde(rename = "InvoiceDate", skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<Value>,

    #[serde(rename = "UnitPrice", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<Value>,

    #[serde(rename = "CustomerID", skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<Value>,

    #[serde(rename = "Country", skip_serializing_if = "Option::is_none")]
    pub country: Option<Value>,
}

/// The strictly typed, persisted form of a sale line.
///
/// Field types mirror the table schema: text identifiers, `INTEGER`
/// quantity, `TIMESTAMP` invoice date, and `NUMERIC` price/customer id.
/// A record is terminal once durably written; the table is append-only
/// from this pipeline's perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLineRecord {
    /// Invoice identifier
    pub invoice_no: String,

    /// Stock/item identifier
    pub stock_code: String,

    /// Free-text description; nullable in the table
    pub description: Option<String>,

    /// Units sold; the bulk path only persists positive quantities
    pub quantity: i32,

    /// Absolute invoice timestamp, parsed from [`INVOICE_DATE_FORMAT`]
    pub invoice_date: NaiveDateTime,

    /// Unit price; the bulk path only persists positive prices
    pub unit_price: f64,

    /// Customer identifier, 0.0 when absent
    pub customer_id: f64,

    /// Country name; nullable in the table
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_deserializes_wire_field_names() {
        let raw = json!({
            "InvoiceNo": 600001,
            "StockCode": "85123A",
            "Description": "WHITE HANGING HEART T-LIGHT HOLDER",
            "Quantity": 6,
            "InvoiceDate": "09/12/2011 08:26",
            "UnitPrice": 2.55,
            "CustomerID": "17850",
            "Country": "United Kingdom"
        });

        let event: SaleLineEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.invoice_no, Some(json!(600001)));
        assert_eq!(event.customer_id, Some(json!("17850")));
    }

    #[test]
    fn test_event_tolerates_missing_fields() {
        let event: SaleLineEvent = serde_json::from_str("{}").unwrap();
        assert!(event.invoice_no.is_none());
        assert!(event.invoice_date.is_none());
    }

    #[test]
    fn test_column_order_matches_table_schema() {
        assert_eq!(COLUMNS[0], "InvoiceNo");
        assert_eq!(COLUMNS[4], "InvoiceDate");
        assert_eq!(COLUMNS[7], "Country");
        assert_eq!(COLUMNS.len(), 8);
    }
}
