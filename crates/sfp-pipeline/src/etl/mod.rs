//! Bulk ETL path
//!
//! One-shot historical backfill: read the raw CSV dataset, apply the
//! cleaning/normalization rules ([`clean`]), and stream the result into
//! the relational store through the high-throughput copy protocol
//! ([`loader`]). Unlike the streaming path's small per-batch commits, the
//! bulk copy is all-or-nothing.

pub mod clean;
pub mod loader;

pub use clean::{clean_csv_file, CleanReport, CleanedDataset};
pub use loader::BulkLoader;
