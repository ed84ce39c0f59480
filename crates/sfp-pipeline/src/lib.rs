//! SFP Pipeline Library
//!
//! Streaming ingestion and bulk loading of retail sale-line data into
//! PostgreSQL.
//!
//! # Streaming path
//!
//! [`producer`] emits JSON sale-line events onto a Kafka topic;
//! [`consumer`] pulls them in partition order, casts them with [`cast`],
//! accumulates typed records in a [`buffer::BatchBuffer`], flushes full
//! batches through a [`sink::RecordSink`], and commits consumer offsets only
//! after a successful flush. Delivery is at-least-once: a crash between
//! flush and commit re-delivers the batch on restart.
//!
//! # Bulk path
//!
//! [`etl`] reads a historical CSV dataset, applies the cleaning rules, and
//! streams the result through PostgreSQL's `COPY` protocol in a single
//! transaction. [`schema`] creates the shared target table on demand.

pub mod buffer;
pub mod cast;
pub mod consumer;
pub mod etl;
pub mod producer;
pub mod schema;
pub mod sink;
