//! SFP Common Library
//!
//! Shared types, utilities, and error handling for the SFP data pipeline.
//!
//! # Overview
//!
//! This crate provides common functionality used across all SFP workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: Centralized tracing setup for all binaries
//! - **Configuration**: Environment-driven store and channel settings
//! - **Types**: The sale-line event and record domain types

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{PipelineError, Result};
