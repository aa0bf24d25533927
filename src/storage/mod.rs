//! Session history.
//!
//! Provides JSON-based storage for finished scan reports with query capabilities.

mod json_store;

pub use json_store::{ReportStore, StorageStats};
