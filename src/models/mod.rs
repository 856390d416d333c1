// src/models/mod.rs

//! Domain models for the ingestion pipeline and query service.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod document;
mod record;
mod report;

// Re-export all public types
pub use config::{
    BackendConfig, Config, IngestConfig, LoggingConfig, SearchConfig, UploadConfig,
};
pub use document::{IndexDocument, SearchResult};
pub use record::{CleanedRecord, RawRecord};
pub use report::{EscalatedBatch, FailedDocument, IngestReport, PartitionReport};
