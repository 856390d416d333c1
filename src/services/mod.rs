//! Service layer for ingestion and search.
//!
//! This module contains the business logic for:
//! - Loading metadata rows (`RecordStore`)
//! - Cleaning and filtering records (`RecordCleaner`)
//! - Partitioning by estimated payload size (`Partitioner`)
//! - Resolving full-text bodies (`BodyResolver`)
//! - Bulk uploading with split and retry (`IndexUploader`)
//! - Ranked fuzzy search (`QueryService`)

mod body;
mod cleaner;
mod partitioner;
mod query;
mod records;
mod uploader;

pub use body::{BodyResolver, ResolvedPartition};
pub use cleaner::{CleanOutcome, DropReason, RecordCleaner};
pub use partitioner::{Partition, Partitioner, estimate_size, partition, partition_with_config};
pub use query::QueryService;
pub use records::{LoadedRecords, RecordStore};
pub use uploader::{AttemptOutcome, IndexUploader};
