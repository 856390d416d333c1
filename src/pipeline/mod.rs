//! Pipeline entry points.
//!
//! - `run_ingest`: Load, clean, partition and upload the dataset
//! - `run_export`: Write cleaned documents to a CSV file
//! - `count_documents` / `delete_index`: Index maintenance

pub mod export;
pub mod ingest;
pub mod maintenance;
pub mod retry;
pub mod stop;

pub use export::run_export;
pub use ingest::run_ingest;
pub use maintenance::{count_documents, delete_index};
pub use retry::RetryPolicy;
pub use stop::StopSignal;
