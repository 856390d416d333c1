//! Search backend abstractions.
//!
//! The pipeline and the query service only talk to a [`SearchBackend`]. Two
//! implementations ship with the crate:
//!
//! - [`ElasticBackend`]: Elasticsearch-compatible REST API over HTTP
//! - [`MemoryBackend`]: in-process index used for dry runs and tests

pub mod elastic;
pub mod memory;
pub mod wire;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::IndexDocument;

// Re-export for convenience
pub use elastic::ElasticBackend;
pub use memory::MemoryBackend;
pub use wire::{BulkResponse, SearchRequest, SearchResponse};

/// Classified failure of a backend call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The request body exceeded the backend's size limit
    #[error("request payload too large")]
    PayloadTooLarge,

    /// The backend is temporarily overloaded
    #[error("backend throttled the request: {0}")]
    Throttled(String),

    /// Timeout, refused or reset connection, or gateway failure
    #[error("transient backend failure: {0}")]
    Transient(String),

    /// The target index does not exist
    #[error("index '{0}' does not exist")]
    IndexNotFound(String),

    /// Any other non-success status
    #[error("backend rejected the request with status {status}: {reason}")]
    Rejected { status: u16, reason: String },

    /// The response could not be decoded
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// True for failures that may succeed when the same request is sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Transient(_))
    }
}

/// Trait for document-search backends.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Create the index if it does not exist yet. Existing indices are not an error.
    async fn ensure_index(&self, index: &str) -> Result<(), BackendError>;

    /// Write documents as upserts keyed by their id, in one request.
    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<BulkResponse, BackendError>;

    /// Run a query and return hits in descending score order.
    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, BackendError>;

    /// Number of documents stored in the index.
    async fn count(&self, index: &str) -> Result<u64, BackendError>;

    /// Drop the index. Returns false when it did not exist.
    async fn delete_index(&self, index: &str) -> Result<bool, BackendError>;
}
