//! Free-text search over the paper index.

use std::sync::Arc;

use crate::backend::SearchBackend;
use crate::backend::wire::{MultiMatch, Operator, QueryClause, SearchRequest};
use crate::error::Result;
use crate::models::{Config, SearchResult};

/// Fields searched, title weighted above abstract and body.
const SEARCH_FIELDS: [&str; 3] = ["title^2", "abstract", "body"];

/// Edit-distance tolerance picked from term length.
const FUZZINESS: &str = "AUTO";

/// Runs ranked fuzzy queries against one index.
#[derive(Clone)]
pub struct QueryService {
    backend: Arc<dyn SearchBackend>,
    index: String,
    result_size: usize,
}

impl QueryService {
    pub fn new(backend: Arc<dyn SearchBackend>, index: impl Into<String>, result_size: usize) -> Self {
        Self {
            backend,
            index: index.into(),
            result_size,
        }
    }

    pub fn from_config(backend: Arc<dyn SearchBackend>, config: &Config) -> Self {
        Self::new(backend, &config.backend.index, config.search.result_size)
    }

    /// Query body for `query`: every term must match, fuzzily, in at least one
    /// of the weighted fields.
    pub fn build_request(query: &str, size: usize) -> SearchRequest {
        SearchRequest {
            from: 0,
            size,
            query: QueryClause {
                multi_match: MultiMatch {
                    query: query.trim().to_lowercase(),
                    fields: SEARCH_FIELDS.iter().map(|f| f.to_string()).collect(),
                    fuzziness: FUZZINESS.to_string(),
                    operator: Operator::And,
                },
            },
        }
    }

    /// Search with the configured result size.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.search_with_size(query, self.result_size).await
    }

    /// Search returning at most `size` results, best first.
    ///
    /// Fails with [`AppError::SearchUnavailable`](crate::error::AppError::SearchUnavailable)
    /// when the backend cannot be reached or the index does not exist. An
    /// existing but empty index yields an empty list.
    pub async fn search_with_size(&self, query: &str, size: usize) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() || size == 0 {
            return Ok(Vec::new());
        }

        let request = Self::build_request(query, size);
        let response = self.backend.search(&self.index, &request).await?;

        let results: Vec<SearchResult> = response
            .hits
            .hits
            .into_iter()
            .take(size)
            .map(|hit| SearchResult::from_document(hit.source, hit.score.unwrap_or(0.0)))
            .collect();

        log::debug!(
            "Query {:?} on '{}' returned {} result(s)",
            request.query.multi_match.query,
            self.index,
            results.len()
        );
        Ok(results)
    }
}
