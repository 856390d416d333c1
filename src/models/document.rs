//! Indexed document and query result shapes.

use serde::{Deserialize, Serialize};

use super::CleanedRecord;

/// The canonical document stored in the search backend.
///
/// `id` doubles as the backend document key, so writing the same record twice
/// replaces it instead of adding a second copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub publish_time: String,
    #[serde(default)]
    pub journal: String,
}

impl IndexDocument {
    /// Build the document for a cleaned record and its resolved body.
    pub fn from_record(record: CleanedRecord, body: String) -> Self {
        Self {
            id: record.id,
            title: record.title,
            abstract_text: record.abstract_text,
            authors: record.authors,
            body,
            url: record.url,
            publish_time: record.publish_time,
            journal: record.journal,
        }
    }
}

/// One ranked hit returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub body: String,
    pub url: String,
    pub publish_time: String,
    pub score: f64,
}

impl SearchResult {
    /// Project a stored document and its relevance score into a result.
    pub fn from_document(document: IndexDocument, score: f64) -> Self {
        Self {
            title: document.title,
            authors: document.authors,
            abstract_text: document.abstract_text,
            body: document.body,
            url: document.url,
            publish_time: document.publish_time,
            score,
        }
    }
}
