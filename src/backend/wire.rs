//! Request and response bodies of the search backend's REST API.

use serde::{Deserialize, Serialize};

use crate::models::IndexDocument;

/// Approximate bytes the bulk action line adds per document, excluding the id.
pub const ACTION_LINE_OVERHEAD: usize = 64;

/// Action line that makes a bulk write an upsert keyed by document id.
#[derive(Debug, Serialize)]
struct ActionLine<'a> {
    index: ActionTarget<'a>,
}

#[derive(Debug, Serialize)]
struct ActionTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: &'a str,
}

/// Encode documents as a newline-delimited bulk body.
///
/// Each document is preceded by an `index` action naming the target index and
/// the document id, so the backend replaces an existing document with the same
/// id instead of appending a new one.
pub fn bulk_body(index: &str, documents: &[IndexDocument]) -> serde_json::Result<Vec<u8>> {
    let mut body = Vec::with_capacity(documents.len() * 512);
    for doc in documents {
        let action = ActionLine {
            index: ActionTarget { index, id: &doc.id },
        };
        serde_json::to_writer(&mut body, &action)?;
        body.push(b'\n');
        serde_json::to_writer(&mut body, doc)?;
        body.push(b'\n');
    }
    Ok(body)
}

/// Exact number of bytes `doc` adds to a bulk body for `index`.
pub fn bulk_size(index: &str, doc: &IndexDocument) -> usize {
    bulk_body(index, std::slice::from_ref(doc)).map_or(0, |body| body.len())
}

/// Response of a bulk write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    /// True when at least one item failed
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Items that carry an error, as `(id, reason)` pairs.
    pub fn failures(&self) -> Vec<(String, String)> {
        self.items
            .iter()
            .filter_map(|item| {
                item.index
                    .failure_reason()
                    .map(|reason| (item.index.id.clone(), reason))
            })
            .collect()
    }

    /// True when every item failed and every failure was a throttling status.
    pub fn all_throttled(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.index.status == 429)
    }
}

/// One entry of the bulk `items` array, keyed by the action name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItem {
    #[serde(alias = "create", alias = "update")]
    pub index: BulkItemStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkItemStatus {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl BulkItemStatus {
    pub fn succeeded(id: impl Into<String>, status: u16) -> Self {
        Self {
            id: id.into(),
            status,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, status: u16, kind: &str, reason: &str) -> Self {
        Self {
            id: id.into(),
            status,
            error: Some(serde_json::json!({ "type": kind, "reason": reason })),
        }
    }

    /// Human readable reason when this item failed.
    pub fn failure_reason(&self) -> Option<String> {
        if self.error.is_none() && self.status < 300 {
            return None;
        }
        Some(match &self.error {
            Some(error) => error_reason(error),
            None => format!("status {}", self.status),
        })
    }
}

/// Extract `type: reason` from a backend error object.
pub fn error_reason(error: &serde_json::Value) -> String {
    let kind = error.get("type").and_then(|v| v.as_str());
    let reason = error.get("reason").and_then(|v| v.as_str());
    match (kind, reason) {
        (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
        (Some(kind), None) => kind.to_string(),
        (None, Some(reason)) => reason.to_string(),
        (None, None) => match error.as_str() {
            Some(text) => text.to_string(),
            None => error.to_string(),
        },
    }
}

/// How query terms combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
}

/// Weighted multi-field match clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiMatch {
    pub query: String,
    /// Field names with an optional `^boost` suffix
    pub fields: Vec<String>,
    pub fuzziness: String,
    pub operator: Operator,
}

impl MultiMatch {
    /// Field names paired with their boost (1.0 when unspecified).
    pub fn weighted_fields(&self) -> Vec<(&str, f64)> {
        self.fields
            .iter()
            .map(|field| match field.split_once('^') {
                Some((name, boost)) => (name, boost.parse().unwrap_or(1.0)),
                None => (field.as_str(), 1.0),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryClause {
    pub multi_match: MultiMatch,
}

/// Body of a search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub from: usize,
    pub size: usize,
    pub query: QueryClause,
}

/// Response of a search call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Hits,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source")]
    pub source: IndexDocument,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}
