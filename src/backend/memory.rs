//! In-process search backend.
//!
//! Keeps documents in memory keyed by id and evaluates the same weighted
//! fuzzy multi-field query the HTTP backend receives, with BM25 scoring per
//! field. Ties are broken by document id so results are deterministic.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use unicode_segmentation::UnicodeSegmentation;

use super::wire::{
    BulkItem, BulkItemStatus, BulkResponse, Hit, Hits, Operator, SearchRequest, SearchResponse,
};
use super::{BackendError, SearchBackend};
use crate::models::IndexDocument;

const K1: f64 = 1.2;
const B: f64 = 0.75;

type Index = BTreeMap<String, IndexDocument>;

/// Search backend held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    indices: RwLock<HashMap<String, Index>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every document in an index, ordered by id.
    pub async fn documents(&self, index: &str) -> Vec<IndexDocument> {
        self.indices
            .read()
            .await
            .get(index)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn ensure_index(&self, index: &str) -> Result<(), BackendError> {
        self.indices
            .write()
            .await
            .entry(index.to_string())
            .or_default();
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> Result<BulkResponse, BackendError> {
        let mut indices = self.indices.write().await;
        let docs = indices.entry(index.to_string()).or_default();

        let items = documents
            .iter()
            .map(|doc| {
                let status = match docs.insert(doc.id.clone(), doc.clone()) {
                    Some(_) => 200,
                    None => 201,
                };
                BulkItem {
                    index: BulkItemStatus::succeeded(doc.id.clone(), status),
                }
            })
            .collect();

        Ok(BulkResponse {
            errors: false,
            items,
        })
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> Result<SearchResponse, BackendError> {
        let indices = self.indices.read().await;
        let docs = indices
            .get(index)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))?;

        let mut scored = score_documents(docs, request);
        scored.sort_by(|(a_score, a_doc), (b_score, b_doc)| {
            b_score
                .total_cmp(a_score)
                .then_with(|| a_doc.id.cmp(&b_doc.id))
        });

        let hits = scored
            .into_iter()
            .skip(request.from)
            .take(request.size)
            .map(|(score, doc)| Hit {
                id: doc.id.clone(),
                score: Some(score),
                source: doc.clone(),
            })
            .collect();

        Ok(SearchResponse {
            hits: Hits { hits },
        })
    }

    async fn count(&self, index: &str) -> Result<u64, BackendError> {
        self.indices
            .read()
            .await
            .get(index)
            .map(|docs| docs.len() as u64)
            .ok_or_else(|| BackendError::IndexNotFound(index.to_string()))
    }

    async fn delete_index(&self, index: &str) -> Result<bool, BackendError> {
        Ok(self.indices.write().await.remove(index).is_some())
    }
}

/// Tokens of one field of every document, with BM25 field statistics.
struct FieldStats<'a> {
    boost: f64,
    tokens: Vec<Vec<String>>,
    avg_len: f64,
    name: &'a str,
}

fn field_text<'d>(doc: &'d IndexDocument, field: &str) -> &'d str {
    match field {
        "title" => &doc.title,
        "abstract" => &doc.abstract_text,
        "body" => &doc.body,
        "journal" => &doc.journal,
        _ => "",
    }
}

/// Score every document against the request, keeping only matches.
fn score_documents<'d>(docs: &'d Index, request: &SearchRequest) -> Vec<(f64, &'d IndexDocument)> {
    let clause = &request.query.multi_match;
    let mut terms = tokenize(&clause.query);
    terms.sort();
    terms.dedup();
    if terms.is_empty() || docs.is_empty() {
        return Vec::new();
    }

    let docs: Vec<&IndexDocument> = docs.values().collect();
    let fields: Vec<FieldStats> = clause
        .weighted_fields()
        .into_iter()
        .map(|(name, boost)| {
            let tokens: Vec<Vec<String>> = docs
                .iter()
                .map(|doc| tokenize(field_text(doc, name)))
                .collect();
            let total: usize = tokens.iter().map(Vec::len).sum();
            FieldStats {
                boost,
                avg_len: (total as f64 / docs.len() as f64).max(1.0),
                tokens,
                name,
            }
        })
        .collect();

    // tf[field][term][doc]
    let tf: Vec<Vec<Vec<f64>>> = fields
        .iter()
        .map(|field| {
            terms
                .iter()
                .map(|term| {
                    field
                        .tokens
                        .iter()
                        .map(|tokens| fuzzy_frequency(term, tokens))
                        .collect()
                })
                .collect()
        })
        .collect();

    let n = docs.len() as f64;
    let mut scored = Vec::new();

    'docs: for (d, doc) in docs.iter().enumerate() {
        let mut score = 0.0;
        let mut matched_terms = 0;

        for t in 0..terms.len() {
            let mut best: Option<f64> = None;
            for (f, field) in fields.iter().enumerate() {
                let freq = tf[f][t][d];
                if freq <= 0.0 {
                    continue;
                }
                let df = tf[f][t].iter().filter(|v| **v > 0.0).count() as f64;
                let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
                let len = field.tokens[d].len() as f64;
                let norm = K1 * (1.0 - B + B * len / field.avg_len);
                let field_score = field.boost * idf * (freq * (K1 + 1.0)) / (freq + norm);
                log::trace!("{} {} {}: {:.4}", doc.id, terms[t], field.name, field_score);
                best = Some(best.map_or(field_score, |b: f64| b.max(field_score)));
            }

            match best {
                Some(field_score) => {
                    score += field_score;
                    matched_terms += 1;
                }
                None if clause.operator == Operator::And => continue 'docs,
                None => {}
            }
        }

        if matched_terms > 0 {
            scored.push((score, *doc));
        }
    }

    scored
}

/// Lowercased word tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .unicode_words()
        .map(String::from)
        .collect()
}

/// Edits tolerated for a term under "AUTO" fuzziness.
fn allowed_edits(term_len: usize) -> usize {
    match term_len {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    }
}

/// Sum of similarities of the tokens within the fuzzy edit budget of `term`.
fn fuzzy_frequency(term: &str, tokens: &[String]) -> f64 {
    let term_len = term.chars().count();
    let allowed = allowed_edits(term_len);

    tokens
        .iter()
        .filter_map(|token| {
            if token == term {
                return Some(1.0);
            }
            let token_len = token.chars().count();
            if allowed == 0 || token_len.abs_diff(term_len) > allowed {
                return None;
            }
            let distance = edit_distance(term, token);
            (distance <= allowed)
                .then(|| 1.0 - distance as f64 / term_len.max(token_len) as f64)
        })
        .sum()
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::wire::{MultiMatch, QueryClause};

    fn doc(id: &str, title: &str, abstract_text: &str, body: &str) -> IndexDocument {
        IndexDocument {
            id: id.into(),
            title: title.into(),
            abstract_text: abstract_text.into(),
            authors: vec![],
            body: body.into(),
            url: String::new(),
            publish_time: String::new(),
            journal: String::new(),
        }
    }

    fn request(query: &str, operator: Operator) -> SearchRequest {
        SearchRequest {
            from: 0,
            size: 10,
            query: QueryClause {
                multi_match: MultiMatch {
                    query: query.into(),
                    fields: vec!["title^2".into(), "abstract".into(), "body".into()],
                    fuzziness: "AUTO".into(),
                    operator,
                },
            },
        }
    }

    fn ids(response: &SearchResponse) -> Vec<&str> {
        response.hits.hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("trial", "trials"), 1);
        assert_eq!(edit_distance("remdesivir", "remdesivr"), 1);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_auto_fuzziness_thresholds() {
        assert_eq!(allowed_edits(2), 0);
        assert_eq!(allowed_edits(4), 1);
        assert_eq!(allowed_edits(6), 2);

        let tokens = vec!["ab".to_string()];
        assert_eq!(fuzzy_frequency("ac", &tokens), 0.0);
        let tokens = vec!["cells".to_string()];
        assert!(fuzzy_frequency("cell", &tokens) > 0.0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let backend = MemoryBackend::new();
        backend.ensure_index("papers").await.unwrap();

        let first = backend
            .bulk_upsert("papers", &[doc("a", "Old title", "", "")])
            .await
            .unwrap();
        assert_eq!(first.items[0].index.status, 201);

        let second = backend
            .bulk_upsert("papers", &[doc("a", "New title", "", "")])
            .await
            .unwrap();
        assert_eq!(second.items[0].index.status, 200);

        assert_eq!(backend.count("papers").await.unwrap(), 1);
        assert_eq!(backend.documents("papers").await[0].title, "New title");
    }

    #[tokio::test]
    async fn test_and_operator_requires_every_term() {
        let backend = MemoryBackend::new();
        backend
            .bulk_upsert(
                "papers",
                &[
                    doc("a", "Ebola vaccine", "", ""),
                    doc("b", "Ebola outbreak", "", "vaccine efficacy"),
                    doc("c", "Influenza outbreak", "", ""),
                ],
            )
            .await
            .unwrap();

        let and = backend
            .search("papers", &request("ebola vaccine", Operator::And))
            .await
            .unwrap();
        assert_eq!(ids(&and).len(), 2);
        assert!(!ids(&and).contains(&"c"));

        let or = backend
            .search("papers", &request("ebola vaccine", Operator::Or))
            .await
            .unwrap();
        assert_eq!(ids(&or).len(), 2);
    }

    #[tokio::test]
    async fn test_typo_still_matches() {
        let backend = MemoryBackend::new();
        backend
            .bulk_upsert("papers", &[doc("a", "Remdesivir in hospitalized adults", "", "")])
            .await
            .unwrap();

        let response = backend
            .search("papers", &request("remdesivr", Operator::And))
            .await
            .unwrap();
        assert_eq!(ids(&response), vec!["a"]);
    }

    #[tokio::test]
    async fn test_title_match_outranks_body_match() {
        let backend = MemoryBackend::new();
        backend
            .bulk_upsert(
                "papers",
                &[
                    doc("body", "Antiviral review", "", "we discuss coronavirus spread"),
                    doc("title", "Coronavirus spread", "", "we discuss antiviral review"),
                ],
            )
            .await
            .unwrap();

        let response = backend
            .search("papers", &request("coronavirus", Operator::And))
            .await
            .unwrap();
        assert_eq!(ids(&response), vec!["title", "body"]);
        let hits = &response.hits.hits;
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_equal_scores_order_by_id() {
        let backend = MemoryBackend::new();
        backend
            .bulk_upsert(
                "papers",
                &[doc("b", "Masks", "", ""), doc("a", "Masks", "", "")],
            )
            .await
            .unwrap();

        let response = backend
            .search("papers", &request("masks", Operator::And))
            .await
            .unwrap();
        assert_eq!(ids(&response), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_index_and_empty_index() {
        let backend = MemoryBackend::new();
        let error = backend
            .search("papers", &request("masks", Operator::And))
            .await
            .unwrap_err();
        assert_eq!(error, BackendError::IndexNotFound("papers".into()));

        backend.ensure_index("papers").await.unwrap();
        let response = backend
            .search("papers", &request("masks", Operator::And))
            .await
            .unwrap();
        assert!(response.hits.hits.is_empty());
    }

    #[tokio::test]
    async fn test_delete_index() {
        let backend = MemoryBackend::new();
        backend.ensure_index("papers").await.unwrap();
        assert!(backend.delete_index("papers").await.unwrap());
        assert!(!backend.delete_index("papers").await.unwrap());
    }
}
