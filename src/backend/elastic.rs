//! Elasticsearch-compatible REST backend.
//!
//! ## Endpoints
//!
//! ```text
//! PUT    /{index}           create index (already-exists tolerated)
//! POST   /_bulk             NDJSON upserts
//! POST   /{index}/_search   weighted fuzzy multi_match
//! GET    /{index}/_count    document count
//! DELETE /{index}           drop index
//! ```
//!
//! ## Failure classification
//!
//! - 413 → [`BackendError::PayloadTooLarge`]
//! - 429 → [`BackendError::Throttled`]
//! - 502/503/504, timeouts, refused or reset connections → [`BackendError::Transient`]
//! - 404 `index_not_found_exception` → [`BackendError::IndexNotFound`]
//!
//! Transient failures fail over to the next configured host before surfacing.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::wire::{self, BulkResponse, CountResponse, SearchRequest, SearchResponse};
use super::{BackendError, SearchBackend};
use crate::error::{AppError, Result};
use crate::models::{BackendConfig, IndexDocument};
use crate::utils::http::create_async_client;

const NDJSON: &str = "application/x-ndjson";

/// Backend talking to one or more Elasticsearch nodes.
#[derive(Clone)]
pub struct ElasticBackend {
    client: Client,
    hosts: Vec<Url>,
}

impl ElasticBackend {
    /// Create a backend from an existing client and a host list.
    pub fn new(client: Client, hosts: &[String]) -> Result<Self> {
        if hosts.is_empty() {
            return Err(AppError::config("no backend hosts configured"));
        }
        let hosts = hosts
            .iter()
            .map(|host| -> Result<Url> {
                let mut url = Url::parse(host)?;
                // Url::join replaces the last segment unless the path ends in '/'
                if !url.path().ends_with('/') {
                    let path = format!("{}/", url.path());
                    url.set_path(&path);
                }
                Ok(url)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { client, hosts })
    }

    /// Create a backend with a client built from configuration.
    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let client = create_async_client(config)?;
        Self::new(client, &config.hosts)
    }

    pub fn hosts(&self) -> &[Url] {
        &self.hosts
    }

    /// Send a request to the first host that answers.
    ///
    /// Only transport failures and gateway statuses move on to the next host.
    async fn send<F>(&self, path: &str, build: F) -> std::result::Result<Response, BackendError>
    where
        F: Fn(&Client, Url) -> RequestBuilder,
    {
        let mut last_error = None;

        for (position, host) in self.hosts.iter().enumerate() {
            let has_next = position + 1 < self.hosts.len();
            let url = host
                .join(path)
                .map_err(|e| BackendError::Malformed(format!("invalid endpoint {path}: {e}")))?;

            match build(&self.client, url).send().await {
                Ok(response) if has_next && is_gateway_failure(response.status()) => {
                    log::warn!(
                        "Backend host {} answered {}, trying next host",
                        host,
                        response.status()
                    );
                    last_error = Some(BackendError::Transient(format!(
                        "status {}",
                        response.status().as_u16()
                    )));
                }
                Ok(response) => return Ok(response),
                Err(error) => {
                    let error = transport_error(&error);
                    if has_next {
                        log::warn!("Backend host {} failed ({}), trying next host", host, error);
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| BackendError::Transient("no backend hosts configured".into())))
    }
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn ensure_index(&self, index: &str) -> std::result::Result<(), BackendError> {
        let response = self.send(index, |client, url| client.put(url)).await?;
        let status = response.status();
        if status.is_success() {
            log::info!("Created index {}", index);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception")
        {
            log::debug!("Index {} already exists", index);
            return Ok(());
        }
        Err(classify(status.as_u16(), &body, index))
    }

    async fn bulk_upsert(
        &self,
        index: &str,
        documents: &[IndexDocument],
    ) -> std::result::Result<BulkResponse, BackendError> {
        let body = wire::bulk_body(index, documents)
            .map_err(|e| BackendError::Malformed(format!("failed to encode bulk body: {e}")))?;

        let response = self
            .send("_bulk", |client, url| {
                client
                    .post(url)
                    .header(reqwest::header::CONTENT_TYPE, NDJSON)
                    .body(body.clone())
            })
            .await?;

        decode(response, index).await
    }

    async fn search(
        &self,
        index: &str,
        request: &SearchRequest,
    ) -> std::result::Result<SearchResponse, BackendError> {
        let path = format!("{index}/_search");
        let response = self
            .send(&path, |client, url| client.post(url).json(request))
            .await?;
        decode(response, index).await
    }

    async fn count(&self, index: &str) -> std::result::Result<u64, BackendError> {
        let path = format!("{index}/_count");
        let response = self.send(&path, |client, url| client.get(url)).await?;
        let count: CountResponse = decode(response, index).await?;
        Ok(count.count)
    }

    async fn delete_index(&self, index: &str) -> std::result::Result<bool, BackendError> {
        let response = self.send(index, |client, url| client.delete(url)).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify(status.as_u16(), &body, index))
    }
}

/// Decode a success body, or classify the failure status.
async fn decode<T: DeserializeOwned>(
    response: Response,
    index: &str,
) -> std::result::Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify(status.as_u16(), &body, index));
    }
    // A body cut off mid-read is a connectivity failure, not a bad payload
    let bytes = response
        .bytes()
        .await
        .map_err(|e| BackendError::Transient(format!("failed to read response body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| BackendError::Malformed(e.to_string()))
}

fn is_gateway_failure(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502..=504)
}

/// Map a failed HTTP status and its body to a backend failure class.
pub(crate) fn classify(status: u16, body: &str, index: &str) -> BackendError {
    let reason = body_reason(body);
    match status {
        413 => BackendError::PayloadTooLarge,
        429 => BackendError::Throttled(reason),
        502..=504 => BackendError::Transient(format!("status {status}: {reason}")),
        404 if body.contains("index_not_found_exception") => {
            BackendError::IndexNotFound(index.to_string())
        }
        _ => BackendError::Rejected { status, reason },
    }
}

fn transport_error(error: &reqwest::Error) -> BackendError {
    if error.is_decode() {
        BackendError::Malformed(error.to_string())
    } else {
        BackendError::Transient(error.to_string())
    }
}

fn body_reason(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("error") {
            Some(error) => wire::error_reason(error),
            None => value.to_string(),
        },
        Err(_) => body.chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::wire::{MultiMatch, Operator, QueryClause};
    use mockito::{Matcher, Server};

    fn backend(hosts: &[String]) -> ElasticBackend {
        ElasticBackend::new(Client::new(), hosts).unwrap()
    }

    fn doc(id: &str) -> IndexDocument {
        IndexDocument {
            id: id.into(),
            title: "Remdesivir trial outcomes".into(),
            abstract_text: String::new(),
            authors: vec!["Wang, Y".into()],
            body: "Patients improved.".into(),
            url: String::new(),
            publish_time: "2020-04-29".into(),
            journal: "Lancet".into(),
        }
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            from: 0,
            size: 20,
            query: QueryClause {
                multi_match: MultiMatch {
                    query: query.into(),
                    fields: vec!["title^2".into(), "abstract".into(), "body".into()],
                    fuzziness: "AUTO".into(),
                    operator: Operator::And,
                },
            },
        }
    }

    #[test]
    fn classify_maps_statuses() {
        assert_eq!(classify(413, "", "p"), BackendError::PayloadTooLarge);
        assert!(matches!(classify(429, "{}", "p"), BackendError::Throttled(_)));
        assert!(matches!(classify(503, "", "p"), BackendError::Transient(_)));
        assert_eq!(
            classify(
                404,
                r#"{"error":{"type":"index_not_found_exception","reason":"no such index [p]"}}"#,
                "p"
            ),
            BackendError::IndexNotFound("p".into())
        );
        assert_eq!(
            classify(
                400,
                r#"{"error":{"type":"parsing_exception","reason":"unknown query"}}"#,
                "p"
            ),
            BackendError::Rejected {
                status: 400,
                reason: "parsing_exception: unknown query".into()
            }
        );
    }

    #[test]
    fn host_without_trailing_slash_keeps_path() {
        let backend = backend(&["http://localhost:9200/es".to_string()]);
        let url = backend.hosts()[0].join("_bulk").unwrap();
        assert_eq!(url.as_str(), "http://localhost:9200/es/_bulk");
    }

    #[tokio::test]
    async fn bulk_sends_ndjson_and_parses_items() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/_bulk")
            .match_header("content-type", NDJSON)
            .match_body(Matcher::Regex(r#""_id":"a1""#.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"took":1,"errors":false,"items":[{"index":{"_id":"a1","status":201}}]}"#)
            .create_async()
            .await;

        let backend = backend(&[server.url()]);
        let response = backend.bulk_upsert("papers", &[doc("a1")]).await.unwrap();

        mock.assert_async().await;
        assert!(!response.errors);
        assert_eq!(response.items.len(), 1);
    }

    #[tokio::test]
    async fn bulk_413_is_payload_too_large() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/_bulk")
            .with_status(413)
            .create_async()
            .await;

        let backend = backend(&[server.url()]);
        let error = backend.bulk_upsert("papers", &[doc("a1")]).await.unwrap_err();
        assert_eq!(error, BackendError::PayloadTooLarge);
    }

    #[tokio::test]
    async fn bulk_429_is_throttled() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/_bulk")
            .with_status(429)
            .with_body(
                r#"{"error":{"type":"es_rejected_execution_exception","reason":"queue full"},"status":429}"#,
            )
            .create_async()
            .await;

        let backend = backend(&[server.url()]);
        let error = backend.bulk_upsert("papers", &[doc("a1")]).await.unwrap_err();
        assert_eq!(
            error,
            BackendError::Throttled("es_rejected_execution_exception: queue full".into())
        );
    }

    #[tokio::test]
    async fn unreachable_host_fails_over_to_next() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/papers/_count")
            .with_status(200)
            .with_body(r#"{"count":42}"#)
            .create_async()
            .await;

        let backend = backend(&["http://127.0.0.1:1".to_string(), server.url()]);
        assert_eq!(backend.count("papers").await.unwrap(), 42);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_single_host_is_transient() {
        let backend = backend(&["http://127.0.0.1:1".to_string()]);
        let error = backend.count("papers").await.unwrap_err();
        assert!(matches!(error, BackendError::Transient(_)));
    }

    #[tokio::test]
    async fn ensure_index_tolerates_existing_index() {
        let mut server = Server::new_async().await;
        server
            .mock("PUT", "/papers")
            .with_status(400)
            .with_body(
                r#"{"error":{"type":"resource_already_exists_exception","reason":"index [papers] already exists"},"status":400}"#,
            )
            .create_async()
            .await;

        let backend = backend(&[server.url()]);
        assert!(backend.ensure_index("papers").await.is_ok());
    }

    #[tokio::test]
    async fn search_sends_query_and_decodes_hits() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/papers/_search")
            .match_body(Matcher::PartialJsonString(
                r#"{"query":{"multi_match":{"fuzziness":"AUTO","operator":"and"}}}"#.into(),
            ))
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "hits": {
                        "total": {"value": 1},
                        "hits": [{"_id": "a1", "_score": 3.5, "_source": doc("a1")}]
                    }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let backend = backend(&[server.url()]);
        let response = backend.search("papers", &request("remdesivir")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.hits.hits.len(), 1);
        assert_eq!(response.hits.hits[0].score, Some(3.5));
        assert_eq!(response.hits.hits[0].source.title, "Remdesivir trial outcomes");
    }

    #[tokio::test]
    async fn search_on_missing_index_is_index_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/papers/_search")
            .with_status(404)
            .with_body(
                r#"{"error":{"type":"index_not_found_exception","reason":"no such index [papers]"},"status":404}"#,
            )
            .create_async()
            .await;

        let backend = backend(&[server.url()]);
        let error = backend.search("papers", &request("x")).await.unwrap_err();
        assert_eq!(error, BackendError::IndexNotFound("papers".into()));
    }

    /// Serve one request with a 200 whose body stops short of its declared length.
    async fn truncated_body_server() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            // Drain the request so closing the socket does not reset it early
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 500\r\n\r\n{\"errors\":false,\"items\":[",
                )
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn body_cut_off_mid_read_is_retryable() {
        let backend = backend(&[truncated_body_server().await]);

        let error = backend.bulk_upsert("papers", &[doc("a1")]).await.unwrap_err();

        assert!(matches!(error, BackendError::Transient(_)), "{error:?}");
        assert!(error.is_retryable());
    }

    #[tokio::test]
    async fn undecodable_complete_body_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/papers/_count")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let backend = backend(&[server.url()]);
        let error = backend.count("papers").await.unwrap_err();
        assert!(matches!(error, BackendError::Malformed(_)));
        assert!(!error.is_retryable());
    }

    #[tokio::test]
    async fn delete_missing_index_returns_false() {
        let mut server = Server::new_async().await;
        server
            .mock("DELETE", "/papers")
            .with_status(404)
            .create_async()
            .await;

        let backend = backend(&[server.url()]);
        assert!(!backend.delete_index("papers").await.unwrap());
    }
}
