//! # Liftwave Net
//!
//! HTTP request/response model and the fetch seam used by the offline cache
//! coordinator.
//!
//! ## Design Goals
//!
//! 1. **Cloneable responses**: cache entries store response clones
//! 2. **Fetch trait**: the coordinator never talks to the network directly
//! 3. **Synthetic responses**: offline fallbacks are well-formed responses,
//!    never errors surfaced to the request pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use mime::Mime;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, trace};
use url::Url;

pub mod testing;

pub use testing::ScriptedFetcher;

/// Errors that can occur while fetching.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Offline: {0}")]
    Offline(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Unique identifier for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Request mode, mirroring the fetch API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document navigation.
    Navigate,
    /// Same-origin only.
    SameOrigin,
    /// Cross-origin with CORS.
    #[default]
    Cors,
    /// Cross-origin without CORS.
    NoCors,
}

/// HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: RequestId,
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    pub mode: RequestMode,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            timeout: Some(Duration::from_secs(30)),
            mode: RequestMode::Cors,
        }
    }

    /// Create a POST request.
    pub fn post(url: Url, body: Bytes) -> Self {
        Self {
            id: RequestId::new(),
            url,
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(body),
            timeout: Some(Duration::from_secs(30)),
            mode: RequestMode::Cors,
        }
    }

    /// Create a navigation request (GET, `Accept: text/html`).
    pub fn navigate(url: Url) -> Self {
        let mut request = Self::get(url);
        request.mode = RequestMode::Navigate;
        request.headers.insert(
            http::header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        request
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the Accept header.
    pub fn accept(self, value: &'static str) -> Self {
        self.header(http::header::ACCEPT, HeaderValue::from_static(value))
    }

    /// Set the request mode.
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Value of the Accept header, if present and valid UTF-8.
    pub fn accept_header(&self) -> Option<&str> {
        self.headers
            .get(http::header::ACCEPT)
            .and_then(|v| v.to_str().ok())
    }
}

/// HTTP response.
///
/// Bodies are fully buffered so responses can be cloned into cache entries.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL, if the response came off the network.
    pub url: Option<Url>,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Create a response with the given parts.
    pub fn new(url: Option<Url>, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            url,
            status,
            headers,
            body,
        }
    }

    /// Synthetic plain-text response.
    pub fn synthetic_text(status: StatusCode, body: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain"),
        );
        Self::new(None, status, headers, Bytes::copy_from_slice(body.as_bytes()))
    }

    /// Synthetic JSON response.
    pub fn synthetic_json(status: StatusCode, body: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self::new(None, status, headers, Bytes::from(body.to_string()))
    }

    /// Synthetic HTML response.
    pub fn synthetic_html(status: StatusCode, body: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("text/html"),
        );
        Self::new(None, status, headers, Bytes::copy_from_slice(body.as_bytes()))
    }

    /// Empty response with the given status.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(None, status, HeaderMap::new(), Bytes::new())
    }

    /// Check if the response was successful (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Parse the Content-Type header, if any.
    pub fn content_type(&self) -> Option<Mime> {
        self.headers
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<Mime>().ok())
    }

    /// Whether a Content-Type header is present at all.
    pub fn has_content_type(&self) -> bool {
        self.headers.contains_key(http::header::CONTENT_TYPE)
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }

    /// Get the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        serde_json::from_slice(&self.body).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}

/// The seam to the host network. Strategy executors fetch through this
/// trait; tests and the smoke harness script it.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Perform the request. A served error status is `Ok` with a non-2xx
    /// status; `Err` means the network itself failed.
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;
}

/// Configuration for the reqwest-backed fetcher.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User agent string.
    pub user_agent: String,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Liftwave/1.0".to_string(),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

/// Reqwest-backed `Fetch` implementation.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new fetcher.
    pub fn new(config: FetcherConfig) -> Result<Self, NetError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        debug!("HttpFetcher initialized");

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let response = req_builder.send().await?;

        let status = status_from_reqwest(response.status());
        let headers = headers_from_reqwest(response.headers());
        let url = Url::parse(response.url().as_str()).ok();
        let body = response.bytes().await?;

        trace!(
            url = ?url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response::new(url, status, headers, body))
    }
}

// reqwest 0.12 re-exports http 1.x types, but convert defensively so the
// crate compiles against either patch line.
fn status_from_reqwest(status: reqwest::StatusCode) -> StatusCode {
    StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn headers_from_reqwest(headers: &reqwest::header::HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers.iter() {
        if let (Ok(n), Ok(v)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            out.insert(n, v);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let url = Url::parse("https://example.com").unwrap();
        let request = Request::get(url.clone())
            .accept("application/json")
            .timeout(Duration::from_secs(10));

        assert_eq!(request.url, url);
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.accept_header(), Some("application/json"));
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_navigate_request() {
        let url = Url::parse("https://example.com/").unwrap();
        let request = Request::navigate(url);
        assert_eq!(request.mode, RequestMode::Navigate);
        assert!(request.accept_header().unwrap().contains("text/html"));
    }

    #[test]
    fn test_request_id_uniqueness() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_synthetic_text() {
        let response = Response::synthetic_text(StatusCode::SERVICE_UNAVAILABLE, "offline");
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!response.ok());
        assert_eq!(response.text().unwrap(), "offline");
        assert_eq!(response.content_type().unwrap(), mime::TEXT_PLAIN);
    }

    #[test]
    fn test_synthetic_json() {
        let body = serde_json::json!({ "error": "Offline", "offline": true });
        let response = Response::synthetic_json(StatusCode::SERVICE_UNAVAILABLE, &body);
        let parsed: serde_json::Value = response.json().unwrap();
        assert_eq!(parsed["offline"], true);
    }

    #[test]
    fn test_empty_response() {
        let response = Response::empty(StatusCode::NOT_FOUND);
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(response.body.is_empty());
        assert!(!response.has_content_type());
    }

    #[test]
    fn test_response_clone_keeps_body() {
        let response = Response::synthetic_text(StatusCode::OK, "payload");
        let clone = response.clone();
        assert_eq!(clone.text().unwrap(), "payload");
        assert_eq!(response.text().unwrap(), "payload");
    }
}
