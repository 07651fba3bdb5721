//! Scripted fetcher for tests and the smoke harness.
//!
//! Routes are keyed by full URL; the response template is cloned per call.
//! An `offline` flag makes every fetch fail the way a dead network does,
//! and per-route delays let tests observe whether a caller waited on the
//! network at all.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hashbrown::HashMap;
use http::{HeaderMap, HeaderValue, StatusCode};
use url::Url;

use crate::{Fetch, NetError, Request, Response};

#[derive(Debug, Clone)]
struct Route {
    status: StatusCode,
    content_type: Option<String>,
    body: Bytes,
    delay: Option<Duration>,
}

/// In-memory `Fetch` implementation with scripted responses.
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Route>>,
    calls: Mutex<HashMap<String, u64>>,
    total_calls: AtomicU64,
    offline: AtomicBool,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for a URL. Method is ignored; the coordinator keys
    /// caches by URL as well.
    pub fn respond(&self, url: &str, status: u16, content_type: Option<&str>, body: &str) {
        self.routes.lock().unwrap().insert(
            url.to_string(),
            Route {
                status: StatusCode::from_u16(status).expect("valid status"),
                content_type: content_type.map(|s| s.to_string()),
                body: Bytes::copy_from_slice(body.as_bytes()),
                delay: None,
            },
        );
    }

    /// Script a response that is only produced after a delay.
    pub fn respond_with_delay(
        &self,
        url: &str,
        status: u16,
        content_type: Option<&str>,
        body: &str,
        delay: Duration,
    ) {
        self.respond(url, status, content_type, body);
        if let Some(route) = self.routes.lock().unwrap().get_mut(url) {
            route.delay = Some(delay);
        }
    }

    /// Remove a scripted route.
    pub fn remove(&self, url: &str) {
        self.routes.lock().unwrap().remove(url);
    }

    /// Toggle the offline flag. When offline, every fetch returns an error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches issued for a URL (including failed ones).
    pub fn calls_for(&self, url: &str) -> u64 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Total number of fetches issued.
    pub fn total_calls(&self) -> u64 {
        self.total_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        let url = request.url.to_string();

        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(url.clone()).or_insert(0) += 1;

        let route = self.routes.lock().unwrap().get(&url).cloned();

        if let Some(delay) = route.as_ref().and_then(|r| r.delay) {
            tokio::time::sleep(delay).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(NetError::Offline(url));
        }

        let route = route.ok_or_else(|| NetError::RequestFailed(format!("no route for {url}")))?;

        let mut headers = HeaderMap::new();
        if let Some(ct) = &route.content_type {
            if let Ok(value) = HeaderValue::from_str(ct) {
                headers.insert(http::header::CONTENT_TYPE, value);
            }
        }

        Ok(Response::new(
            Url::parse(&url).ok(),
            route.status,
            headers,
            route.body,
        ))
    }
}
