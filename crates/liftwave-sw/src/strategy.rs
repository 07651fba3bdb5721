//! Strategy executors.
//!
//! Each executor takes a request and always produces a well-formed
//! response; network failures become synthetic offline responses, never
//! errors surfaced to the page.

use std::sync::Arc;
use std::time::Instant;

use http::{Method, StatusCode};
use liftwave_net::{Fetch, NetError, Request, Response};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::coordinator::CacheCoordinator;
use crate::metrics::Metrics;
use crate::registry::{CacheKind, CacheRegistry};

const OFFLINE_FILE_MESSAGE: &str = "Offline - File not available";

const OFFLINE_API_ERROR: &str = "Offline - Data not available";

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Offline - Muscle Rotation Manager</title>
<style>
body { font-family: sans-serif; text-align: center; padding: 3rem 1rem; }
button { padding: 0.5rem 1.5rem; font-size: 1rem; }
</style>
</head>
<body>
<h1>You're offline</h1>
<p>Muscle Rotation Manager needs a connection to load this page.</p>
<button onclick="location.reload()">Try again</button>
</body>
</html>
"#;

impl CacheCoordinator {
    /// Fetch through to the network, recording timing.
    async fn timed_fetch(&self, request: Request) -> Result<Response, NetError> {
        let started = Instant::now();
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                self.metrics.record_network(started.elapsed());
                Ok(response)
            }
            Err(e) => {
                self.metrics.record_network_failure();
                Err(e)
            }
        }
    }

    /// Bypass: straight to the network, nothing cached.
    pub(crate) async fn pass_through(&self, request: Request) -> Response {
        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Pass-through request failed");
                Response::synthetic_text(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable",
                )
            }
        }
    }

    /// Cache-first for shell files.
    pub(crate) async fn cache_first(&self, request: Request) -> Response {
        let url = request.url.to_string();

        if let Some(cached) = self.registry.write().await.lookup(CacheKind::Static, &url) {
            self.metrics.record_cache_hit();
            return cached;
        }

        match self.timed_fetch(request).await {
            Ok(response) => {
                // Only complete, typed 200s are worth keeping
                if response.status == StatusCode::OK && response.has_content_type() {
                    self.registry
                        .write()
                        .await
                        .put(CacheKind::Static, &url, response.clone());
                }
                response
            }
            Err(e) => {
                warn!(url, error = %e, "Static fetch failed with no cached copy");
                Response::synthetic_text(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_FILE_MESSAGE)
            }
        }
    }

    /// Cache-first into the dedicated image cache. Missing images degrade
    /// to an empty 404 so pages render without broken-connection errors.
    pub(crate) async fn image_first(&self, request: Request) -> Response {
        let url = request.url.to_string();

        if let Some(cached) = self.registry.write().await.lookup(CacheKind::Image, &url) {
            self.metrics.record_cache_hit();
            return cached;
        }

        match self.timed_fetch(request).await {
            Ok(response) => {
                if response.ok() {
                    self.registry
                        .write()
                        .await
                        .put(CacheKind::Image, &url, response.clone());
                }
                response
            }
            Err(e) => {
                debug!(url, error = %e, "Image unavailable offline");
                Response::empty(StatusCode::NOT_FOUND)
            }
        }
    }

    /// Network-first for API data, falling back to the short-TTL API cache.
    pub(crate) async fn api_network_first(&self, request: Request) -> Response {
        let url = request.url.to_string();
        let method = request.method.clone();

        match self.timed_fetch(request).await {
            Ok(response) => {
                if response.ok() && method == Method::GET {
                    self.registry
                        .write()
                        .await
                        .put(CacheKind::Api, &url, response.clone());
                }
                response
            }
            Err(e) => {
                // TTL is enforced by the lookup itself
                if let Some(cached) = self.registry.write().await.lookup(CacheKind::Api, &url) {
                    self.metrics.record_cache_hit();
                    debug!(url, "Serving stale API data offline");
                    return cached;
                }
                warn!(url, error = %e, "API unreachable with no fresh cached data");
                Response::synthetic_json(
                    StatusCode::SERVICE_UNAVAILABLE,
                    &json!({ "error": OFFLINE_API_ERROR, "offline": true }),
                )
            }
        }
    }

    /// Network-first navigation. Documents are never cached per-request;
    /// offline navigations fall back to the precached shell.
    pub(crate) async fn navigate(&self, request: Request) -> Response {
        match self.timed_fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "Navigation failed, falling back to shell");
                let fallback = match self.config.resolve(&self.config.navigation_fallback) {
                    Ok(url) => url,
                    Err(e) => {
                        warn!(error = %e, "Navigation fallback misconfigured");
                        return Response::synthetic_html(
                            StatusCode::SERVICE_UNAVAILABLE,
                            OFFLINE_PAGE,
                        );
                    }
                };

                if let Some(shell) = self
                    .registry
                    .write()
                    .await
                    .lookup(CacheKind::Static, fallback.as_str())
                {
                    self.metrics.record_cache_hit();
                    return shell;
                }
                Response::synthetic_html(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_PAGE)
            }
        }
    }

    /// Stale-while-revalidate for everything else. A cached copy returns
    /// immediately while the refresh continues in the background; without
    /// one the caller waits on the network. Concurrent revalidations of the
    /// same URL race last-write-wins.
    pub(crate) async fn stale_while_revalidate(&self, request: Request) -> Response {
        let url = request.url.to_string();
        let cached = self.registry.write().await.lookup(CacheKind::Dynamic, &url);

        let refresh = tokio::spawn(revalidate(
            Arc::clone(&self.registry),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.metrics),
            request,
        ));

        if let Some(response) = cached {
            self.metrics.record_cache_hit();
            return response;
        }

        match refresh.await {
            Ok(Some(response)) => response,
            Ok(None) => Response::synthetic_text(
                StatusCode::SERVICE_UNAVAILABLE,
                OFFLINE_FILE_MESSAGE,
            ),
            Err(e) => {
                warn!(url, error = %e, "Revalidation task panicked");
                Response::synthetic_text(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_FILE_MESSAGE)
            }
        }
    }
}

/// Background refresh for stale-while-revalidate. Failures are swallowed;
/// the stale entry stays in place.
async fn revalidate(
    registry: Arc<RwLock<CacheRegistry>>,
    fetcher: Arc<dyn Fetch>,
    metrics: Arc<Metrics>,
    request: Request,
) -> Option<Response> {
    let url = request.url.to_string();
    let started = Instant::now();

    match fetcher.fetch(request).await {
        Ok(response) => {
            metrics.record_network(started.elapsed());
            if response.status == StatusCode::OK && response.has_content_type() {
                registry
                    .write()
                    .await
                    .put(CacheKind::Dynamic, &url, response.clone());
            }
            Some(response)
        }
        Err(e) => {
            metrics.record_network_failure();
            debug!(url, error = %e, "Background revalidation failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use liftwave_net::ScriptedFetcher;
    use url::Url;

    use crate::config::SwConfig;

    fn coordinator_with(config: SwConfig) -> (CacheCoordinator, Arc<ScriptedFetcher>) {
        let fetcher = Arc::new(ScriptedFetcher::new());
        let coordinator =
            CacheCoordinator::new(config, fetcher.clone() as Arc<dyn Fetch>).unwrap();
        (coordinator, fetcher)
    }

    fn coordinator() -> (CacheCoordinator, Arc<ScriptedFetcher>) {
        coordinator_with(SwConfig::default())
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    // ==================== Cache-first ====================

    #[tokio::test]
    async fn test_static_cached_after_first_fetch() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://muscle-rotation.app/css/style.css";
        fetcher.respond(url, 200, Some("text/css"), "body{}");

        let first = coordinator.handle_fetch(get(url)).await;
        assert!(first.ok());
        let second = coordinator.handle_fetch(get(url)).await;
        assert_eq!(second.text().unwrap(), "body{}");

        // Second request never hit the network
        assert_eq!(fetcher.calls_for(url), 1);
        assert_eq!(coordinator.metrics().cache_hits(), 1);
    }

    #[tokio::test]
    async fn test_static_error_status_not_cached() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://muscle-rotation.app/js/missing.js";
        fetcher.respond(url, 404, Some("text/plain"), "nope");

        let response = coordinator.handle_fetch(get(url)).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        coordinator.handle_fetch(get(url)).await;
        assert_eq!(fetcher.calls_for(url), 2);
    }

    #[tokio::test]
    async fn test_static_untyped_response_not_cached() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://muscle-rotation.app/js/app.js";
        fetcher.respond(url, 200, None, "console.log(1)");

        coordinator.handle_fetch(get(url)).await;
        coordinator.handle_fetch(get(url)).await;
        assert_eq!(fetcher.calls_for(url), 2);
    }

    #[tokio::test]
    async fn test_static_offline_miss_is_synthetic_503() {
        let (coordinator, fetcher) = coordinator();
        fetcher.set_offline(true);

        let response = coordinator
            .handle_fetch(get("https://muscle-rotation.app/css/style.css"))
            .await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.text().unwrap(), OFFLINE_FILE_MESSAGE);
    }

    // ==================== Images ====================

    #[tokio::test]
    async fn test_image_uses_image_cache() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://muscle-rotation.app/images/hero.webp";
        fetcher.respond(url, 200, Some("image/webp"), "webp-bytes");

        coordinator.handle_fetch(get(url)).await;
        assert_eq!(
            coordinator
                .registry()
                .write()
                .await
                .entry_count(CacheKind::Image),
            1
        );
        assert_eq!(
            coordinator
                .registry()
                .write()
                .await
                .entry_count(CacheKind::Static),
            0
        );
    }

    #[tokio::test]
    async fn test_uncached_image_offline_is_empty_404() {
        let (coordinator, fetcher) = coordinator();
        fetcher.set_offline(true);

        let response = coordinator
            .handle_fetch(get("https://muscle-rotation.app/icons/icon-512x512.png"))
            .await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert!(response.body.is_empty());
    }

    // ==================== API ====================

    #[tokio::test]
    async fn test_api_always_network_first() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://xyz.supabase.co/rest/v1/workouts";
        fetcher.respond(url, 200, Some("application/json"), r#"[{"id":1}]"#);

        coordinator.handle_fetch(get(url)).await;
        coordinator.handle_fetch(get(url)).await;

        // Fresh data wins even with a cached copy present
        assert_eq!(fetcher.calls_for(url), 2);
        assert_eq!(coordinator.metrics().cache_hits(), 0);
    }

    #[tokio::test]
    async fn test_api_offline_serves_cached_within_ttl() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://xyz.supabase.co/rest/v1/workouts";
        fetcher.respond(url, 200, Some("application/json"), r#"[{"id":1}]"#);

        coordinator.handle_fetch(get(url)).await;
        fetcher.set_offline(true);

        let response = coordinator.handle_fetch(get(url)).await;
        assert!(response.ok());
        assert_eq!(response.text().unwrap(), r#"[{"id":1}]"#);
        assert_eq!(coordinator.metrics().cache_hits(), 1);
    }

    #[tokio::test]
    async fn test_api_offline_past_ttl_is_synthetic_503() {
        let mut config = SwConfig::default();
        config.api_ttl = Duration::from_millis(50);
        let (coordinator, fetcher) = coordinator_with(config);

        let url = "https://xyz.supabase.co/rest/v1/workouts";
        fetcher.respond(url, 200, Some("application/json"), r#"[{"id":1}]"#);
        coordinator.handle_fetch(get(url)).await;

        fetcher.set_offline(true);
        tokio::time::sleep(Duration::from_millis(80)).await;

        let response = coordinator.handle_fetch(get(url)).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["error"], OFFLINE_API_ERROR);
        assert_eq!(body["offline"], true);
    }

    // ==================== Navigation ====================

    #[tokio::test]
    async fn test_navigation_not_cached() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://muscle-rotation.app/dashboard";
        fetcher.respond(url, 200, Some("text/html"), "<html>dash</html>");

        let request = Request::navigate(Url::parse(url).unwrap());
        coordinator.handle_fetch(request.clone()).await;
        coordinator.handle_fetch(request).await;

        assert_eq!(fetcher.calls_for(url), 2);
        let registry = coordinator.registry();
        let mut registry = registry.write().await;
        for kind in CacheKind::ALL {
            assert_eq!(registry.entry_count(kind), 0);
        }
    }

    #[tokio::test]
    async fn test_navigation_offline_serves_cached_shell() {
        let (coordinator, fetcher) = coordinator();
        coordinator.registry().write().await.put(
            CacheKind::Static,
            "https://muscle-rotation.app/index.html",
            Response::synthetic_html(StatusCode::OK, "<html>shell</html>"),
        );
        fetcher.set_offline(true);

        let request =
            Request::navigate(Url::parse("https://muscle-rotation.app/dashboard").unwrap());
        let response = coordinator.handle_fetch(request).await;
        assert!(response.ok());
        assert_eq!(response.text().unwrap(), "<html>shell</html>");
    }

    #[tokio::test]
    async fn test_navigation_offline_without_shell_is_offline_page() {
        let (coordinator, fetcher) = coordinator();
        fetcher.set_offline(true);

        let request =
            Request::navigate(Url::parse("https://muscle-rotation.app/dashboard").unwrap());
        let response = coordinator.handle_fetch(request).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.text().unwrap().contains("location.reload()"));
    }

    // ==================== Stale-while-revalidate ====================

    #[tokio::test]
    async fn test_swr_first_request_waits_for_network() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://fonts.example.com/inter.woff2";
        fetcher.respond(url, 200, Some("font/woff2"), "v1");

        let response = coordinator.handle_fetch(get(url)).await;
        assert_eq!(response.text().unwrap(), "v1");
        assert_eq!(
            coordinator
                .registry()
                .write()
                .await
                .entry_count(CacheKind::Dynamic),
            1
        );
    }

    #[tokio::test]
    async fn test_swr_serves_stale_without_waiting() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://fonts.example.com/inter.woff2";
        fetcher.respond(url, 200, Some("font/woff2"), "v1");
        coordinator.handle_fetch(get(url)).await;

        // Make the refresh slow; the cached copy must come back immediately
        fetcher.respond_with_delay(url, 200, Some("font/woff2"), "v2", Duration::from_secs(5));

        let response = tokio::time::timeout(
            Duration::from_secs(1),
            coordinator.handle_fetch(get(url)),
        )
        .await
        .expect("stale copy should not wait for revalidation");

        assert_eq!(response.text().unwrap(), "v1");
        assert_eq!(coordinator.metrics().cache_hits(), 1);
    }

    #[tokio::test]
    async fn test_swr_background_refresh_updates_cache() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://fonts.example.com/inter.woff2";
        fetcher.respond(url, 200, Some("font/woff2"), "v1");
        coordinator.handle_fetch(get(url)).await;

        fetcher.respond(url, 200, Some("font/woff2"), "v2");
        let stale = coordinator.handle_fetch(get(url)).await;
        assert_eq!(stale.text().unwrap(), "v1");

        // Let the spawned refresh land
        tokio::time::sleep(Duration::from_millis(50)).await;
        let refreshed = coordinator.handle_fetch(get(url)).await;
        assert_eq!(refreshed.text().unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_swr_offline_miss_is_synthetic_503() {
        let (coordinator, fetcher) = coordinator();
        fetcher.set_offline(true);

        let response = coordinator
            .handle_fetch(get("https://fonts.example.com/inter.woff2"))
            .await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_swr_failed_refresh_keeps_stale_entry() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://fonts.example.com/inter.woff2";
        fetcher.respond(url, 200, Some("font/woff2"), "v1");
        coordinator.handle_fetch(get(url)).await;

        fetcher.set_offline(true);
        let response = coordinator.handle_fetch(get(url)).await;
        assert_eq!(response.text().unwrap(), "v1");

        tokio::time::sleep(Duration::from_millis(50)).await;
        let again = coordinator.handle_fetch(get(url)).await;
        assert_eq!(again.text().unwrap(), "v1");
    }

    // ==================== Bypass ====================

    #[tokio::test]
    async fn test_post_bypasses_all_caches() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://xyz.supabase.co/rest/v1/workouts";
        fetcher.respond(url, 201, Some("application/json"), "{}");

        let request = Request::post(Url::parse(url).unwrap(), bytes::Bytes::from("{}"));
        let response = coordinator.handle_fetch(request).await;
        assert_eq!(response.status, StatusCode::CREATED);

        let registry = coordinator.registry();
        let mut registry = registry.write().await;
        for kind in CacheKind::ALL {
            assert_eq!(registry.entry_count(kind), 0);
        }
        // Bypass traffic is not counted
        assert_eq!(coordinator.metrics().total_requests(), 0);
    }

    #[tokio::test]
    async fn test_bypass_failure_is_synthetic_503() {
        let (coordinator, fetcher) = coordinator();
        fetcher.set_offline(true);

        let request = Request::post(
            Url::parse("https://xyz.supabase.co/rest/v1/workouts").unwrap(),
            bytes::Bytes::from("{}"),
        );
        let response = coordinator.handle_fetch(request).await;
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.text().unwrap(), "Service temporarily unavailable");
    }

    // ==================== Metrics ====================

    #[tokio::test]
    async fn test_hit_rate_reflects_traffic() {
        let (coordinator, fetcher) = coordinator();
        let url = "https://muscle-rotation.app/css/style.css";
        fetcher.respond(url, 200, Some("text/css"), "body{}");

        coordinator.handle_fetch(get(url)).await; // network
        coordinator.handle_fetch(get(url)).await; // hit
        coordinator.handle_fetch(get(url)).await; // hit

        let stats = coordinator.metrics().snapshot("muscle-rotation-v1.0.0");
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.cache_hits, 2);
        assert_eq!(stats.cache_hit_rate, 66.67);
    }
}
