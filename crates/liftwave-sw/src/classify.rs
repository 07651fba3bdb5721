//! Request classification.
//!
//! An ordered list of (predicate, strategy) rules evaluated first-match.
//! Classification is pure and total: every request maps to exactly one
//! strategy, with stale-while-revalidate as the catch-all.

use http::Method;
use liftwave_net::{Request, RequestMode};
use regex::Regex;

use crate::config::SwConfig;
use crate::SwError;

/// Handling strategy for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Pass through to the network untouched, no caching.
    Bypass,
    /// Dedicated image cache, cache-first.
    Image,
    /// Static shell cache, cache-first.
    Static,
    /// Network-first with short-TTL cache fallback.
    Api,
    /// Network-first with pinned shell fallback, never cached per-request.
    Navigation,
    /// Default: serve stale, refresh in the background.
    StaleWhileRevalidate,
}

/// Browser-internal schemes the cache API cannot store.
const EXTENSION_SCHEMES: &[&str] = &["chrome-extension", "moz-extension", "safari-web-extension"];

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".ico"];

type Predicate = fn(&Classifier, &Request) -> bool;

/// Classifies requests into strategies.
pub struct Classifier {
    static_files: Vec<String>,
    api_patterns: Vec<Regex>,
    rules: Vec<(Predicate, Strategy)>,
}

impl Classifier {
    pub fn new(config: &SwConfig) -> Result<Self, SwError> {
        let api_patterns = config
            .api_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| SwError::ConfigError(format!("bad API pattern {pattern}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            static_files: config.static_files.clone(),
            api_patterns,
            rules: vec![
                (Self::is_bypass, Strategy::Bypass),
                (Self::is_image, Strategy::Image),
                (Self::is_static, Strategy::Static),
                (Self::is_api, Strategy::Api),
                (Self::is_navigation, Strategy::Navigation),
            ],
        })
    }

    /// Map a request to exactly one strategy.
    pub fn classify(&self, request: &Request) -> Strategy {
        for (matches, strategy) in &self.rules {
            if matches(self, request) {
                return *strategy;
            }
        }
        Strategy::StaleWhileRevalidate
    }

    fn is_bypass(&self, request: &Request) -> bool {
        request.method != Method::GET || EXTENSION_SCHEMES.contains(&request.url.scheme())
    }

    fn is_image(&self, request: &Request) -> bool {
        let path = request.url.path().to_ascii_lowercase();
        IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
            || path.contains("/icons/")
            || path.contains("/images/")
    }

    fn is_static(&self, request: &Request) -> bool {
        let url = request.url.as_str();
        let path = request.url.path();
        self.static_files.iter().any(|file| url.ends_with(file.as_str()))
            || path.contains("/css/")
            || path.contains("/js/")
            || path.contains("/partials/")
            || path.ends_with(".html")
    }

    fn is_api(&self, request: &Request) -> bool {
        let url = request.url.as_str();
        self.api_patterns.iter().any(|pattern| pattern.is_match(url))
    }

    fn is_navigation(&self, request: &Request) -> bool {
        request.mode == RequestMode::Navigate
            || (request.method == Method::GET
                && request
                    .accept_header()
                    .is_some_and(|accept| accept.contains("text/html")))
    }
}
