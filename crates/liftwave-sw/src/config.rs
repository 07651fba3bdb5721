//! Coordinator configuration.
//!
//! Defaults mirror the production Muscle Rotation Manager deployment:
//! critical shell files, best-effort asset lists, Supabase API patterns,
//! cache caps, and the versioned cache naming convention.

use std::time::Duration;

use liftwave_common::RetryPolicy;
use url::Url;

use crate::registry::CacheKind;
use crate::SwError;

/// Configuration for the offline cache coordinator.
#[derive(Debug, Clone)]
pub struct SwConfig {
    /// Application slug used in cache names.
    pub app_name: String,
    /// Deployment version. Bumping this is the only supported cache
    /// invalidation mechanism across deployments.
    pub version: String,
    /// Service worker scope; install-time paths resolve against it.
    pub scope: Url,

    /// Critical shell files. Install fails if any of these cannot be
    /// fetched.
    pub static_files: Vec<String>,
    /// Best-effort image precache list.
    pub image_files: Vec<String>,
    /// Best-effort HTML partials precache list.
    pub partial_files: Vec<String>,

    /// Regexes matching the remote data-service REST and auth prefixes.
    pub api_patterns: Vec<String>,

    /// Entry cap for the dynamic cache.
    pub dynamic_cap: usize,
    /// Entry cap for the API cache.
    pub api_cap: usize,
    /// Entry cap for the image cache.
    pub image_cap: usize,

    /// TTL for API cache entries, honored at read time.
    pub api_ttl: Duration,

    /// Document served when navigation fails offline.
    pub navigation_fallback: String,

    /// Endpoint for replaying offline workout mutations.
    pub workout_sync_path: String,
    /// Endpoint for replaying offline settings changes.
    pub settings_sync_path: String,
    /// Backoff policy for sync replay attempts.
    pub sync_retry: RetryPolicy,
}

impl Default for SwConfig {
    fn default() -> Self {
        Self {
            app_name: "muscle-rotation".to_string(),
            version: "1.0.0".to_string(),
            scope: Url::parse("https://muscle-rotation.app/").expect("valid scope URL"),
            static_files: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/lp.html".to_string(),
                "/manifest.json".to_string(),
                "/css/style.css".to_string(),
                "/js/app.js".to_string(),
                "/js/muscle-data.js".to_string(),
                "/js/i18n.js".to_string(),
                "/js/offline.js".to_string(),
                "/offline.html".to_string(),
            ],
            image_files: vec![
                "/icons/icon-192x192.png".to_string(),
                "/icons/icon-512x512.png".to_string(),
                "/icons/badge-72x72.png".to_string(),
            ],
            partial_files: vec![
                "/partials/navigation.html".to_string(),
                "/partials/workout-form.html".to_string(),
            ],
            api_patterns: vec![
                r"^https://.*\.supabase\.co/rest/v1/".to_string(),
                r"^https://.*\.supabase\.co/auth/v1/".to_string(),
            ],
            dynamic_cap: 50,
            api_cap: 30,
            image_cap: 100,
            api_ttl: Duration::from_secs(5 * 60),
            navigation_fallback: "/index.html".to_string(),
            workout_sync_path: "/api/sync-workouts".to_string(),
            settings_sync_path: "/api/sync-settings".to_string(),
            sync_retry: RetryPolicy::sync_replay(),
        }
    }
}

impl SwConfig {
    /// Versioned name for a cache kind: `{app}-{kind}-v{version}`.
    pub fn cache_name(&self, kind: CacheKind) -> String {
        format!("{}-{}-v{}", self.app_name, kind.as_str(), self.version)
    }

    /// All cache names belonging to the current version. The activate
    /// handler deletes anything not in this list.
    pub fn whitelist(&self) -> Vec<String> {
        CacheKind::ALL.iter().map(|k| self.cache_name(*k)).collect()
    }

    /// Version string reported over the control plane.
    pub fn version_string(&self) -> String {
        format!("{}-v{}", self.app_name, self.version)
    }

    /// Resolve a path against the worker scope.
    pub fn resolve(&self, path: &str) -> Result<Url, SwError> {
        self.scope
            .join(path)
            .map_err(|e| SwError::ConfigError(format!("cannot resolve {path}: {e}")))
    }

    /// Entry cap for a cache kind. The static cache is unbounded.
    pub fn cap_for(&self, kind: CacheKind) -> Option<usize> {
        match kind {
            CacheKind::Static => None,
            CacheKind::Dynamic => Some(self.dynamic_cap),
            CacheKind::Image => Some(self.image_cap),
            CacheKind::Api => Some(self.api_cap),
        }
    }

    /// Read-time TTL for a cache kind. Only API entries expire.
    pub fn ttl_for(&self, kind: CacheKind) -> Option<Duration> {
        match kind {
            CacheKind::Api => Some(self.api_ttl),
            _ => None,
        }
    }
}
