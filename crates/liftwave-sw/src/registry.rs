//! Named cache registry.
//!
//! Each logical cache kind maps to exactly one versioned named cache.
//! Entries carry their insertion timestamp so TTLs are enforced lazily at
//! read time rather than with timers, and an insertion sequence so size
//! caps evict oldest-inserted entries first.

use std::time::{Duration, Instant};

use hashbrown::HashMap;
use liftwave_net::Response;
use tracing::{debug, info};

use crate::config::SwConfig;

/// Logical cache kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Static,
    Dynamic,
    Image,
    Api,
}

impl CacheKind {
    pub const ALL: [CacheKind; 4] = [
        CacheKind::Static,
        CacheKind::Dynamic,
        CacheKind::Image,
        CacheKind::Api,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Static => "static",
            CacheKind::Dynamic => "dynamic",
            CacheKind::Image => "image",
            CacheKind::Api => "api",
        }
    }
}

/// A cached request/response pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub url: String,
    pub response: Response,
    pub inserted_at: Instant,
    seq: u64,
}

/// A single named cache: URL-keyed responses with insertion order.
#[derive(Debug)]
pub struct NamedCache {
    name: String,
    ttl: Option<Duration>,
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

impl NamedCache {
    pub fn new(name: impl Into<String>, ttl: Option<Duration>) -> Self {
        Self {
            name: name.into(),
            ttl,
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a URL. Entries past their TTL are treated as absent and
    /// removed.
    pub fn lookup(&mut self, url: &str) -> Option<Response> {
        let expired = match self.entries.get(url) {
            Some(entry) => self
                .ttl
                .is_some_and(|ttl| entry.inserted_at.elapsed() > ttl),
            None => return None,
        };

        if expired {
            self.entries.remove(url);
            debug!(cache = %self.name, url, "Entry expired");
            return None;
        }

        self.entries.get(url).map(|e| e.response.clone())
    }

    /// Store a response. Re-inserting a URL refreshes its timestamp and
    /// moves it to the back of the eviction order.
    pub fn put(&mut self, url: &str, response: Response) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                url: url.to_string(),
                response,
                inserted_at: Instant::now(),
                seq,
            },
        );
    }

    pub fn delete(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Evict oldest-inserted entries until at or under `cap`. Returns the
    /// number of evicted entries.
    pub fn trim_to(&mut self, cap: usize) -> usize {
        if self.entries.len() <= cap {
            return 0;
        }

        let mut order: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|(url, entry)| (url.clone(), entry.seq))
            .collect();
        order.sort_by_key(|(_, seq)| *seq);

        let excess = self.entries.len() - cap;
        for (url, _) in order.into_iter().take(excess) {
            self.entries.remove(&url);
        }

        debug!(cache = %self.name, evicted = excess, cap, "Trimmed cache");
        excess
    }
}

struct Slot {
    kind: CacheKind,
    name: String,
    cap: Option<usize>,
    ttl: Option<Duration>,
}

/// Registry of named caches, one per (kind, version).
pub struct CacheRegistry {
    slots: Vec<Slot>,
    caches: HashMap<String, NamedCache>,
}

impl CacheRegistry {
    pub fn new(config: &SwConfig) -> Self {
        let slots = CacheKind::ALL
            .iter()
            .map(|kind| Slot {
                kind: *kind,
                name: config.cache_name(*kind),
                cap: config.cap_for(*kind),
                ttl: config.ttl_for(*kind),
            })
            .collect();

        Self {
            slots,
            caches: HashMap::new(),
        }
    }

    fn slot(&self, kind: CacheKind) -> &Slot {
        self.slots
            .iter()
            .find(|s| s.kind == kind)
            .expect("every kind has a slot")
    }

    /// Open (create if absent) the current-version cache for a kind.
    pub fn open(&mut self, kind: CacheKind) -> &mut NamedCache {
        let slot = self.slot(kind);
        let name = slot.name.clone();
        let ttl = slot.ttl;
        self.caches
            .entry(name.clone())
            .or_insert_with(|| NamedCache::new(name, ttl))
    }

    /// Open an arbitrary named cache. Stale-version caches left behind by a
    /// previous deployment show up through this path.
    pub fn open_named(&mut self, name: &str) -> &mut NamedCache {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| NamedCache::new(name, None))
    }

    pub fn lookup(&mut self, kind: CacheKind, url: &str) -> Option<Response> {
        self.open(kind).lookup(url)
    }

    pub fn put(&mut self, kind: CacheKind, url: &str, response: Response) {
        self.open(kind).put(url, response);
    }

    pub fn entry_count(&mut self, kind: CacheKind) -> usize {
        self.open(kind).len()
    }

    /// Names of all existing caches.
    pub fn cache_names(&self) -> Vec<String> {
        self.caches.keys().cloned().collect()
    }

    pub fn delete_cache(&mut self, name: &str) -> bool {
        self.caches.remove(name).is_some()
    }

    /// Delete every named cache. Returns the number removed.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.caches.len();
        self.caches.clear();
        removed
    }

    /// Delete caches whose name does not belong to the current version.
    /// Returns the deleted names.
    pub fn purge_stale(&mut self) -> Vec<String> {
        let keep: Vec<&str> = self.slots.iter().map(|s| s.name.as_str()).collect();
        let stale: Vec<String> = self
            .caches
            .keys()
            .filter(|name| !keep.contains(&name.as_str()))
            .cloned()
            .collect();

        for name in &stale {
            self.caches.remove(name);
            info!(cache = %name, "Deleted stale cache");
        }
        stale
    }

    /// Trim every capped cache to its configured cap. Returns total evicted.
    pub fn enforce_caps(&mut self) -> usize {
        let caps: Vec<(String, usize)> = self
            .slots
            .iter()
            .filter_map(|s| s.cap.map(|cap| (s.name.clone(), cap)))
            .collect();

        let mut evicted = 0;
        for (name, cap) in caps {
            if let Some(cache) = self.caches.get_mut(&name) {
                evicted += cache.trim_to(cap);
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    fn response(body: &str) -> Response {
        Response::synthetic_text(StatusCode::OK, body)
    }

    fn test_config() -> SwConfig {
        SwConfig::default()
    }

    #[test]
    fn test_put_and_lookup() {
        let mut cache = NamedCache::new("test", None);
        cache.put("https://a/x", response("x"));

        assert!(cache.contains("https://a/x"));
        assert_eq!(cache.lookup("https://a/x").unwrap().text().unwrap(), "x");
        assert!(cache.lookup("https://a/y").is_none());
    }

    #[test]
    fn test_ttl_expiry_on_read() {
        let mut cache = NamedCache::new("api", Some(Duration::from_millis(10)));
        cache.put("https://a/x", response("x"));

        assert!(cache.lookup("https://a/x").is_some());
        std::thread::sleep(Duration::from_millis(25));

        // Expired entry reads as absent and is removed
        assert!(cache.lookup("https://a/x").is_none());
        assert!(!cache.contains("https://a/x"));
    }

    #[test]
    fn test_reinsert_refreshes_ttl() {
        let mut cache = NamedCache::new("api", Some(Duration::from_millis(40)));
        cache.put("https://a/x", response("v1"));
        std::thread::sleep(Duration::from_millis(25));
        cache.put("https://a/x", response("v2"));
        std::thread::sleep(Duration::from_millis(25));

        // 50ms after the first insert, but only 25ms after the refresh
        assert_eq!(cache.lookup("https://a/x").unwrap().text().unwrap(), "v2");
    }

    #[test]
    fn test_trim_evicts_oldest_first() {
        let mut cache = NamedCache::new("dynamic", None);
        for i in 0..5 {
            cache.put(&format!("https://a/{i}"), response("x"));
        }

        let evicted = cache.trim_to(3);
        assert_eq!(evicted, 2);
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("https://a/0"));
        assert!(!cache.contains("https://a/1"));
        assert!(cache.contains("https://a/4"));
    }

    #[test]
    fn test_trim_noop_under_cap() {
        let mut cache = NamedCache::new("dynamic", None);
        cache.put("https://a/0", response("x"));
        assert_eq!(cache.trim_to(3), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_one_cache_per_kind() {
        let config = test_config();
        let mut registry = CacheRegistry::new(&config);

        registry.put(CacheKind::Static, "https://a/x", response("x"));
        registry.put(CacheKind::Static, "https://a/y", response("y"));

        assert_eq!(registry.entry_count(CacheKind::Static), 2);
        assert_eq!(
            registry
                .cache_names()
                .iter()
                .filter(|n| n.contains("static"))
                .count(),
            1
        );
    }

    #[test]
    fn test_purge_stale_keeps_current_version() {
        let config = test_config();
        let mut registry = CacheRegistry::new(&config);

        registry.put(CacheKind::Static, "https://a/x", response("x"));
        registry
            .open_named("muscle-rotation-static-v0.9.0")
            .put("https://a/old", response("old"));

        let stale = registry.purge_stale();
        assert_eq!(stale, vec!["muscle-rotation-static-v0.9.0".to_string()]);
        assert_eq!(registry.entry_count(CacheKind::Static), 1);
    }

    #[test]
    fn test_enforce_caps() {
        let mut config = test_config();
        config.dynamic_cap = 3;
        config.api_cap = 2;
        let mut registry = CacheRegistry::new(&config);

        for i in 0..6 {
            registry.put(CacheKind::Dynamic, &format!("https://a/d{i}"), response("d"));
        }
        for i in 0..4 {
            registry.put(CacheKind::Api, &format!("https://a/api{i}"), response("a"));
        }
        registry.put(CacheKind::Static, "https://a/s", response("s"));

        let evicted = registry.enforce_caps();
        assert_eq!(evicted, 3 + 2);
        assert_eq!(registry.entry_count(CacheKind::Dynamic), 3);
        assert_eq!(registry.entry_count(CacheKind::Api), 2);
        // Static is unbounded
        assert_eq!(registry.entry_count(CacheKind::Static), 1);
    }

    #[test]
    fn test_clear_all() {
        let config = test_config();
        let mut registry = CacheRegistry::new(&config);
        registry.put(CacheKind::Static, "https://a/x", response("x"));
        registry.put(CacheKind::Api, "https://a/y", response("y"));

        assert_eq!(registry.clear_all(), 2);
        assert!(registry.cache_names().is_empty());
        assert_eq!(registry.entry_count(CacheKind::Static), 0);
    }
}
