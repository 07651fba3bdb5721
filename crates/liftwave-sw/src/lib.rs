//! # Liftwave Service Worker
//!
//! Offline cache coordinator for the Muscle Rotation Manager fitness PWA.
//!
//! ## Features
//!
//! - **Cache registry**: versioned named caches (static/dynamic/image/api)
//! - **Strategy selection**: ordered predicate rules mapping every request
//!   to exactly one handling strategy
//! - **Strategy executors**: cache-first, stale-while-revalidate,
//!   network-first API with TTL, navigation and image fallbacks
//! - **Lifecycle**: install (precache), activate (purge + evict + claim)
//! - **Control plane**: message protocol for the hosting page
//! - **Background sync / push**: offline mutation replay and notifications
//!
//! ## Architecture
//!
//! ```text
//! CacheCoordinator
//!     ├── Classifier ─── Strategy (one per request)
//!     ├── CacheRegistry
//!     │       ├── static  (muscle-rotation-static-v1.0.0)
//!     │       ├── dynamic (cap 50)
//!     │       ├── image   (cap 100)
//!     │       └── api     (cap 30, 5 min TTL)
//!     ├── ClientRegistry ─── postMessage / claim / focus
//!     └── Metrics ─── hit rate, response times
//! ```
//!
//! Fetch handling never returns an error: network and cache failures are
//! converted to synthetic responses so the request pipeline always receives
//! a well-formed `Response`.

use thiserror::Error;

pub mod classify;
pub mod clients;
pub mod config;
pub mod coordinator;
pub mod message;
pub mod metrics;
pub mod push;
pub mod registry;
pub mod strategy;
pub mod sync;

pub use classify::{Classifier, Strategy};
pub use clients::{Client, ClientRegistry};
pub use config::SwConfig;
pub use coordinator::{CacheCoordinator, WorkerState};
pub use message::{ControlReply, ControlRequest};
pub use metrics::{Metrics, StatsSnapshot};
pub use push::{build_notification, Notification, NotificationAction};
pub use registry::{CacheKind, CacheRegistry, NamedCache};
pub use sync::{MemoryQueue, OfflineQueue, SyncTag};

/// Errors that can occur in the cache coordinator.
#[derive(Error, Debug)]
pub enum SwError {
    #[error("Install failed: {0}")]
    InstallFailed(String),

    #[error("Invalid state: {0}")]
    StateError(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Sync failed: {0}")]
    SyncFailed(String),
}
