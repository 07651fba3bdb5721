//! The coordinator: lifecycle, fetch dispatch, control plane, sync, push.

use std::sync::Arc;

use bytes::Bytes;
use futures::future::join_all;
use http::HeaderValue;
use liftwave_common::retry_with_backoff;
use liftwave_net::{Fetch, NetError, Request, Response};
use serde_json::{json, Value as JsonValue};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::classify::{Classifier, Strategy};
use crate::clients::ClientRegistry;
use crate::config::SwConfig;
use crate::message::{ControlReply, ControlRequest};
use crate::metrics::Metrics;
use crate::push::{action_target, build_notification, Notification};
use crate::registry::{CacheKind, CacheRegistry};
use crate::sync::{OfflineQueue, SyncTag};
use crate::SwError;

/// Service worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Initial state.
    Parsed,
    /// Install in progress.
    Installing,
    /// Installed, waiting for activation.
    Installed,
    /// Activation in progress.
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Install failed or worker replaced.
    Redundant,
}

/// Offline cache coordinator.
///
/// Multiple fetch handlers may run interleaved; the registry is the only
/// shared mutable state and is guarded by a single `RwLock`. No ordering is
/// guaranteed across concurrent requests.
pub struct CacheCoordinator {
    pub(crate) config: Arc<SwConfig>,
    pub(crate) classifier: Classifier,
    pub(crate) registry: Arc<RwLock<CacheRegistry>>,
    pub(crate) clients: Arc<RwLock<ClientRegistry>>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) fetcher: Arc<dyn Fetch>,
    state: RwLock<WorkerState>,
}

impl CacheCoordinator {
    pub fn new(config: SwConfig, fetcher: Arc<dyn Fetch>) -> Result<Self, SwError> {
        let classifier = Classifier::new(&config)?;
        let registry = CacheRegistry::new(&config);

        Ok(Self {
            config: Arc::new(config),
            classifier,
            registry: Arc::new(RwLock::new(registry)),
            clients: Arc::new(RwLock::new(ClientRegistry::new())),
            metrics: Arc::new(Metrics::new()),
            fetcher,
            state: RwLock::new(WorkerState::Parsed),
        })
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    async fn set_state(&self, state: WorkerState) {
        *self.state.write().await = state;
        debug!(?state, "Worker state changed");
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn config(&self) -> &SwConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<RwLock<CacheRegistry>> {
        Arc::clone(&self.registry)
    }

    pub fn clients(&self) -> Arc<RwLock<ClientRegistry>> {
        Arc::clone(&self.clients)
    }

    // ==================== Lifecycle ====================

    /// Install: precache the shell. Critical files must all succeed;
    /// images and partials are best-effort.
    pub async fn install(&self) -> Result<(), SwError> {
        {
            let state = self.state.read().await;
            if *state != WorkerState::Parsed {
                return Err(SwError::StateError(format!(
                    "install from {state:?}"
                )));
            }
        }
        self.set_state(WorkerState::Installing).await;
        info!("Installing service worker");

        // Critical shell files: any failure aborts installation.
        let critical = join_all(
            self.config
                .static_files
                .iter()
                .map(|path| self.precache(CacheKind::Static, path)),
        )
        .await;

        for result in critical {
            if let Err(e) = result {
                warn!(error = %e, "Install aborted");
                self.set_state(WorkerState::Redundant).await;
                return Err(e);
            }
        }

        // Best-effort assets: log failures, keep going.
        let images = join_all(
            self.config
                .image_files
                .iter()
                .map(|path| self.precache(CacheKind::Image, path)),
        )
        .await;
        for (path, result) in self.config.image_files.iter().zip(images) {
            if let Err(e) = result {
                debug!(path, error = %e, "Image precache skipped");
            }
        }

        let partials = join_all(
            self.config
                .partial_files
                .iter()
                .map(|path| self.precache(CacheKind::Static, path)),
        )
        .await;
        for (path, result) in self.config.partial_files.iter().zip(partials) {
            if let Err(e) = result {
                debug!(path, error = %e, "Partial precache skipped");
            }
        }

        self.set_state(WorkerState::Installed).await;
        info!("Service worker installed");
        Ok(())
    }

    async fn precache(&self, kind: CacheKind, path: &str) -> Result<(), SwError> {
        let url = self.config.resolve(path)?;
        let response = self
            .fetcher
            .fetch(Request::get(url.clone()))
            .await
            .map_err(|e| SwError::InstallFailed(format!("{path}: {e}")))?;

        if !response.ok() {
            return Err(SwError::InstallFailed(format!(
                "{path}: status {}",
                response.status
            )));
        }

        self.registry.write().await.put(kind, url.as_str(), response);
        Ok(())
    }

    /// Activate: purge stale-version caches, enforce size caps, reset
    /// metrics, and claim all open clients.
    pub async fn activate(&self) -> Result<(), SwError> {
        {
            let state = self.state.read().await;
            if *state != WorkerState::Installed {
                return Err(SwError::StateError(format!(
                    "activate from {state:?}"
                )));
            }
        }
        self.set_state(WorkerState::Activating).await;

        let (stale, evicted) = {
            let mut registry = self.registry.write().await;
            (registry.purge_stale(), registry.enforce_caps())
        };

        self.metrics.reset();
        let claimed = self.clients.write().await.claim();

        self.set_state(WorkerState::Activated).await;
        info!(
            stale_caches = stale.len(),
            evicted, claimed, "Service worker activated"
        );
        Ok(())
    }

    /// Force immediate activation of an installed worker.
    pub async fn skip_waiting(&self) -> Result<(), SwError> {
        if self.state().await == WorkerState::Installed {
            self.activate().await
        } else {
            debug!("skip_waiting with no waiting worker");
            Ok(())
        }
    }

    // ==================== Fetch dispatch ====================

    /// Handle a fetch event. Always resolves to a well-formed response.
    pub async fn handle_fetch(&self, request: Request) -> Response {
        let strategy = self.classifier.classify(&request);
        debug!(url = %request.url, ?strategy, "Handling fetch");

        if strategy != Strategy::Bypass {
            self.metrics.record_request();
        }

        match strategy {
            Strategy::Bypass => self.pass_through(request).await,
            Strategy::Static => self.cache_first(request).await,
            Strategy::Image => self.image_first(request).await,
            Strategy::Api => self.api_network_first(request).await,
            Strategy::Navigation => self.navigate(request).await,
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
        }
    }

    // ==================== Control plane ====================

    /// Handle a control-plane message. `SKIP_WAITING` has no reply.
    pub async fn handle_message(&self, request: ControlRequest) -> Option<ControlReply> {
        match request {
            ControlRequest::SkipWaiting => {
                if let Err(e) = self.skip_waiting().await {
                    warn!(error = %e, "skip_waiting failed");
                }
                None
            }
            ControlRequest::GetVersion => Some(ControlReply::Version {
                version: self.config.version_string(),
            }),
            ControlRequest::ClearCache => {
                let removed = self.registry.write().await.clear_all();
                info!(removed, "Cleared all caches");
                Some(ControlReply::Cleared { success: true })
            }
            ControlRequest::GetPerformanceStats => Some(ControlReply::Stats {
                stats: self.metrics.snapshot(&self.config.version_string()),
            }),
            ControlRequest::OptimizeCaches => {
                let evicted = self.registry.write().await.enforce_caps();
                Some(ControlReply::Optimized {
                    success: true,
                    message: Some(format!("Evicted {evicted} entries")),
                    error: None,
                })
            }
        }
    }

    // ==================== Background sync ====================

    /// Replay offline-queued mutations for a sync tag. On success the queue
    /// is cleared and clients are notified; on failure the queue is left
    /// intact for the platform's next sync.
    pub async fn handle_sync(&self, tag: &str, queue: &dyn OfflineQueue) -> Result<(), SwError> {
        let Some(tag) = SyncTag::parse(tag) else {
            warn!(tag, "Ignoring unknown sync tag");
            return Ok(());
        };
        info!(tag = tag.as_str(), "Background sync triggered");

        match tag {
            SyncTag::Workouts => {
                let pending = queue.pending_workouts().await;
                if pending.is_empty() {
                    debug!("No offline workouts to sync");
                    return Ok(());
                }
                let body = json!({ "workouts": pending });
                self.replay(&self.config.workout_sync_path, &body).await?;
                queue.clear_workouts().await;
            }
            SyncTag::Settings => {
                let Some(settings) = queue.pending_settings().await else {
                    debug!("No offline settings to sync");
                    return Ok(());
                };
                self.replay(&self.config.settings_sync_path, &settings).await?;
                queue.clear_settings().await;
            }
        }

        let message = json!({ "type": "SYNC_COMPLETE", "data": tag.completion_label() });
        let notified = self.clients.read().await.broadcast(&message);
        info!(tag = tag.as_str(), notified, "Sync complete");
        Ok(())
    }

    async fn replay(&self, path: &str, body: &JsonValue) -> Result<(), SwError> {
        let url = self.config.resolve(path)?;
        let policy = self.config.sync_retry.clone();

        retry_with_backoff(&policy, || {
            let request = Request::post(url.clone(), Bytes::from(body.to_string())).header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            async move {
                let response = self.fetcher.fetch(request).await?;
                if response.ok() {
                    Ok(())
                } else {
                    Err(NetError::RequestFailed(format!(
                        "sync endpoint returned {}",
                        response.status
                    )))
                }
            }
        })
        .await
        .map_err(|e| SwError::SyncFailed(e.to_string()))
    }

    // ==================== Push ====================

    /// Build the notification for a push event.
    pub fn handle_push(&self, payload: Option<String>) -> Notification {
        info!("Push notification received");
        build_notification(payload.as_deref())
    }

    /// Route a notification click: focus an existing client at the target
    /// URL or open a new window. Returns the client id.
    pub async fn handle_notification_click(
        &self,
        action: Option<&str>,
    ) -> Result<String, SwError> {
        let target = self.config.resolve(action_target(action))?;
        debug!(?action, target = %target, "Notification clicked");

        let mut clients = self.clients.write().await;
        if let Some(id) = clients.focus_matching(target.as_str()) {
            return Ok(id);
        }
        let (id, _receiver) = clients.open_window(target);
        Ok(id)
    }
}
