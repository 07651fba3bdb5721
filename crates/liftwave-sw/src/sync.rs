//! Background sync tags and the offline mutation queue seam.
//!
//! The queue itself is a collaborator persistent store; the coordinator
//! only reads, replays, and clears it. `MemoryQueue` backs tests and the
//! smoke harness.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

/// Platform-invoked sync tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTag {
    Workouts,
    Settings,
}

impl SyncTag {
    /// Parse a platform tag string. Unknown tags are not an error; the
    /// caller ignores them.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "workout-sync" => Some(Self::Workouts),
            "settings-sync" => Some(Self::Settings),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workouts => "workout-sync",
            Self::Settings => "settings-sync",
        }
    }

    /// Label broadcast to clients in the SYNC_COMPLETE message.
    pub fn completion_label(&self) -> &'static str {
        match self {
            Self::Workouts => "workouts",
            Self::Settings => "settings",
        }
    }
}

/// Offline-recorded mutations waiting for connectivity.
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    async fn pending_workouts(&self) -> Vec<JsonValue>;
    async fn clear_workouts(&self);
    async fn pending_settings(&self) -> Option<JsonValue>;
    async fn clear_settings(&self);
}

/// In-memory queue for tests and the smoke harness.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    workouts: Mutex<Vec<JsonValue>>,
    settings: Mutex<Option<JsonValue>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a workout mutation while offline.
    pub async fn queue_workout(&self, workout: JsonValue) {
        self.workouts.lock().await.push(workout);
    }

    /// Stage a settings change while offline.
    pub async fn stage_settings(&self, settings: JsonValue) {
        *self.settings.lock().await = Some(settings);
    }

    pub async fn workout_count(&self) -> usize {
        self.workouts.lock().await.len()
    }
}

#[async_trait]
impl OfflineQueue for MemoryQueue {
    async fn pending_workouts(&self) -> Vec<JsonValue> {
        self.workouts.lock().await.clone()
    }

    async fn clear_workouts(&self) {
        self.workouts.lock().await.clear();
    }

    async fn pending_settings(&self) -> Option<JsonValue> {
        self.settings.lock().await.clone()
    }

    async fn clear_settings(&self) {
        *self.settings.lock().await = None;
    }
}
