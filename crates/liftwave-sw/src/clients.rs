//! Controlled clients (open pages).
//!
//! Each connected client gets an unbounded channel standing in for
//! `postMessage`; the coordinator broadcasts sync-completion events and
//! focuses or opens windows on notification clicks.

use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::debug;
use url::Url;

/// A controlled page.
#[derive(Debug)]
pub struct Client {
    pub id: String,
    pub url: Url,
    pub focused: bool,
    pub controlled: bool,
    sender: mpsc::UnboundedSender<JsonValue>,
}

impl Client {
    /// Deliver a message to the page. Returns false if the page is gone.
    pub fn post_message(&self, message: JsonValue) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// Registry of connected clients.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: HashMap<String, Client>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page and hand back its message receiver.
    pub fn connect(&mut self, url: Url) -> (String, mpsc::UnboundedReceiver<JsonValue>) {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed));

        let (sender, receiver) = mpsc::unbounded_channel();
        self.clients.insert(
            id.clone(),
            Client {
                id: id.clone(),
                url,
                focused: false,
                controlled: false,
                sender,
            },
        );
        (id, receiver)
    }

    /// Open a new window at a URL; the new client starts focused.
    pub fn open_window(&mut self, url: Url) -> (String, mpsc::UnboundedReceiver<JsonValue>) {
        let (id, receiver) = self.connect(url);
        if let Some(client) = self.clients.get_mut(&id) {
            client.focused = true;
        }
        debug!(client = %id, "Opened window");
        (id, receiver)
    }

    pub fn disconnect(&mut self, id: &str) -> bool {
        self.clients.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Deliver a message to every client. Returns the number delivered.
    pub fn broadcast(&self, message: &JsonValue) -> usize {
        self.clients
            .values()
            .filter(|client| client.post_message(message.clone()))
            .count()
    }

    /// Take control of all clients. Returns the number claimed.
    pub fn claim(&mut self) -> usize {
        for client in self.clients.values_mut() {
            client.controlled = true;
        }
        self.clients.len()
    }

    /// Focus the first client whose URL matches exactly. Returns its id.
    pub fn focus_matching(&mut self, url: &str) -> Option<String> {
        let id = self
            .clients
            .values()
            .find(|client| client.url.as_str() == url)
            .map(|client| client.id.clone())?;

        for client in self.clients.values_mut() {
            client.focused = client.id == id;
        }
        debug!(client = %id, url, "Focused existing client");
        Some(id)
    }
}
