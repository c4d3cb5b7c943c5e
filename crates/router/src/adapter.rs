//! Platform adapter contract.
//!
//! An adapter surfaces a fixed vocabulary of event names and hands out a
//! receiver per name. The transport behind it (websocket, IRC, a test
//! harness) is not the router's concern.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::trace;

use streamcue_core::Platform;

/// Event names surfaced by the TikTok live connector.
pub const TIKTOK_EVENTS: &[&str] = &["chat", "gift", "like", "follow", "share", "member", "subscribe"];

/// Event names surfaced by the Twitch chat client.
pub const TWITCH_EVENTS: &[&str] = &["message", "chat", "cheer", "follow", "subscription", "raid"];

const DEFAULT_CAPACITY: usize = 256;

pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Every event name this adapter can surface.
    fn event_names(&self) -> Vec<String>;

    /// Receive raw payloads emitted under `event_name`. The stream ends
    /// when the adapter closes.
    fn subscribe(&self, event_name: &str) -> mpsc::Receiver<Value>;
}

/// In-process adapter with one bounded queue per subscriber.
///
/// [`ChannelAdapter::emit`] waits for room in every subscriber's queue, so
/// a slow listener slows the producer down instead of losing events.
pub struct ChannelAdapter {
    platform: Platform,
    names: Vec<String>,
    capacity: usize,
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<Value>>>>,
}

impl ChannelAdapter {
    pub fn new(platform: Platform, names: &[&str]) -> Self {
        Self::with_capacity(platform, names, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(platform: Platform, names: &[&str], capacity: usize) -> Self {
        Self {
            platform,
            names: names.iter().map(|n| n.to_string()).collect(),
            capacity: capacity.max(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Adapter with the platform's standard vocabulary.
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::TikTok => Self::new(platform, TIKTOK_EVENTS),
            Platform::Twitch => Self::new(platform, TWITCH_EVENTS),
        }
    }

    /// Publish a raw payload to every subscriber of `event_name`, waiting
    /// while a subscriber's queue is full. Returns how many received it.
    pub async fn emit(&self, event_name: &str, payload: Value) -> usize {
        let senders: Vec<mpsc::Sender<Value>> = self
            .subscribers
            .lock()
            .expect("adapter subscriber lock poisoned")
            .get(event_name)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for tx in &senders {
            if tx.send(payload.clone()).await.is_ok() {
                delivered += 1;
            }
        }
        if delivered < senders.len() {
            self.prune_closed(event_name);
        }
        trace!(platform = %self.platform, event_name, delivered, "adapter emit");
        delivered
    }

    fn prune_closed(&self, event_name: &str) {
        let mut guard = self.subscribers.lock().expect("adapter subscriber lock poisoned");
        if let Some(senders) = guard.get_mut(event_name) {
            senders.retain(|tx| !tx.is_closed());
        }
    }

    /// Drop every sender. Subscribers drain what is queued, then see the
    /// stream end.
    pub fn close(&self) {
        self.subscribers
            .lock()
            .expect("adapter subscriber lock poisoned")
            .clear();
    }
}

impl PlatformAdapter for ChannelAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn event_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn subscribe(&self, event_name: &str) -> mpsc::Receiver<Value> {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers
            .lock()
            .expect("adapter subscriber lock poisoned")
            .entry(event_name.to_string())
            .or_default()
            .push(tx);
        rx
    }
}
