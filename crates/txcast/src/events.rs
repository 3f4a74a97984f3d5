//! Local commit event bus.
//!
//! Commit notifications travel inside one process over this bus: the storage
//! layer publishes under [`TXCOMMITTED_EVENT`] after a transaction commits,
//! the live-query side subscribes to re-evaluate affected queries, and the
//! propagator is one more subscriber that forwards to peer processes.
//!
//! Dispatch is synchronous on the publishing thread. That is load-bearing:
//! remote re-injection brackets its publish with the echo flag, which only
//! holds if every handler runs within the bracket. Handlers may therefore be
//! invoked from transport listener threads and must be `Send + Sync`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

pub use txcast_proto::ChangedParts;

/// Event name published on every local transaction commit.
pub const TXCOMMITTED_EVENT: &str = "txcommitted";

/// Handler invoked with the notification payload.
pub type EventHandler = Arc<dyn Fn(&ChangedParts) + Send + Sync>;

/// Identifier of a registered handler, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// In-process event bus for commit notifications.
pub struct CommitBus {
    /// Registered handlers keyed by event name.
    handlers: RwLock<HashMap<String, Vec<(HandlerId, EventHandler)>>>,
    /// Next handler ID.
    next_handler_id: AtomicU64,
}

impl CommitBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_handler_id: AtomicU64::new(1),
        }
    }

    /// Register a handler for an event name.
    ///
    /// Returns the ID to pass to [`CommitBus::unsubscribe`].
    pub fn subscribe(&self, event: &str, handler: EventHandler) -> HandlerId {
        let id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::SeqCst));

        let mut handlers = self.handlers.write();
        handlers
            .entry(event.to_string())
            .or_default()
            .push((id, handler));

        tracing::trace!(event, handler_id = id.0, "handler subscribed");
        id
    }

    /// Remove a previously registered handler.
    ///
    /// Returns false when the handler was not registered (already removed).
    pub fn unsubscribe(&self, event: &str, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(entries) = handlers.get_mut(event) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            handlers.remove(event);
        }

        removed
    }

    /// Publish a payload to every handler of an event, synchronously, on the
    /// calling thread.
    pub fn publish(&self, event: &str, parts: &ChangedParts) {
        // Snapshot outside the lock so a handler can subscribe/unsubscribe
        // without deadlocking the dispatch.
        let snapshot: Vec<EventHandler> = {
            let handlers = self.handlers.read();
            match handlers.get(event) {
                Some(entries) => entries.iter().map(|(_, h)| h.clone()).collect(),
                None => return,
            }
        };

        for handler in snapshot {
            handler(parts);
        }
    }

    /// Number of handlers registered for an event.
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .read()
            .get(event)
            .map_or(0, |entries| entries.len())
    }
}

impl Default for CommitBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared bus handle.
pub type SharedCommitBus = Arc<CommitBus>;
