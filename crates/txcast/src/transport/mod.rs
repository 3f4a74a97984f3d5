//! Transport adapters.
//!
//! One adapter per physical channel peers can meet on:
//!
//! - [`ChannelTransport`] - loopback multicast datagrams, the direct
//!   bidirectional channel
//! - [`StoreTransport`] - a JSON envelope under the well-known key in the
//!   origin's shared store, observed through filesystem change events
//! - [`HubTransport`] - a bus socket in a star around the hub process
//!
//! Every adapter exposes the same two operations: a fire-and-forget `send`
//! and a `listen` that spawns the receive side and hands decoded payloads to
//! a callback. Adapters are independent; a failure in one never affects the
//! others.

mod channel;
mod hub;
mod store;

pub use channel::ChannelTransport;
pub use hub::HubTransport;
pub use store::StoreTransport;

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use txcast_proto::ChangedParts;

use crate::error::Error;

/// Callback invoked with each payload received from a peer.
pub type ReceiveHandler = Arc<dyn Fn(ChangedParts) + Send + Sync>;

/// Which physical channel an adapter drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Loopback multicast datagrams.
    Channel,
    /// Shared store file plus filesystem change events.
    Store,
    /// Hub bus socket.
    Hub,
}

/// A single propagation channel to peer processes.
pub trait Transport: Send + Sync {
    /// Which physical channel this adapter drives.
    fn kind(&self) -> TransportKind;

    /// Send one notification to whoever is listening. Fire-and-forget: the
    /// caller is expected to log and discard any error.
    fn send(&self, parts: &ChangedParts) -> Result<(), Error>;

    /// Start receiving peer notifications, delivering each to `handler`.
    ///
    /// The handler runs on the adapter's listener thread. The returned handle
    /// stops the listener when dropped.
    fn listen(&self, handler: ReceiveHandler) -> Result<ListenerHandle, Error>;
}

/// Handle to a running listener; stops and joins it on drop.
pub struct ListenerHandle {
    stop: Option<Arc<AtomicBool>>,
    thread: Option<thread::JoinHandle<()>>,
    keep_alive: Option<Box<dyn Any + Send>>,
}

impl ListenerHandle {
    /// Handle for a worker-thread listener driven by a stop flag.
    pub(crate) fn worker(stop: Arc<AtomicBool>, thread: thread::JoinHandle<()>) -> Self {
        Self {
            stop: Some(stop),
            thread: Some(thread),
            keep_alive: None,
        }
    }

    /// Handle for a callback-driven listener that stops when its driver is
    /// dropped (the filesystem watcher).
    pub(crate) fn watcher(keep_alive: Box<dyn Any + Send>) -> Self {
        Self {
            stop: None,
            thread: None,
            keep_alive: Some(keep_alive),
        }
    }

    /// Stop the listener and wait for it to wind down.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::SeqCst);
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        self.keep_alive = None;
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("running", &(self.stop.is_some() || self.keep_alive.is_some()))
            .finish()
    }
}
