//! Shared store adapter.
//!
//! Peers that cannot reach each other directly still share the origin
//! directory, so a publish becomes a write of the envelope under the
//! well-known key and peers observe it through filesystem change events.
//! The filesystem fires events for a process's own writes too, and usually
//! more than once per write; the trigger nonce in the envelope identifies a
//! single logical write, letting receivers skip their own and collapse
//! duplicates while still delivering repeated structurally-equal payloads.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notify::{RecursiveMode, Watcher};

use txcast_proto::{ChangedParts, StoreEnvelope, STORE_KEY};

use crate::config::PropagatorConfig;
use crate::error::Error;

use super::{ListenerHandle, ReceiveHandler, Transport, TransportKind};

/// Adapter for the shared store file.
pub struct StoreTransport {
    dir: PathBuf,
    path: PathBuf,
    /// Trigger nonce of this process's most recent write; the listener skips
    /// change events carrying it.
    last_written: Arc<AtomicU64>,
}

impl StoreTransport {
    /// Open the store leg under the origin directory.
    pub fn open(config: &PropagatorConfig) -> Result<Self, Error> {
        if !config.origin.is_dir() {
            return Err(Error::Store(format!(
                "origin directory does not exist: {}",
                config.origin.display()
            )));
        }

        fs::create_dir_all(config.origin_subdir())?;
        // Watch events report paths rooted at the watched directory; resolve
        // it once so path comparison stays consistent.
        let dir = fs::canonicalize(config.origin_subdir())?;
        let path = dir.join(STORE_KEY);

        Ok(Self {
            dir,
            path,
            last_written: Arc::new(AtomicU64::new(0)),
        })
    }

    fn write_envelope(&self, envelope: &StoreEnvelope) -> Result<(), Error> {
        let text = envelope.encode()?;

        // Record the nonce before the write; the watcher callback may run
        // before this call returns.
        self.last_written.store(envelope.trig, Ordering::SeqCst);

        // Rename into place so a peer can never observe a torn write.
        let tmp = self.dir.join(format!("{STORE_KEY}.tmp"));
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Transport for StoreTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Store
    }

    fn send(&self, parts: &ChangedParts) -> Result<(), Error> {
        let envelope = StoreEnvelope::new(fresh_trig(), parts.clone());
        self.write_envelope(&envelope)
    }

    fn listen(&self, handler: ReceiveHandler) -> Result<ListenerHandle, Error> {
        let path = self.path.clone();
        let last_written = self.last_written.clone();
        let last_delivered = Arc::new(AtomicU64::new(0));

        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let Ok(event) = res else { return };
                if !event_touches_key(&event, OsStr::new(STORE_KEY)) {
                    return;
                }

                // Malformed or missing content is silently ignored.
                let Some(envelope) = read_envelope(&path) else {
                    return;
                };
                if envelope.trig == last_written.load(Ordering::SeqCst) {
                    return; // our own write
                }
                if last_delivered.swap(envelope.trig, Ordering::SeqCst) == envelope.trig {
                    return; // another event for a write already delivered
                }

                handler(envelope.changed_parts);
            })
            .map_err(|e| Error::Store(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::Store(format!("failed to watch {}: {e}", self.dir.display())))?;

        Ok(ListenerHandle::watcher(Box::new(watcher)))
    }
}

/// A fresh nonzero trigger nonce; zero is the listener's "nothing written
/// yet" sentinel.
fn fresh_trig() -> u64 {
    loop {
        let trig: u64 = rand::random();
        if trig != 0 {
            return trig;
        }
    }
}

/// Whether a watch event is a content change of the well-known key.
fn event_touches_key(event: &notify::Event, key: &OsStr) -> bool {
    use notify::EventKind;

    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event.paths.iter().any(|p| p.file_name() == Some(key))
}

fn read_envelope(path: &Path) -> Option<StoreEnvelope> {
    let text = fs::read_to_string(path).ok()?;
    StoreEnvelope::decode(&text).ok()
}
