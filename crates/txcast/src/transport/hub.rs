//! Hub socket adapter.
//!
//! A bus socket in a star topology around the hub process: the hub listens
//! at the well-known address under the origin, foreground peers dial it.
//! Bus delivery goes to directly connected peers only, so a foreground send
//! reaches the hub and a hub send reaches every connected foreground peer;
//! the hub does not relay between foreground peers.
//!
//! The dial is asynchronous and keeps retrying until a hub appears; until
//! then sends are dropped by the bus protocol, which is exactly the
//! best-effort "leg not yet active" behavior wanted here.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nng::options::{Options, RecvTimeout, SendTimeout};
use nng::{Dialer, Message, Protocol, Socket};

use txcast_proto::{ChangedParts, HubEnvelope};

use crate::config::{PropagatorConfig, Role};
use crate::error::Error;

use super::{ListenerHandle, ReceiveHandler, Transport, TransportKind};

/// How often the listener wakes to check its stop flag.
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Upper bound on a send; bus sends drop rather than block, this is a
/// backstop against a wedged socket.
const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// Adapter for the hub bus socket.
pub struct HubTransport {
    socket: Socket,
    /// Keeps the asynchronous dialer alive for the adapter's lifetime.
    _dialer: Option<Dialer>,
}

impl HubTransport {
    /// Open the hub leg: listen when this process is the hub, dial the hub
    /// otherwise.
    pub fn open(config: &PropagatorConfig) -> Result<Self, Error> {
        let addr = config.hub_socket_addr();

        let socket = Socket::new(Protocol::Bus0)
            .map_err(|e| Error::Hub(format!("failed to create bus socket: {e}")))?;
        socket
            .set_opt::<RecvTimeout>(Some(RECV_POLL_INTERVAL))
            .map_err(|e| Error::Hub(format!("failed to set receive timeout: {e}")))?;
        socket
            .set_opt::<SendTimeout>(Some(SEND_TIMEOUT))
            .map_err(|e| Error::Hub(format!("failed to set send timeout: {e}")))?;

        let dialer = match config.role {
            Role::Hub => {
                // A crashed hub can leave its socket file behind.
                if let Some(path) = addr.strip_prefix("ipc://") {
                    let _ = fs::remove_file(path);
                }
                socket
                    .listen(&addr)
                    .map_err(|e| Error::Hub(format!("failed to listen on {addr}: {e}")))?;
                tracing::debug!(%addr, "hub socket listening");
                None
            }
            Role::Foreground => {
                let dialer = Dialer::new(&socket, &addr, true)
                    .map_err(|e| Error::Hub(format!("failed to dial {addr}: {e}")))?;
                tracing::debug!(%addr, "dialing hub socket");
                Some(dialer)
            }
        };

        Ok(Self {
            socket,
            _dialer: dialer,
        })
    }
}

impl Transport for HubTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Hub
    }

    fn send(&self, parts: &ChangedParts) -> Result<(), Error> {
        let bytes = HubEnvelope::new(parts.clone()).encode()?;
        self.socket
            .send(Message::from(&bytes[..]))
            .map_err(|(_, e)| Error::Hub(format!("send failed: {e}")))?;
        Ok(())
    }

    fn listen(&self, handler: ReceiveHandler) -> Result<ListenerHandle, Error> {
        let socket = self.socket.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let thread = thread::Builder::new()
            .name("txcast-hub".to_string())
            .spawn(move || loop {
                if stop_flag.load(Ordering::SeqCst) {
                    return;
                }

                match socket.recv() {
                    Ok(msg) => match HubEnvelope::decode(msg.as_slice()) {
                        Ok(envelope) => handler(envelope.changed_parts),
                        Err(err) => {
                            tracing::trace!(error = %err, "ignoring unrecognized hub message");
                        }
                    },
                    Err(nng::Error::TimedOut) => continue,
                    Err(nng::Error::Closed) => return,
                    Err(err) => {
                        tracing::trace!(error = %err, "hub receive error");
                    }
                }
            })
            .map_err(|e| Error::Hub(format!("failed to spawn listener: {e}")))?;

        Ok(ListenerHandle::worker(stop, thread))
    }
}
