//! Propagator configuration.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use txcast_proto::{HUB_SOCKET_NAME, STORE_KEY};

/// Name of the directory holding propagation artifacts inside an origin.
pub const ORIGIN_SUBDIR: &str = ".txcast";

/// The kind of execution context this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// An application process attached to the origin (a window/tab analog).
    Foreground,
    /// The background hub process relaying between foreground peers.
    Hub,
}

/// Propagator configuration.
///
/// The origin directory is the identity of the peer group: every process
/// attached to the same origin hears about each other's commits. The per-leg
/// switches do not add capabilities, they only forbid legs that detection
/// would otherwise enable (e.g. forcing the fallback chain in a deployment
/// where multicast is known to misbehave).
#[derive(Debug, Clone)]
pub struct PropagatorConfig {
    /// Origin directory shared by the peer group.
    pub origin: PathBuf,

    /// Role of this process.
    pub role: Role,

    /// Whether the datagram channel may be used.
    pub direct_channel: bool,

    /// Whether the shared store file may be used.
    pub shared_store: bool,

    /// Whether hub messaging may be used.
    pub hub_messaging: bool,

    /// Datagram channel port override. None derives the port from the
    /// canonical origin path.
    pub channel_port: Option<u16>,
}

impl PropagatorConfig {
    /// Create a foreground configuration for the given origin directory.
    pub fn new(origin: impl Into<PathBuf>) -> Self {
        Self {
            origin: origin.into(),
            role: Role::Foreground,
            direct_channel: true,
            shared_store: true,
            hub_messaging: true,
            channel_port: None,
        }
    }

    /// Create a hub configuration for the given origin directory.
    pub fn hub(origin: impl Into<PathBuf>) -> Self {
        Self {
            role: Role::Hub,
            ..Self::new(origin)
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Forbid the datagram channel, forcing the fallback chain.
    pub fn without_direct_channel(mut self) -> Self {
        self.direct_channel = false;
        self
    }

    /// Forbid the shared store leg.
    pub fn without_shared_store(mut self) -> Self {
        self.shared_store = false;
        self
    }

    /// Forbid the hub messaging leg.
    pub fn without_hub_messaging(mut self) -> Self {
        self.hub_messaging = false;
        self
    }

    /// Override the datagram channel port.
    pub fn with_channel_port(mut self, port: u16) -> Self {
        self.channel_port = Some(port);
        self
    }

    /// The canonical origin path, shared by every peer regardless of how
    /// each one spelled the directory. Falls back to the configured path
    /// when the directory cannot be resolved.
    pub fn canonical_origin(&self) -> PathBuf {
        std::fs::canonicalize(&self.origin).unwrap_or_else(|_| self.origin.clone())
    }

    /// Directory holding the store file and the hub socket.
    pub fn origin_subdir(&self) -> PathBuf {
        self.origin.join(ORIGIN_SUBDIR)
    }

    /// Path of the shared store file (the well-known key).
    pub fn store_path(&self) -> PathBuf {
        self.origin_subdir().join(STORE_KEY)
    }

    /// nng address of the hub socket.
    pub fn hub_socket_addr(&self) -> String {
        format!(
            "ipc://{}",
            self.origin_subdir().join(HUB_SOCKET_NAME).display()
        )
    }

    /// Multicast group the datagram channel joins.
    pub fn channel_group(&self) -> Ipv4Addr {
        txcast_proto::CHANNEL_GROUP
    }

    /// Resolved datagram channel port.
    pub fn resolved_channel_port(&self) -> u16 {
        match self.channel_port {
            Some(port) => port,
            None => txcast_proto::channel_port(&self.canonical_origin()),
        }
    }

    /// Whether any leg is permitted at all.
    pub fn any_leg_permitted(&self) -> bool {
        self.direct_channel || self.shared_store || self.hub_messaging
    }
}
