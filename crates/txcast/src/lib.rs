//! txcast - cross-process commit-notification propagation.
//!
//! Processes sharing an origin directory (tabs of one application, worker
//! daemons, CLI tools against the same embedded database) are told when a
//! peer commits a data-changing transaction, so each can re-evaluate live
//! queries that depend on the changed data. The payload is opaque to this
//! crate; it only has to arrive value-equal.
//!
//! Delivery is best-effort by design: no ordering across transports, no
//! acknowledgement, no retry. A lost notification means a peer's queries go
//! stale until its own next write, never a corrupted state.
//!
//! # Quick Start
//!
//! ```ignore
//! use serde_json::json;
//! use txcast::{ChangedParts, Propagator, PropagatorConfig, TXCOMMITTED_EVENT};
//!
//! fn main() -> Result<(), txcast::Error> {
//!     let propagator = Propagator::start(PropagatorConfig::new("/var/lib/app/data"))?;
//!
//!     // React to commits from any peer process (and local ones).
//!     propagator.bus().subscribe(
//!         TXCOMMITTED_EVENT,
//!         std::sync::Arc::new(|parts| {
//!             println!("data changed: {parts}");
//!         }),
//!     );
//!
//!     // Tell peers about a local commit.
//!     propagator.publish(&ChangedParts::new(json!({"table": "todos", "range": [1, 5]})));
//!     Ok(())
//! }
//! ```

pub mod capabilities;
pub mod config;
pub mod echo;
pub mod error;
pub mod events;
pub mod propagator;
pub mod strategy;
pub mod transport;

pub use capabilities::Capabilities;
pub use config::{PropagatorConfig, Role};
pub use echo::{propagating_locally, EchoGuard};
pub use error::Error;
pub use events::{
    ChangedParts, CommitBus, EventHandler, HandlerId, SharedCommitBus, TXCOMMITTED_EVENT,
};
pub use propagator::Propagator;
pub use strategy::{Strategy, StrategyKind};
pub use transport::{Transport, TransportKind};

/// Re-export wire types and well-known constants.
pub use txcast_proto as proto;
