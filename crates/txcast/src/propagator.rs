//! Commit propagation wiring and lifecycle.
//!
//! The propagator connects the local bus to the peer-facing adapters in both
//! directions. Outbound: every local `"txcommitted"` publish is forwarded to
//! each live adapter unless the dispatch is itself a remote re-injection.
//! Inbound: each adapter's listener re-publishes received payloads on the
//! local bus under the echo guard, so the live-query side sees remote
//! commits exactly like local ones.
//!
//! Propagation is advisory. Nothing here is allowed to fail the committing
//! caller: send errors are logged at debug and dropped.

use std::sync::Arc;

use crate::capabilities::Capabilities;
use crate::config::PropagatorConfig;
use crate::echo::{propagating_locally, EchoGuard};
use crate::error::Error;
use crate::events::{ChangedParts, CommitBus, HandlerId, SharedCommitBus, TXCOMMITTED_EVENT};
use crate::strategy::{Strategy, StrategyKind};
use crate::transport::{ListenerHandle, ReceiveHandler};

/// Cross-process commit propagation for one execution context.
///
/// Owns the chosen strategy's adapters, the outbound bus subscription, and
/// the inbound listeners. Dropping the propagator detaches all of them; the
/// bus itself keeps working locally.
pub struct Propagator {
    bus: SharedCommitBus,
    capabilities: Capabilities,
    strategy: Strategy,
    outbound: Option<HandlerId>,
    listeners: Vec<ListenerHandle>,
}

impl Propagator {
    /// Start propagation on a fresh bus.
    pub fn start(config: PropagatorConfig) -> Result<Self, Error> {
        Self::attach(Arc::new(CommitBus::new()), config)
    }

    /// Start propagation on an existing application bus.
    pub fn attach(bus: SharedCommitBus, config: PropagatorConfig) -> Result<Self, Error> {
        let capabilities = Capabilities::detect(&config);
        let strategy = Strategy::select(&capabilities, &config);

        let outbound = if strategy.is_active() {
            let transports = strategy.transports().to_vec();
            Some(bus.subscribe(
                TXCOMMITTED_EVENT,
                Arc::new(move |parts: &ChangedParts| {
                    if propagating_locally() {
                        return;
                    }
                    for transport in &transports {
                        if let Err(err) = transport.send(parts) {
                            tracing::debug!(
                                transport = ?transport.kind(),
                                error = %err,
                                "propagation send failed"
                            );
                        }
                    }
                }),
            ))
        } else {
            None
        };

        let mut listeners = Vec::with_capacity(strategy.transports().len());
        for transport in strategy.transports() {
            let bus = bus.clone();
            let handler: ReceiveHandler = Arc::new(move |parts| deliver_remote(&bus, parts));
            match transport.listen(handler) {
                Ok(listener) => listeners.push(listener),
                Err(err) => {
                    tracing::debug!(
                        transport = ?transport.kind(),
                        error = %err,
                        "listener unavailable"
                    );
                }
            }
        }

        tracing::debug!(strategy = ?strategy.kind(), listeners = listeners.len(), "propagation started");

        Ok(Self {
            bus,
            capabilities,
            strategy,
            outbound,
            listeners,
        })
    }

    /// The bus this propagator is attached to.
    pub fn bus(&self) -> &SharedCommitBus {
        &self.bus
    }

    /// The capability set detected at startup.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The strategy chosen at startup.
    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Publish a locally-committed notification on the bus.
    ///
    /// Convenience for the committing side; identical to publishing
    /// [`TXCOMMITTED_EVENT`] on [`Propagator::bus`] directly.
    pub fn publish(&self, parts: &ChangedParts) {
        self.bus.publish(TXCOMMITTED_EVENT, parts);
    }

    /// Detach from the bus and stop all listeners.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(id) = self.outbound.take() {
            self.bus.unsubscribe(TXCOMMITTED_EVENT, id);
        }
        for listener in &mut self.listeners {
            listener.stop();
        }
        self.listeners.clear();
    }
}

impl Drop for Propagator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Re-publish a remotely-received notification on the local bus.
///
/// Runs on the listener thread that received it, with the echo guard engaged
/// for the duration of the synchronous dispatch so the outbound handler in
/// the same dispatch does not forward the notification back out.
pub(crate) fn deliver_remote(bus: &CommitBus, parts: ChangedParts) {
    tracing::trace!(%parts, "delivering remote notification");
    let _guard = EchoGuard::engage();
    bus.publish(TXCOMMITTED_EVENT, &parts);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_deliver_remote_engages_echo_guard_for_dispatch() {
        let bus = CommitBus::new();
        let seen_flag = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen_flag.clone();
        bus.subscribe(
            TXCOMMITTED_EVENT,
            Arc::new(move |_parts| {
                seen_clone.lock().push(propagating_locally());
            }),
        );

        deliver_remote(&bus, ChangedParts::new(json!({"table": "todos"})));
        bus.publish(TXCOMMITTED_EVENT, &ChangedParts::new(json!({"table": "todos"})));

        assert_eq!(*seen_flag.lock(), vec![true, false]);
        assert!(!propagating_locally());
    }

    #[test]
    fn test_disabled_propagator_publish_is_silent_noop() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path())
            .without_direct_channel()
            .without_shared_store()
            .without_hub_messaging();

        let propagator = Propagator::start(config).unwrap();
        assert_eq!(propagator.strategy_kind(), StrategyKind::Disabled);
        assert!(!propagator.capabilities().any());

        // Local subscribers still hear local commits.
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();
        propagator.bus().subscribe(
            TXCOMMITTED_EVENT,
            Arc::new(move |_parts| {
                counter_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        propagator.publish(&ChangedParts::new(json!({"table": "todos"})));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_detaches_outbound_handler() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path())
            .without_direct_channel()
            .without_hub_messaging();

        let propagator = Propagator::start(config).unwrap();
        let bus = propagator.bus().clone();
        let before = bus.handler_count(TXCOMMITTED_EVENT);
        assert_eq!(before, 1);

        propagator.shutdown();
        assert_eq!(bus.handler_count(TXCOMMITTED_EVENT), 0);
    }
}
