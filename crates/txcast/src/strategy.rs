//! Strategy selection.
//!
//! Chosen once at startup from the detected capabilities and never revised:
//! either the single bidirectional datagram channel, or the fallback chain
//! of store and hub legs used together, or nothing. An adapter that fails to
//! open inside the chosen strategy is logged and left inactive; the other
//! legs carry on.

use std::sync::Arc;

use crate::capabilities::Capabilities;
use crate::config::PropagatorConfig;
use crate::transport::{ChannelTransport, HubTransport, StoreTransport, Transport};

/// Which propagation strategy a context runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Single bidirectional datagram channel.
    DirectChannel,
    /// Store and hub legs used together.
    FallbackChain,
    /// No usable transport; local notifications stay local.
    Disabled,
}

/// The chosen strategy and its live adapters.
pub struct Strategy {
    kind: StrategyKind,
    transports: Vec<Arc<dyn Transport>>,
}

impl Strategy {
    /// Build the adapter set for the detected capabilities.
    pub fn select(capabilities: &Capabilities, config: &PropagatorConfig) -> Self {
        match capabilities.strategy_kind() {
            StrategyKind::DirectChannel => match ChannelTransport::open(config) {
                Ok(channel) => Self {
                    kind: StrategyKind::DirectChannel,
                    transports: vec![Arc::new(channel)],
                },
                Err(err) => {
                    // The probe passed moments ago; treat the capability as
                    // lost rather than surfacing an error.
                    tracing::debug!(error = %err, "datagram channel vanished after probe");
                    Self::disabled()
                }
            },
            StrategyKind::FallbackChain => {
                let mut transports: Vec<Arc<dyn Transport>> = Vec::new();

                if capabilities.shared_store {
                    match StoreTransport::open(config) {
                        Ok(store) => transports.push(Arc::new(store)),
                        Err(err) => {
                            tracing::debug!(error = %err, "store leg unavailable");
                        }
                    }
                }
                if capabilities.hub_messaging {
                    match HubTransport::open(config) {
                        Ok(hub) => transports.push(Arc::new(hub)),
                        Err(err) => {
                            tracing::debug!(error = %err, "hub leg unavailable");
                        }
                    }
                }

                if transports.is_empty() {
                    Self::disabled()
                } else {
                    Self {
                        kind: StrategyKind::FallbackChain,
                        transports,
                    }
                }
            }
            StrategyKind::Disabled => Self::disabled(),
        }
    }

    fn disabled() -> Self {
        Self {
            kind: StrategyKind::Disabled,
            transports: Vec::new(),
        }
    }

    /// The chosen strategy kind.
    pub fn kind(&self) -> StrategyKind {
        self.kind
    }

    /// Live adapters, empty when disabled.
    pub fn transports(&self) -> &[Arc<dyn Transport>] {
        &self.transports
    }

    /// Whether any adapter is live.
    pub fn is_active(&self) -> bool {
        !self.transports.is_empty()
    }
}

impl std::fmt::Debug for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Strategy")
            .field("kind", &self.kind)
            .field("transports", &self.transports.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropagatorConfig;
    use crate::transport::TransportKind;

    #[test]
    fn test_disabled_when_nothing_permitted() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path())
            .without_direct_channel()
            .without_shared_store()
            .without_hub_messaging();
        let capabilities = Capabilities::detect(&config);

        let strategy = Strategy::select(&capabilities, &config);
        assert_eq!(strategy.kind(), StrategyKind::Disabled);
        assert!(!strategy.is_active());
    }

    #[test]
    fn test_fallback_chain_builds_store_and_hub() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path()).without_direct_channel();
        let capabilities = Capabilities::detect(&config);

        let strategy = Strategy::select(&capabilities, &config);
        assert_eq!(strategy.kind(), StrategyKind::FallbackChain);

        let kinds: Vec<TransportKind> = strategy.transports().iter().map(|t| t.kind()).collect();
        assert!(kinds.contains(&TransportKind::Store));
        // The hub leg needs ipc sockets; it may be absent in restricted
        // environments, the store leg must not be.
    }

    #[test]
    fn test_store_only_fallback() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path())
            .without_direct_channel()
            .without_hub_messaging();
        let capabilities = Capabilities::detect(&config);

        let strategy = Strategy::select(&capabilities, &config);
        assert_eq!(strategy.kind(), StrategyKind::FallbackChain);
        assert_eq!(strategy.transports().len(), 1);
        assert_eq!(strategy.transports()[0].kind(), TransportKind::Store);
    }

    #[test]
    fn test_direct_channel_is_single_adapter() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path());
        let capabilities = Capabilities::detect(&config);
        if !capabilities.direct_channel {
            eprintln!("multicast unavailable in this environment, skipping");
            return;
        }

        let strategy = Strategy::select(&capabilities, &config);
        assert_eq!(strategy.kind(), StrategyKind::DirectChannel);
        assert_eq!(strategy.transports().len(), 1);
        assert_eq!(strategy.transports()[0].kind(), TransportKind::Channel);
    }
}
