//! Transport capability detection.
//!
//! Computed once at startup and read-only afterwards: which legs this
//! process can physically use, given its environment and role. Nothing here
//! is an error: a missing capability just means fewer active legs, down to
//! none at all.

use std::fs;

use crate::config::{PropagatorConfig, Role};
use crate::strategy::StrategyKind;
use crate::transport::ChannelTransport;

/// The set of transports usable in the current context.
///
/// Immutable after [`Capabilities::detect`]; the propagator keeps it for the
/// lifetime of the process so applications can inspect what cross-process
/// sync is actually available.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// Role of this process.
    pub role: Role,
    /// The origin directory exists; without it there is no peer group.
    pub origin_attached: bool,
    /// The datagram channel can be joined.
    pub direct_channel: bool,
    /// The shared store file can be written and watched. Never set for the
    /// hub role: the hub has no store leg, mirroring how it neither issues
    /// nor observes store changes on behalf of foreground peers.
    pub shared_store: bool,
    /// The hub socket path is usable (listening or lazily dialing).
    pub hub_messaging: bool,
}

impl Capabilities {
    /// Probe the environment once.
    pub fn detect(config: &PropagatorConfig) -> Self {
        let origin_attached = config.origin.is_dir();
        let subdir_usable = origin_attached && fs::create_dir_all(config.origin_subdir()).is_ok();

        let direct_channel =
            origin_attached && config.direct_channel && ChannelTransport::probe(config);
        let shared_store =
            subdir_usable && config.shared_store && config.role == Role::Foreground;
        let hub_messaging = subdir_usable && config.hub_messaging;

        let capabilities = Self {
            role: config.role,
            origin_attached,
            direct_channel,
            shared_store,
            hub_messaging,
        };

        tracing::debug!(
            role = ?capabilities.role,
            origin_attached,
            direct_channel,
            shared_store,
            hub_messaging,
            "capabilities detected"
        );

        capabilities
    }

    /// Which strategy these capabilities select.
    ///
    /// Exactly one: the direct channel when available, otherwise the
    /// fallback chain when any of its legs is, otherwise propagation is
    /// disabled.
    pub fn strategy_kind(&self) -> StrategyKind {
        if self.direct_channel {
            StrategyKind::DirectChannel
        } else if self.shared_store || self.hub_messaging {
            StrategyKind::FallbackChain
        } else {
            StrategyKind::Disabled
        }
    }

    /// Whether any transport is usable at all.
    pub fn any(&self) -> bool {
        self.direct_channel || self.shared_store || self.hub_messaging
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PropagatorConfig;

    #[test]
    fn test_detect_without_origin_disables_everything() {
        let config = PropagatorConfig::new("/nonexistent/origin/for/txcast");
        let capabilities = Capabilities::detect(&config);

        assert!(!capabilities.origin_attached);
        assert!(!capabilities.any());
        assert_eq!(capabilities.strategy_kind(), StrategyKind::Disabled);
    }

    #[test]
    fn test_detect_fallback_legs_on_plain_directory() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path()).without_direct_channel();
        let capabilities = Capabilities::detect(&config);

        assert!(capabilities.origin_attached);
        assert!(!capabilities.direct_channel);
        assert!(capabilities.shared_store);
        assert!(capabilities.hub_messaging);
        assert_eq!(capabilities.strategy_kind(), StrategyKind::FallbackChain);
    }

    #[test]
    fn test_hub_role_has_no_store_leg() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::hub(origin.path()).without_direct_channel();
        let capabilities = Capabilities::detect(&config);

        assert!(!capabilities.shared_store);
        assert!(capabilities.hub_messaging);
        assert_eq!(capabilities.strategy_kind(), StrategyKind::FallbackChain);
    }

    #[test]
    fn test_all_legs_forbidden_disables_propagation() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path())
            .without_direct_channel()
            .without_shared_store()
            .without_hub_messaging();
        let capabilities = Capabilities::detect(&config);

        assert!(capabilities.origin_attached);
        assert!(!capabilities.any());
        assert_eq!(capabilities.strategy_kind(), StrategyKind::Disabled);
    }

    #[test]
    fn test_direct_channel_wins_when_probe_succeeds() {
        let origin = tempfile::tempdir().unwrap();
        let config = PropagatorConfig::new(origin.path());
        let capabilities = Capabilities::detect(&config);

        if !capabilities.direct_channel {
            eprintln!("multicast unavailable in this environment, skipping");
            return;
        }
        assert_eq!(capabilities.strategy_kind(), StrategyKind::DirectChannel);
    }
}
