//! txcast hub - background peer for commit-notification propagation.
//!
//! The hub is the long-lived background context of an origin: foreground
//! processes post their commit notifications to it, and its own commits (or
//! notifications injected by an embedding host) fan out to every connected
//! foreground peer. It runs the fallback chain's hub leg; it has no store
//! leg of its own.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txcast::{Propagator, PropagatorConfig, TXCOMMITTED_EVENT};

/// Command-line arguments for the hub daemon.
#[derive(Parser, Debug)]
#[command(name = "txcast-hub")]
#[command(version, about = "txcast background hub", long_about = None)]
struct Args {
    /// Origin directory shared with the foreground processes.
    #[arg(short, long)]
    origin: PathBuf,

    /// Datagram channel port override (default derives from the origin).
    #[arg(long)]
    channel_port: Option<u16>,

    /// Disable the datagram channel, forcing the fallback chain.
    #[arg(long)]
    no_channel: bool,
}

impl Args {
    fn into_config(self) -> PropagatorConfig {
        let mut config = PropagatorConfig::hub(self.origin);
        if let Some(port) = self.channel_port {
            config = config.with_channel_port(port);
        }
        if self.no_channel {
            config = config.without_direct_channel();
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "txcast_hub=info,txcast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.into_config();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        origin = %config.origin.display(),
        "starting txcast hub"
    );

    let propagator = Propagator::start(config)?;
    tracing::info!(
        strategy = ?propagator.strategy_kind(),
        "hub ready, propagating commit notifications"
    );

    // Surface every notification that reaches this context; an embedding
    // host would hand these to its own live-query engine.
    propagator.bus().subscribe(
        TXCOMMITTED_EVENT,
        Arc::new(|parts| {
            tracing::debug!(%parts, "commit notification");
        }),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal");

    propagator.shutdown();
    tracing::info!("hub shutdown complete");

    Ok(())
}
