//! Log/trace subscriber setup for the binary.
//!
//! Spans and structured fields are emitted throughout the crates via
//! `tracing`; this installs the subscriber that renders them. Shipping
//! them to a collector is a deployment concern layered on top.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber: `RUST_LOG` filter (default `info`)
/// over a compact fmt layer. Call once, before anything logs.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
