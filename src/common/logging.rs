//! Tracing initialization
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is the embedding process's job. This helper covers the common case for
//! test benches and small tools: env-filtered fmt output with a sane
//! default level for this crate.

use tracing_subscriber::EnvFilter;

/// Install the default fmt subscriber
///
/// `RUST_LOG` still wins over `default_directive` (e.g. `tempix_rs=debug`).
/// Returns quietly if a global subscriber is already set, so tests may call
/// it repeatedly.
pub fn init(default_directive: &str) {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = default_directive.parse() {
        filter = filter.add_directive(directive);
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
