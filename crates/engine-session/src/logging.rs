//! Tracing setup.
//!
//! The library only emits `tracing` events; installing a subscriber is up
//! to the embedding program. This helper does it the usual way: an fmt
//! subscriber filtered by `RUST_LOG`, or by the given default.

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber. Returns `false` if one was already set.
pub fn init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
