//! Logging Setup
//!
//! Installs a `tracing` subscriber for binaries and tests embedding the bridge.

use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVE: &str = "waha_bridge=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_directive`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
