//! Structured logging setup for binaries and tests.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the application. [`init_logging`] is the one used by `keyctl`.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a formatted subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` for this crate.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("etcd_v2_client={default_level},keyctl={default_level}").into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}

/// Levels accepted by [`init_logging`] and the `log_level` setting.
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
