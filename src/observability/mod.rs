//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and completion path produce:
//!     → logging.rs (structured log events, `dispatch` span per request)
//!     → metrics.rs (dispatch outcomes, latency, connect failures, redirects)
//!
//! Consumers:
//!     → Whatever subscriber / recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - The library never installs a global subscriber or recorder itself
//! - Every dispatch carries a UUID that appears on all of its log lines
//! - Metric updates are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
