//! Server pool subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch starts
//!     → pool.rs (eligible_order: drop entries inside their backoff window,
//!                shuffle primaries and secondaries independently,
//!                primaries first)
//!     → Dispatcher walks the order, one connection attempt per entry
//!     → On connect failure: server.rs (mark_failed stamps the entry)
//!     → Entry re-enters the order once the backoff window elapses
//! ```
//!
//! # Design Decisions
//! - Membership is append-only; entries are never evicted
//! - Failure timestamps are lock-free, last write wins
//! - Only connect failures count; protocol errors never mark a server

pub mod pool;
pub mod server;

pub use pool::{ServerPool, DEFAULT_BACKOFF_WINDOW};
pub use server::{ServerAddress, ServerEntry, Tier};
