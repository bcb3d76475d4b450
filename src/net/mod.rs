//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatch accepted
//!     → pending.rs (PendingRequest: descriptor + handle, moved into the task)
//!     → connection.rs (ConnectionGuard per attempt, tracked until closed)
//!     → Hand the outcome back through PendingRequest::complete
//! ```
//!
//! # Design Decisions
//! - The context travels with the task; no lookup by connection key
//! - Each attempt opens its own connection and closes it afterwards
//! - A torn-down task still resolves its handle

pub mod connection;
pub mod pending;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use pending::{DispatchId, PendingRequest};
