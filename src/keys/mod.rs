//! Key-space request subsystem.
//!
//! # Data Flow
//! ```text
//! EtcdClient::get / set / delete (key)
//!     → get.rs / set.rs / delete.rs (builder collects options)
//!     → request.rs (KeyRequest::descriptor: path, query or form body)
//!     → Dispatcher::dispatch → CompletionHandle<RawResponse>
//!     → result.rs (status check, JSON → KeyResult or ProtocolError)
//!     → CompletionHandle<KeyResult> (send / submit / send_async)
//! ```
//!
//! # Design Decisions
//! - Builders are reusable; every send is a fresh dispatch
//! - Invalid option combinations fail before any connection is opened
//! - Keys are normalised to start with `/`

pub mod delete;
pub mod get;
pub mod request;
pub mod result;
pub mod set;

pub use delete::DeleteRequest;
pub use get::GetRequest;
pub use request::{normalize_key, KeyRequest, KEYS_PREFIX};
pub use result::{Action, KeyResult, Node};
pub use set::SetRequest;
