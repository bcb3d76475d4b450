//! HTTP dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! RequestDescriptor (method, path + query, headers, body)
//!     → dispatcher.rs (eligible order from the pool, spawn one task)
//!         → connect to the next candidate
//!             → connect failure: mark server, try next (if enabled)
//!         → write request, await response, collect body
//!         → redirect.rs (301/307: resolve Location, re-issue once per hop)
//!     → response.rs (RawResponse + ResponseMeta headers)
//!     → PendingRequest::complete → CompletionHandle
//! ```
//!
//! # Design Decisions
//! - Descriptors are opaque to the dispatcher; no key-space knowledge here
//! - Fresh connection per attempt, closed after one response
//! - Errors after connect are final for the dispatch

pub mod dispatcher;
pub mod redirect;
pub mod request;
pub mod response;

pub use dispatcher::{
    DispatchSettings, Dispatcher, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS,
    DEFAULT_MAX_RESPONSE_BYTES,
};
pub use redirect::{is_redirect, resolve_location, RedirectTarget};
pub use request::RequestDescriptor;
pub use response::{RawResponse, ResponseMeta, ETCD_INDEX_HEADER, RAFT_INDEX_HEADER, RAFT_TERM_HEADER};
