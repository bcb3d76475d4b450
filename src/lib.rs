//! Client for an etcd v2 style key-value cluster.
//!
//! # Architecture Overview
//!
//! ```text
//!     Caller thread                        I/O runtime (tokio)
//!     ─────────────                        ───────────────────
//!     EtcdClient::get/set/delete
//!         → keys (build descriptor)
//!         → http::Dispatcher::dispatch ──▶ task per dispatch
//!                                              → cluster::ServerPool (eligible order)
//!                                              → connect / fail over / redirect
//!                                              → net::PendingRequest::complete
//!                                                  → completion::CallbackExecutor
//!     CompletionHandle ◀──────────────────────── resolve (exactly once)
//!         → wait() / outcome().await / listeners
//! ```
//!
//! Cross-cutting: `config` (TOML), `observability` (tracing, metrics),
//! `error` (transport vs. protocol failures).

// Core subsystems
pub mod cluster;
pub mod completion;
pub mod http;
pub mod net;

// Key-space API
pub mod client;
pub mod keys;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod observability;

pub use client::{EtcdClient, EtcdClientBuilder};
pub use completion::CompletionHandle;
pub use error::{ErrorCode, EtcdError, ProtocolError, Result, TransportError};
pub use keys::{Action, KeyRequest, KeyResult, Node};
