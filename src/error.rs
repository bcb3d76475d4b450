//! Error taxonomy surfaced to callers.
//!
//! Two outcome families reach the caller: [`TransportError`] (the request
//! never produced a usable response) and [`ProtocolError`] (the service
//! answered with a structured rejection). Both travel through the same
//! [`CompletionHandle`](crate::completion::CompletionHandle) channel as a
//! successful response, so every error here is `Clone`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::cluster::ServerAddress;

/// Shared, type-erased error cause.
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error for every client operation.
#[derive(Debug, Clone, Error)]
pub enum EtcdError {
    /// Connectivity or I/O-layer failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The service rejected the operation with a structured error body.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An internal invariant was violated. Never retried.
    #[error("internal error: {0}")]
    Internal(String),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl EtcdError {
    /// Returns the protocol error if the service rejected the request.
    pub fn as_protocol(&self) -> Option<&ProtocolError> {
        match self {
            EtcdError::Protocol(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the transport error if the request failed below the protocol.
    pub fn as_transport(&self) -> Option<&TransportError> {
        match self {
            EtcdError::Transport(e) => Some(e),
            _ => None,
        }
    }

    /// True when the service reported the requested key as missing.
    pub fn is_key_not_found(&self) -> bool {
        self.as_protocol()
            .map(|e| e.error_code == ErrorCode::KEY_NOT_FOUND)
            .unwrap_or(false)
    }
}

/// Failures below the protocol layer.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Every server is inside its backoff window (or none is configured).
    #[error("no eligible servers available")]
    NoEligibleServers,

    /// The TCP connection to `server` could not be established.
    #[error("failed to connect to {server}: {source}")]
    Connect {
        server: ServerAddress,
        #[source]
        source: Cause,
    },

    /// The peer closed the connection before a response arrived.
    #[error("connection closed unexpectedly")]
    ConnectionClosed,

    /// Any other failure while writing the request or reading the response.
    #[error("i/o failure: {source}")]
    Io {
        #[source]
        source: Cause,
    },

    /// No response arrived within the configured response timeout.
    #[error("no response within {0:?}")]
    ResponseTimeout(Duration),

    /// The redirect chain exceeded the configured hop limit.
    #[error("too many redirects (limit {0})")]
    TooManyRedirects(u32),

    /// A redirect response carried a missing or unusable `Location`.
    #[error("invalid redirect: {0}")]
    InvalidRedirect(String),

    /// The response body exceeded `max_response_bytes`.
    #[error("response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// A response body could not be decoded.
    #[error("failed to decode response: {source}")]
    Decode {
        #[source]
        source: Cause,
    },

    /// The client was closed while the request was pending.
    #[error("client closed while request was pending")]
    ClientClosed,
}

impl TransportError {
    pub(crate) fn io<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TransportError::Io {
            source: Arc::new(error),
        }
    }

    pub(crate) fn decode<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        TransportError::Decode {
            source: Arc::new(error),
        }
    }
}

/// A well-formed error response from the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError {
    /// HTTP status of the response.
    pub status: StatusCode,
    /// Service error code, see [`ErrorCode`].
    pub error_code: i32,
    /// Human-readable message.
    pub message: String,
    /// Optional detail (usually the key involved).
    pub cause: Option<String>,
    /// Cluster index at the time of the error, when reported.
    pub index: Option<u64>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})", self.message, cause),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Well-known service error codes.
#[derive(Debug, Clone, Copy)]
pub struct ErrorCode;

impl ErrorCode {
    pub const KEY_NOT_FOUND: i32 = 100;
    pub const TEST_FAILED: i32 = 101;
    pub const NOT_FILE: i32 = 102;
    pub const NOT_DIR: i32 = 104;
    pub const NODE_EXIST: i32 = 105;
    pub const ROOT_READ_ONLY: i32 = 107;
    pub const DIR_NOT_EMPTY: i32 = 108;

    pub const PREV_VALUE_REQUIRED: i32 = 201;
    pub const TTL_NAN: i32 = 202;
    pub const INDEX_NAN: i32 = 203;
    pub const INVALID_FIELD: i32 = 209;
    pub const INVALID_FORM: i32 = 210;

    pub const RAFT_INTERNAL: i32 = 300;
    pub const LEADER_ELECT: i32 = 301;

    pub const WATCHER_CLEARED: i32 = 400;
    pub const EVENT_INDEX_CLEARED: i32 = 401;
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, EtcdError>;
