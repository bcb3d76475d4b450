//! Raw responses and the cluster metadata they carry.
//!
//! # Responsibilities
//! - Hold the status, headers and collected body of one response
//! - Parse the index/term headers for the result-mapping layer
//!
//! # Design Decisions
//! - Bodies are never inspected here; decoding belongs to the caller
//! - Missing or malformed metadata headers read as -1

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use serde::Serialize;

/// Cluster index at the time the request was served.
pub const ETCD_INDEX_HEADER: &str = "x-etcd-index";
/// Consensus-log index.
pub const RAFT_INDEX_HEADER: &str = "x-raft-index";
/// Consensus term.
pub const RAFT_TERM_HEADER: &str = "x-raft-term";

/// Transport-level result of a dispatch.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Index/term metadata from the response headers.
    pub fn meta(&self) -> ResponseMeta {
        ResponseMeta {
            etcd_index: header_i64(&self.headers, ETCD_INDEX_HEADER),
            raft_index: header_i64(&self.headers, RAFT_INDEX_HEADER),
            raft_term: header_i64(&self.headers, RAFT_TERM_HEADER),
        }
    }
}

/// Global cluster information attached to every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseMeta {
    pub etcd_index: i64,
    pub raft_index: i64,
    pub raft_term: i64,
}

fn header_i64(headers: &HeaderMap, name: &str) -> i64 {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(-1)
}
