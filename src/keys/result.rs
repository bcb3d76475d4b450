//! Decoded key-space results.
//!
//! # Responsibilities
//! - Model the JSON result of a key operation (action, node, previous node)
//! - Map non-success responses onto [`ProtocolError`]
//!
//! # Design Decisions
//! - Unknown actions decode to [`Action::Unknown`] instead of failing
//! - Error bodies without a message get a generic one

use std::time::Duration;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EtcdError, ProtocolError, Result, TransportError};
use crate::http::{RawResponse, ResponseMeta};

const DEFAULT_ERROR_MESSAGE: &str = "Error executing request";

/// Outcome of a successful key operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyResult {
    /// Cluster metadata at the time the request was served.
    pub meta: ResponseMeta,
    pub action: Action,
    pub node: Node,
    /// The node as it was before the operation, when the service reports it.
    pub prev_node: Option<Node>,
}

impl KeyResult {
    /// The node followed by every descendant, depth first.
    pub fn all_nodes(&self) -> Vec<&Node> {
        let mut nodes = Vec::new();
        collect(&self.node, &mut nodes);
        nodes
    }
}

fn collect<'a>(node: &'a Node, into: &mut Vec<&'a Node>) {
    into.push(node);
    for child in &node.nodes {
        collect(child, into);
    }
}

/// The operation the service performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    Get,
    Set,
    Delete,
    Update,
    Create,
    CompareAndSwap,
    CompareAndDelete,
    Expire,
    #[serde(other)]
    Unknown,
}

/// A key or directory in the key space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub created_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
    /// Remaining time to live in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dir: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,
}

impl Node {
    pub fn time_to_live(&self) -> Option<Duration> {
        self.ttl
            .and_then(|secs| u64::try_from(secs).ok())
            .map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    action: Action,
    node: Node,
    #[serde(default, rename = "prevNode")]
    prev_node: Option<Node>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error_code: i32,
    #[serde(default)]
    cause: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    index: Option<u64>,
}

/// Decode `response`, treating any status outside `accepted` as a rejection.
pub(crate) fn decode_response(response: &RawResponse, accepted: &[StatusCode]) -> Result<KeyResult> {
    if !accepted.contains(&response.status) {
        return Err(decode_error(response));
    }

    let body: ResultBody = serde_json::from_slice(&response.body).map_err(TransportError::decode)?;
    Ok(KeyResult {
        meta: response.meta(),
        action: body.action,
        node: body.node,
        prev_node: body.prev_node,
    })
}

fn decode_error(response: &RawResponse) -> EtcdError {
    match serde_json::from_slice::<ErrorBody>(&response.body) {
        Ok(body) => ProtocolError {
            status: response.status,
            error_code: body.error_code,
            message: body.message.unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
            cause: body.cause,
            index: body.index,
        }
        .into(),
        Err(e) => {
            tracing::warn!(status = %response.status, error = %e, "Undecodable error response");
            TransportError::decode(e).into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, HeaderValue};
    use chrono::TimeZone;

    fn raw(status: StatusCode, body: &'static str) -> RawResponse {
        let mut headers = HeaderMap::new();
        headers.insert("x-etcd-index", HeaderValue::from_static("12"));
        RawResponse {
            status,
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn decodes_set_with_previous_node() {
        let response = raw(
            StatusCode::OK,
            r#"{"action":"set",
                "node":{"createdIndex":8,"modifiedIndex":8,"key":"/foo","value":"bar",
                        "expiration":"2013-12-04T12:01:21.874888581-08:00","ttl":5},
                "prevNode":{"createdIndex":7,"modifiedIndex":7,"key":"/foo","value":"old"}}"#,
        );
        let result = decode_response(&response, &[StatusCode::OK, StatusCode::CREATED]).unwrap();

        assert_eq!(result.action, Action::Set);
        assert_eq!(result.meta.etcd_index, 12);
        assert_eq!(result.meta.raft_term, -1);
        assert_eq!(result.node.value.as_deref(), Some("bar"));
        assert_eq!(result.node.time_to_live(), Some(Duration::from_secs(5)));
        let expected = Utc.with_ymd_and_hms(2013, 12, 4, 20, 1, 21).unwrap();
        assert_eq!(
            result.node.expiration.map(|e| e.timestamp()),
            Some(expected.timestamp())
        );
        assert_eq!(result.prev_node.unwrap().value.as_deref(), Some("old"));
    }

    #[test]
    fn all_nodes_is_depth_first() {
        let response = raw(
            StatusCode::OK,
            r#"{"action":"get","node":{"key":"/","dir":true,"nodes":[
                {"key":"/a","dir":true,"createdIndex":2,"nodes":[{"key":"/a/x","value":"1","createdIndex":3}]},
                {"key":"/b","value":"2","createdIndex":4}]}}"#,
        );
        let result = decode_response(&response, &[StatusCode::OK]).unwrap();
        let keys: Vec<_> = result
            .all_nodes()
            .into_iter()
            .map(|n| n.key.clone().unwrap())
            .collect();
        assert_eq!(keys, vec!["/", "/a", "/a/x", "/b"]);
        assert!(result.node.dir);
        assert_eq!(result.node.created_index, 0);
    }

    #[test]
    fn unknown_action_is_tolerated() {
        let response = raw(StatusCode::OK, r#"{"action":"frobnicate","node":{"key":"/k"}}"#);
        let result = decode_response(&response, &[StatusCode::OK]).unwrap();
        assert_eq!(result.action, Action::Unknown);
    }

    #[test]
    fn camel_case_actions() {
        let response = raw(StatusCode::OK, r#"{"action":"compareAndSwap","node":{"key":"/k"}}"#);
        let result = decode_response(&response, &[StatusCode::OK]).unwrap();
        assert_eq!(result.action, Action::CompareAndSwap);
    }

    #[test]
    fn error_body_becomes_protocol_error() {
        let response = raw(
            StatusCode::NOT_FOUND,
            r#"{"errorCode":100,"message":"Key not found","cause":"/missing","index":12}"#,
        );
        let err = decode_response(&response, &[StatusCode::OK]).unwrap_err();
        let protocol = err.as_protocol().unwrap();
        assert_eq!(protocol.status, StatusCode::NOT_FOUND);
        assert_eq!(protocol.error_code, ErrorCode::KEY_NOT_FOUND);
        assert_eq!(protocol.cause.as_deref(), Some("/missing"));
        assert_eq!(protocol.index, Some(12));
        assert!(err.is_key_not_found());
    }

    #[test]
    fn error_body_without_message_gets_default() {
        let response = raw(StatusCode::PRECONDITION_FAILED, r#"{"errorCode":101}"#);
        let err = decode_response(&response, &[StatusCode::OK]).unwrap_err();
        assert_eq!(err.as_protocol().unwrap().message, "Error executing request");
    }

    #[test]
    fn undecodable_bodies_are_decode_errors() {
        let bad_error = raw(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert!(matches!(
            decode_response(&bad_error, &[StatusCode::OK]),
            Err(EtcdError::Transport(TransportError::Decode { .. }))
        ));

        let bad_success = raw(StatusCode::OK, "not json");
        assert!(matches!(
            decode_response(&bad_success, &[StatusCode::OK]),
            Err(EtcdError::Transport(TransportError::Decode { .. }))
        ));
    }
}
