//! Request descriptor handed to the dispatcher.
//!
//! # Responsibilities
//! - Carry a ready-to-send method, path (with query), headers and body
//! - Stay opaque to the dispatcher: no knowledge of the key-space schema

use axum::body::Bytes;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use axum::http::{HeaderMap, Method};

/// A logical request, independent of the server it ends up on.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Origin-form target: absolute path plus optional `?query`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a body with its content type.
    #[must_use]
    pub fn body(mut self, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        self.headers.insert(CONTENT_TYPE, content_type);
        self.body = body.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_sets_content_type() {
        let req = RequestDescriptor::new(Method::PUT, "/v2/keys/a").body(
            HeaderValue::from_static("application/x-www-form-urlencoded"),
            "value=1",
        );
        assert_eq!(req.body, Bytes::from_static(b"value=1"));
        assert_eq!(
            req.headers.get(CONTENT_TYPE).unwrap(),
            "application/x-www-form-urlencoded"
        );
    }
}
