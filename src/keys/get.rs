//! Key retrieval.

use axum::http::{Method, StatusCode};
use url::form_urlencoded;

use crate::error::Result;
use crate::http::{Dispatcher, RequestDescriptor};
use crate::keys::request::{key_path, normalize_key, KeyRequest};

/// `GET /v2/keys{key}` with optional read and watch options.
#[derive(Debug, Clone)]
pub struct GetRequest {
    dispatcher: Dispatcher,
    key: String,
    consistent: bool,
    recursive: bool,
    sorted: bool,
    wait: bool,
    wait_index: Option<u64>,
}

impl GetRequest {
    pub(crate) fn new(dispatcher: Dispatcher, key: &str) -> Self {
        Self {
            dispatcher,
            key: normalize_key(key),
            consistent: false,
            recursive: false,
            sorted: false,
            wait: false,
            wait_index: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Serve the read through the leader.
    #[must_use]
    pub fn consistent(mut self) -> Self {
        self.consistent = true;
        self
    }

    /// Include every descendant of a directory.
    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    /// Return directory children in key order.
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.sorted = true;
        self
    }

    /// Wait until the key changes instead of returning its current value.
    #[must_use]
    pub fn wait_for_change(mut self) -> Self {
        self.wait = true;
        self
    }

    /// Wait for the first change at or after `index`.
    #[must_use]
    pub fn wait_index(mut self, index: u64) -> Self {
        self.wait_index = Some(index);
        self
    }

    fn query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if self.consistent {
            query.append_pair("consistent", "true");
        }
        if self.recursive {
            query.append_pair("recursive", "true");
        }
        if self.sorted {
            query.append_pair("sorted", "true");
        }
        if self.wait {
            query.append_pair("wait", "true");
        }
        if let Some(index) = self.wait_index {
            query.append_pair("waitIndex", &index.to_string());
        }
        query.finish()
    }
}

impl KeyRequest for GetRequest {
    fn descriptor(&self) -> Result<RequestDescriptor> {
        Ok(RequestDescriptor::new(Method::GET, key_path(&self.key, &self.query())?))
    }

    fn success_statuses(&self) -> &'static [StatusCode] {
        &[StatusCode::OK]
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::dispatcher;

    #[tokio::test]
    async fn plain_get() {
        let request = GetRequest::new(dispatcher(), "foo");
        let descriptor = request.descriptor().unwrap();
        assert_eq!(descriptor.method, Method::GET);
        assert_eq!(descriptor.path, "/v2/keys/foo");
        assert!(descriptor.body.is_empty());
    }

    #[tokio::test]
    async fn all_options_in_order() {
        let request = GetRequest::new(dispatcher(), "/dir")
            .wait_index(42)
            .sorted()
            .wait_for_change()
            .recursive()
            .consistent();
        assert_eq!(
            request.descriptor().unwrap().path,
            "/v2/keys/dir?consistent=true&recursive=true&sorted=true&wait=true&waitIndex=42"
        );
    }
}
