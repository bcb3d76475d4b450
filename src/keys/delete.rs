//! Key removal.

use axum::http::{Method, StatusCode};
use url::form_urlencoded;

use crate::error::Result;
use crate::http::{Dispatcher, RequestDescriptor};
use crate::keys::request::{key_path, normalize_key, KeyRequest};

/// `DELETE /v2/keys{key}`, optionally conditional on the current value.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    dispatcher: Dispatcher,
    key: String,
    previous_value: Option<String>,
    previous_index: Option<u64>,
    directory: bool,
    recursive: bool,
}

impl DeleteRequest {
    pub(crate) fn new(dispatcher: Dispatcher, key: &str) -> Self {
        Self {
            dispatcher,
            key: normalize_key(key),
            previous_value: None,
            previous_index: None,
            directory: false,
            recursive: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Only delete if the current value equals `value`.
    #[must_use]
    pub fn previous_value(mut self, value: impl Into<String>) -> Self {
        self.previous_value = Some(value.into());
        self
    }

    /// Only delete if the key was last modified at `index`.
    #[must_use]
    pub fn previous_index(mut self, index: u64) -> Self {
        self.previous_index = Some(index);
        self
    }

    /// Delete an empty directory.
    #[must_use]
    pub fn directory(mut self) -> Self {
        self.directory = true;
        self
    }

    /// Delete a directory and everything below it.
    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    fn query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        if let Some(value) = &self.previous_value {
            query.append_pair("prevValue", value);
        }
        if let Some(index) = self.previous_index {
            query.append_pair("prevIndex", &index.to_string());
        }
        if self.directory {
            query.append_pair("dir", "true");
        }
        if self.recursive {
            query.append_pair("recursive", "true");
        }
        query.finish()
    }
}

impl KeyRequest for DeleteRequest {
    fn descriptor(&self) -> Result<RequestDescriptor> {
        Ok(RequestDescriptor::new(Method::DELETE, key_path(&self.key, &self.query())?))
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
    async fn conditional_recursive_delete() {
        let request = DeleteRequest::new(dispatcher(), "queue")
            .recursive()
            .directory()
            .previous_index(9)
            .previous_value("a&b");
        let descriptor = request.descriptor().unwrap();
        assert_eq!(descriptor.method, Method::DELETE);
        assert_eq!(
            descriptor.path,
            "/v2/keys/queue?prevValue=a%26b&prevIndex=9&dir=true&recursive=true"
        );
    }

    #[tokio::test]
    async fn plain_delete_has_no_query() {
        let request = DeleteRequest::new(dispatcher(), "/k");
        assert_eq!(request.descriptor().unwrap().path, "/v2/keys/k");
    }
}
