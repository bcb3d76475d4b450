//! Key creation and update.

use std::time::Duration;

use axum::http::header::HeaderValue;
use axum::http::{Method, StatusCode};
use url::form_urlencoded;

use crate::error::{EtcdError, Result};
use crate::http::{Dispatcher, RequestDescriptor};
use crate::keys::request::{key_path, normalize_key, KeyRequest};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=utf-8";

/// `PUT /v2/keys{key}` (or `POST` for in-order keys) with a form body.
#[derive(Debug, Clone)]
pub struct SetRequest {
    dispatcher: Dispatcher,
    key: String,
    value: Option<String>,
    time_to_live: Option<Duration>,
    directory: bool,
    must_exist: bool,
    must_not_exist: bool,
    previous_value: Option<String>,
    previous_index: Option<u64>,
    in_order: bool,
}

impl SetRequest {
    pub(crate) fn new(dispatcher: Dispatcher, key: &str) -> Self {
        Self {
            dispatcher,
            key: normalize_key(key),
            value: None,
            time_to_live: None,
            directory: false,
            must_exist: false,
            must_not_exist: false,
            previous_value: None,
            previous_index: None,
            in_order: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Expire the key after `ttl`, truncated to whole seconds.
    #[must_use]
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Create a directory instead of a key.
    #[must_use]
    pub fn directory(mut self) -> Self {
        self.directory = true;
        self
    }

    /// Only update an existing key.
    #[must_use]
    pub fn must_exist(mut self) -> Self {
        self.must_exist = true;
        self
    }

    /// Only create the key if it does not exist yet.
    #[must_use]
    pub fn must_not_exist(mut self) -> Self {
        self.must_not_exist = true;
        self
    }

    /// Compare-and-swap on the current value.
    #[must_use]
    pub fn previous_value(mut self, value: impl Into<String>) -> Self {
        self.previous_value = Some(value.into());
        self
    }

    /// Compare-and-swap on the last modification index.
    #[must_use]
    pub fn previous_index(mut self, index: u64) -> Self {
        self.previous_index = Some(index);
        self
    }

    /// Create a uniquely named, ordered key inside the directory `key`.
    #[must_use]
    pub fn in_order(mut self) -> Self {
        self.in_order = true;
        self
    }

    fn form(&self) -> Result<String> {
        if self.must_exist && self.must_not_exist {
            return Err(EtcdError::InvalidRequest(
                "a key cannot be required to both exist and not exist".to_string(),
            ));
        }

        let mut form = form_urlencoded::Serializer::new(String::new());
        if let Some(value) = &self.value {
            form.append_pair("value", value);
        }
        if let Some(ttl) = self.time_to_live {
            form.append_pair("ttl", &ttl.as_secs().to_string());
        }
        if self.directory {
            form.append_pair("dir", "true");
        }
        if self.must_exist {
            form.append_pair("prevExist", "true");
        }
        if self.must_not_exist {
            form.append_pair("prevExist", "false");
        }
        if let Some(value) = &self.previous_value {
            form.append_pair("prevValue", value);
        }
        if let Some(index) = self.previous_index {
            form.append_pair("prevIndex", &index.to_string());
        }
        Ok(form.finish())
    }
}

impl KeyRequest for SetRequest {
    fn descriptor(&self) -> Result<RequestDescriptor> {
        let method = if self.in_order { Method::POST } else { Method::PUT };
        let form = self.form()?;
        Ok(RequestDescriptor::new(method, key_path(&self.key, "")?)
            .body(HeaderValue::from_static(FORM_CONTENT_TYPE), form))
    }

    fn success_statuses(&self) -> &'static [StatusCode] {
        &[StatusCode::OK, StatusCode::CREATED]
    }

    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
