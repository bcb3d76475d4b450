//! Behaviour shared by every key-space request builder.

use axum::http::StatusCode;
use url::Url;

use crate::completion::CompletionHandle;
use crate::error::{EtcdError, Result};
use crate::http::{Dispatcher, RequestDescriptor};
use crate::keys::result::{decode_response, KeyResult};

/// Path prefix of the key space.
pub const KEYS_PREFIX: &str = "/v2/keys";

/// Prefix `key` with `/` when it lacks one.
pub fn normalize_key(key: &str) -> String {
    if key.starts_with('/') {
        key.to_string()
    } else {
        format!("/{}", key)
    }
}

/// `/v2/keys{key}` with characters outside the path set percent-encoded,
/// followed by `?query` when the query is not empty.
pub(crate) fn key_path(key: &str, query: &str) -> Result<String> {
    let mut url = Url::parse("http://localhost/").map_err(|e| EtcdError::InvalidRequest(e.to_string()))?;
    url.set_path(&format!("{}{}", KEYS_PREFIX, key));
    if query.is_empty() {
        Ok(url.path().to_string())
    } else {
        Ok(format!("{}?{}", url.path(), query))
    }
}

/// A key-space request that can be sent any number of times.
///
/// Each send is an independent dispatch with its own completion handle.
pub trait KeyRequest {
    /// Build the wire request. Fails before any I/O for invalid option sets.
    fn descriptor(&self) -> Result<RequestDescriptor>;

    /// Statuses that carry a result body; anything else is a rejection.
    fn success_statuses(&self) -> &'static [StatusCode];

    fn dispatcher(&self) -> &Dispatcher;

    /// Dispatch without blocking and return the typed completion handle.
    fn submit(&self) -> CompletionHandle<KeyResult> {
        let typed = CompletionHandle::new();
        let descriptor = match self.descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                typed.resolve(Err(e));
                return typed;
            }
        };

        let accepted = self.success_statuses();
        let sink = typed.clone();
        self.dispatcher().dispatch(descriptor).add_listener(move |outcome| {
            let decoded = match outcome {
                Ok(response) => decode_response(response, accepted),
                Err(e) => Err(e.clone()),
            };
            sink.resolve(decoded);
        });
        typed
    }

    /// Dispatch and park the calling thread until the result is available.
    ///
    /// Must not be called from a thread of the client's own runtime.
    fn send(&self) -> Result<KeyResult> {
        self.submit().wait()
    }

    /// Dispatch and hand the result to `listener` once available.
    fn send_async<F>(&self, listener: F)
    where
        F: FnOnce(&Result<KeyResult>) + Send + 'static,
    {
        self.submit().add_listener(listener);
    }
}
