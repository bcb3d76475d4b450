//! Client facade.
//!
//! # Responsibilities
//! - Assemble the server pool, dispatcher and callback executor
//! - Own the I/O runtime unless the caller provides one
//! - Hand out key-space request builders
//! - Shut the runtime down on close, resolving everything still pending

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::{Builder as RuntimeBuilder, Handle, Runtime};

use crate::cluster::{ServerAddress, ServerPool, Tier, DEFAULT_BACKOFF_WINDOW};
use crate::completion::{BlockingPoolExecutor, CallbackExecutor, CompletionHandle, InlineExecutor};
use crate::config::{validate_config, CallbackMode, ClientConfig};
use crate::error::{EtcdError, Result, TransportError};
use crate::http::{DispatchSettings, Dispatcher, RawResponse, RequestDescriptor};
use crate::keys::{DeleteRequest, GetRequest, SetRequest};

const DEFAULT_WORKER_THREADS: usize = 2;

/// Client for a cluster of key-value servers.
///
/// Dropping the client closes it.
pub struct EtcdClient {
    dispatcher: Dispatcher,
    /// Present while the client owns a runtime that has not been shut down.
    runtime: Mutex<Option<Runtime>>,
}

impl EtcdClient {
    pub fn builder() -> EtcdClientBuilder {
        EtcdClientBuilder::new()
    }

    /// Build a client from a loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        validate_config(config).map_err(|errors| {
            let joined = errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
            EtcdError::InvalidRequest(joined)
        })?;

        let mut builder = EtcdClientBuilder::new()
            .backoff_window(config.dispatch.backoff_window())
            .worker_threads(config.runtime.worker_threads)
            .callback_mode(config.runtime.callbacks);
        builder.settings = config.dispatch.settings();

        for server in &config.servers {
            builder = builder.add_server(&server.address, server.primary);
        }
        builder.build()
    }

    pub fn get(&self, key: &str) -> GetRequest {
        GetRequest::new(self.dispatcher.clone(), key)
    }

    pub fn set(&self, key: &str) -> SetRequest {
        SetRequest::new(self.dispatcher.clone(), key)
    }

    pub fn delete(&self, key: &str) -> DeleteRequest {
        DeleteRequest::new(self.dispatcher.clone(), key)
    }

    /// Dispatch a raw request, bypassing the key-space builders.
    pub fn dispatch(&self, request: RequestDescriptor) -> CompletionHandle<RawResponse> {
        self.dispatcher.dispatch(request)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Connections currently open towards the cluster.
    pub fn open_connections(&self) -> u64 {
        self.dispatcher.open_connections()
    }

    /// Shut down the owned runtime.
    ///
    /// Every dispatch still in flight resolves with
    /// [`TransportError::ClientClosed`], and so does every later dispatch.
    /// A client running on a caller-provided runtime leaves it untouched.
    /// Idempotent.
    pub fn close(&self) {
        let runtime = self
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(runtime) = runtime {
            tracing::info!(open_connections = self.open_connections(), "Closing client");
            runtime.shutdown_background();
        }
    }
}

impl Drop for EtcdClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for EtcdClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtcdClient")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EtcdClient`].
pub struct EtcdClientBuilder {
    servers: Vec<(ServerAddress, Tier)>,
    invalid: Vec<String>,
    settings: DispatchSettings,
    backoff_window: Duration,
    executor: Option<Arc<dyn CallbackExecutor>>,
    callback_mode: CallbackMode,
    runtime_handle: Option<Handle>,
    worker_threads: usize,
}

impl Default for EtcdClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EtcdClientBuilder {
    pub fn new() -> Self {
        Self {
            servers: Vec::new(),
            invalid: Vec::new(),
            settings: DispatchSettings::default(),
            backoff_window: DEFAULT_BACKOFF_WINDOW,
            executor: None,
            callback_mode: CallbackMode::Inline,
            runtime_handle: None,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }

    /// Add a server by host and port.
    #[must_use]
    pub fn add_host(mut self, host: impl Into<String>, port: u16, primary: bool) -> Self {
        self.servers.push((ServerAddress::new(host, port), tier(primary)));
        self
    }

    /// Add a server by `http://host:port` URL (or bare `host:port`).
    ///
    /// Unparseable addresses are reported by [`build`](Self::build).
    #[must_use]
    pub fn add_server(mut self, address: &str, primary: bool) -> Self {
        match address.parse::<ServerAddress>() {
            Ok(parsed) => self.servers.push((parsed, tier(primary))),
            Err(e) => self.invalid.push(e.to_string()),
        }
        self
    }

    /// Fail over to the next server after a connect failure (default on).
    #[must_use]
    pub fn retry_on_connect_failure(mut self, retry: bool) -> Self {
        self.settings.retry_on_connect_failure = retry;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.settings.connect_timeout = timeout;
        self
    }

    /// How long a server that failed to connect is skipped.
    #[must_use]
    pub fn backoff_window(mut self, window: Duration) -> Self {
        self.backoff_window = window;
        self
    }

    /// Give up on a response after `timeout`. Unset by default.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.response_timeout = timeout;
        self
    }

    /// Redirect hop limit; `None` follows without bound.
    #[must_use]
    pub fn max_redirects(mut self, limit: Option<u32>) -> Self {
        self.settings.max_redirects = limit;
        self
    }

    #[must_use]
    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.settings.max_response_bytes = limit;
        self
    }

    /// Run completion callbacks on `executor`. Overrides the callback mode.
    #[must_use]
    pub fn callback_executor(mut self, executor: Arc<dyn CallbackExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    #[must_use]
    pub fn callback_mode(mut self, mode: CallbackMode) -> Self {
        self.callback_mode = mode;
        self
    }

    /// Run I/O on an existing runtime instead of an owned one.
    #[must_use]
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.runtime_handle = Some(handle);
        self
    }

    /// Worker threads of the owned runtime.
    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    pub fn build(self) -> Result<EtcdClient> {
        if !self.invalid.is_empty() {
            return Err(EtcdError::InvalidRequest(self.invalid.join(", ")));
        }

        let (runtime, handle) = match self.runtime_handle {
            Some(handle) => (None, handle),
            None => {
                let runtime = RuntimeBuilder::new_multi_thread()
                    .worker_threads(self.worker_threads)
                    .thread_name("etcd-client-io")
                    .enable_all()
                    .build()
                    .map_err(TransportError::io)?;
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };

        let executor = match (self.executor, self.callback_mode) {
            (Some(executor), _) => executor,
            (None, CallbackMode::Inline) => Arc::new(InlineExecutor) as Arc<dyn CallbackExecutor>,
            (None, CallbackMode::BlockingPool) => Arc::new(BlockingPoolExecutor::new(handle.clone())),
        };

        let mut pool = ServerPool::new(self.backoff_window);
        for (address, tier) in self.servers {
            pool.add_server(address, tier);
        }

        tracing::info!(
            servers = pool.len(),
            backoff_ms = u64::try_from(self.backoff_window.as_millis()).unwrap_or(u64::MAX),
            owned_runtime = runtime.is_some(),
            retry_on_connect_failure = self.settings.retry_on_connect_failure,
            "Client built"
        );

        Ok(EtcdClient {
            dispatcher: Dispatcher::new(Arc::new(pool), self.settings, executor, handle),
            runtime: Mutex::new(runtime),
        })
    }
}

fn tier(primary: bool) -> Tier {
    if primary {
        Tier::Primary
    } else {
        Tier::Secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::keys::KeyRequest;

    #[test]
    fn builder_collects_servers_and_settings() {
        let client = EtcdClient::builder()
            .add_host("127.0.0.1", 4001, true)
            .add_server("http://127.0.0.1:4002", false)
            .retry_on_connect_failure(false)
            .connect_timeout(Duration::from_millis(250))
            .backoff_window(Duration::from_secs(5))
            .max_redirects(None)
            .worker_threads(1)
            .build()
            .unwrap();

        let pool = client.dispatcher().pool();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.backoff_window(), Duration::from_secs(5));
        let tiers: Vec<_> = pool.servers().map(|s| s.tier()).collect();
        assert_eq!(tiers, vec![Tier::Primary, Tier::Secondary]);

        let settings = client.dispatcher().settings();
        assert!(!settings.retry_on_connect_failure);
        assert_eq!(settings.connect_timeout, Duration::from_millis(250));
        assert_eq!(settings.max_redirects, None);
        client.close();
    }

    #[test]
    fn unbounded_backoff_window_builds() {
        let client = EtcdClient::builder()
            .add_host("127.0.0.1", 4001, true)
            .backoff_window(Duration::MAX)
            .worker_threads(1)
            .build()
            .unwrap();
        let pool = client.dispatcher().pool();
        assert_eq!(pool.backoff_window(), Duration::MAX);
        assert_eq!(pool.eligible_order().len(), 1);
    }

    #[test]
    fn bad_address_fails_build() {
        let err = EtcdClient::builder()
            .add_server("https://secure:4001", true)
            .build()
            .unwrap_err();
        assert!(matches!(err, EtcdError::InvalidRequest(_)));
    }

    #[test]
    fn empty_pool_resolves_without_io() {
        let client = EtcdClient::builder().worker_threads(1).build().unwrap();
        let err = client.get("anything").send().unwrap_err();
        assert!(matches!(
            err,
            EtcdError::Transport(TransportError::NoEligibleServers)
        ));
        assert_eq!(client.open_connections(), 0);
    }

    #[test]
    fn from_config_validates() {
        assert!(matches!(
            EtcdClient::from_config(&ClientConfig::default()),
            Err(EtcdError::InvalidRequest(_))
        ));

        let config = ClientConfig {
            servers: vec![ServerConfig {
                address: "127.0.0.1:4001".to_string(),
                primary: true,
            }],
            ..Default::default()
        };
        let client = EtcdClient::from_config(&config).unwrap();
        assert_eq!(client.dispatcher().pool().len(), 1);
        assert_eq!(client.dispatcher().settings(), &DispatchSettings::default());
    }

    #[test]
    fn close_is_idempotent_and_later_dispatches_report_closed() {
        let client = EtcdClient::builder()
            .add_host("127.0.0.1", 4001, true)
            .worker_threads(1)
            .build()
            .unwrap();
        client.close();
        client.close();

        let handle = client.get("k").submit();
        let outcome = handle.wait_timeout(Duration::from_secs(5)).expect("resolved after close");
        assert!(matches!(
            outcome,
            Err(EtcdError::Transport(TransportError::ClientClosed))
        ));
    }
}
