//! Request dispatch and failover.
//!
//! # Responsibilities
//! - Walk the pool's eligible order, one fresh connection per attempt
//! - Mark servers whose connection attempt failed and fail over
//! - Follow 301/307 redirects against the single target they name
//! - Resolve exactly one completion handle per dispatch, on the
//!   callback executor
//!
//! # Design Decisions
//! - Only connect failures fail over; anything after connect is final
//! - Redirect targets are tried once and never marked in the pool
//! - Idle connections are never kept, so no request shares a socket
//! - The connect timeout bounds the TCP connect; the response timeout
//!   starts once the connection is up

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::HOST;
use axum::http::{HeaderValue, Request};
use futures_util::StreamExt;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::Instrument;

use crate::cluster::{ServerAddress, ServerEntry, ServerPool};
use crate::completion::{CallbackExecutor, CompletionHandle};
use crate::error::{Cause, EtcdError, Result, TransportError};
use crate::http::redirect::{is_redirect, resolve_location};
use crate::http::{RawResponse, RequestDescriptor};
use crate::net::{ConnectionTracker, PendingRequest};
use crate::observability::metrics;

/// Default connect timeout per attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);
/// Default redirect hop limit.
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;
/// Default cap on a collected response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Tunables of the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Try the next eligible server after a connect failure.
    pub retry_on_connect_failure: bool,
    pub connect_timeout: Duration,
    /// Deadline for the response once connected. `None` waits forever.
    pub response_timeout: Option<Duration>,
    /// Redirect hop limit. `None` follows redirects without bound.
    pub max_redirects: Option<u32>,
    pub max_response_bytes: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            retry_on_connect_failure: true,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: None,
            max_redirects: Some(DEFAULT_MAX_REDIRECTS),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// Outcome of a single connection attempt.
enum Attempt {
    /// The connection was never established; the caller may fail over.
    Connect(Cause),
    /// The attempt failed after connecting, or could not start.
    Failed(EtcdError),
}

impl From<TransportError> for Attempt {
    fn from(error: TransportError) -> Self {
        Attempt::Failed(error.into())
    }
}

/// Turns request descriptors into responses against a server pool.
///
/// Cheap to clone; clones share the pool, transport and executor.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    pool: Arc<ServerPool>,
    executor: Arc<dyn CallbackExecutor>,
    runtime: Handle,
    settings: DispatchSettings,
    connections: ConnectionTracker,
}

impl Dispatcher {
    /// Create a dispatcher whose connection tasks run on `runtime`.
    pub fn new(
        pool: Arc<ServerPool>,
        settings: DispatchSettings,
        executor: Arc<dyn CallbackExecutor>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                pool,
                executor,
                runtime,
                settings,
                connections: ConnectionTracker::new(),
            }),
        }
    }

    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.inner.pool
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.inner.settings
    }

    /// Connections currently open towards the cluster.
    pub fn open_connections(&self) -> u64 {
        self.inner.connections.open_count()
    }

    /// Start one logical dispatch and return its completion handle.
    ///
    /// Never blocks. When no server is eligible the handle is resolved with
    /// [`TransportError::NoEligibleServers`] before this returns (subject to
    /// the callback executor).
    pub fn dispatch(&self, request: RequestDescriptor) -> CompletionHandle<RawResponse> {
        let handle = CompletionHandle::new();
        let pending = PendingRequest::new(request, handle.clone(), Arc::clone(&self.inner.executor));

        let candidates = self.inner.pool.eligible_order();
        if candidates.is_empty() {
            tracing::warn!(
                dispatch_id = %pending.id(),
                servers = self.inner.pool.len(),
                "No eligible servers for dispatch"
            );
            pending.complete(Err(TransportError::NoEligibleServers.into()));
            return handle;
        }

        let span = tracing::debug_span!(
            "dispatch",
            dispatch_id = %pending.id(),
            method = %pending.request().method,
            path = %pending.request().path,
        );
        let inner = Arc::clone(&self.inner);
        // If the runtime is already gone the task is dropped and the pending
        // request resolves itself as closed.
        drop(self.inner.runtime.spawn(
            async move {
                let outcome = inner.send(pending.request(), candidates).await;
                pending.complete(outcome);
            }
            .instrument(span),
        ));

        handle
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("servers", &self.inner.pool.len())
            .field("settings", &self.inner.settings)
            .field("open_connections", &self.open_connections())
            .finish_non_exhaustive()
    }
}

impl DispatcherInner {
    /// Try candidates in order until one connects, then follow redirects.
    async fn send(
        &self,
        request: &RequestDescriptor,
        candidates: Vec<Arc<ServerEntry>>,
    ) -> Result<RawResponse> {
        let total = candidates.len();
        let mut candidates = candidates.into_iter().enumerate().peekable();

        while let Some((attempt, server)) = candidates.next() {
            let address = server.address();
            tracing::debug!(server = %address, attempt = attempt + 1, candidates = total, "Connecting");

            match self.exchange(address, request).await {
                Ok(response) => {
                    return self.follow_redirects(address.clone(), request, response).await;
                }
                Err(Attempt::Connect(source)) => {
                    self.pool.mark_failed(&server);
                    metrics::record_connect_failure(address);
                    let error = TransportError::Connect {
                        server: address.clone(),
                        source,
                    };
                    if self.settings.retry_on_connect_failure && candidates.peek().is_some() {
                        tracing::warn!(server = %address, error = %error, "Connect failed, trying next server");
                        continue;
                    }
                    tracing::warn!(server = %address, error = %error, "Connect failed, giving up");
                    return Err(error.into());
                }
                Err(Attempt::Failed(error)) => return Err(error),
            }
        }

        Err(TransportError::NoEligibleServers.into())
    }

    /// Re-issue the request while the response is a redirect.
    ///
    /// Each hop goes to exactly the target named by `Location`; the original
    /// candidate list is not consulted again.
    async fn follow_redirects(
        &self,
        mut connected: ServerAddress,
        request: &RequestDescriptor,
        mut response: RawResponse,
    ) -> Result<RawResponse> {
        let mut redirected: Option<RequestDescriptor> = None;
        let mut hops = 0u32;

        while is_redirect(response.status) {
            if let Some(limit) = self.settings.max_redirects {
                if hops >= limit {
                    tracing::warn!(limit, "Redirect limit reached");
                    return Err(TransportError::TooManyRedirects(limit).into());
                }
            }
            hops += 1;

            let target = resolve_location(&connected, &response.headers)?;
            metrics::record_redirect();
            tracing::info!(
                from = %connected,
                to = %target.server,
                path = %target.path,
                status = %response.status,
                "Following redirect"
            );

            let mut next = redirected.take().unwrap_or_else(|| request.clone());
            next.path = target.path;

            response = match self.exchange(&target.server, &next).await {
                Ok(response) => response,
                Err(Attempt::Connect(source)) => {
                    return Err(TransportError::Connect {
                        server: target.server,
                        source,
                    }
                    .into());
                }
                Err(Attempt::Failed(error)) => return Err(error),
            };
            connected = target.server;
            redirected = Some(next);
        }

        Ok(response)
    }

    /// One connection: connect, write, await and collect one response.
    async fn exchange(
        &self,
        server: &ServerAddress,
        request: &RequestDescriptor,
    ) -> std::result::Result<RawResponse, Attempt> {
        let http_request = build_request(server, request)?;
        let stream = self.connect(server).await?;
        let connection = self.connections.open(server);

        let exchange = async {
            let (mut sender, conn) = http1::handshake(TokioIo::new(stream)).await.map_err(classify)?;
            let connection_id = connection.id();
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Connection ended with error");
                }
            });

            let response = sender.send_request(http_request).await.map_err(classify)?;
            let (parts, body) = response.into_parts();
            let body = collect_body(Body::new(body), self.settings.max_response_bytes).await?;
            Ok::<_, Attempt>(RawResponse {
                status: parts.status,
                headers: parts.headers,
                body,
            })
        };

        let outcome = match self.settings.response_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or(Err(TransportError::ResponseTimeout(limit).into())),
            None => exchange.await,
        };
        drop(connection);
        outcome
    }

    /// Open a TCP connection to `server` within the connect timeout.
    async fn connect(&self, server: &ServerAddress) -> std::result::Result<TcpStream, Attempt> {
        let limit = self.settings.connect_timeout;
        let stream = match tokio::time::timeout(limit, TcpStream::connect((server.host(), server.port()))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(Attempt::Connect(Arc::new(e))),
            Err(_) => {
                let elapsed = io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {}ms", limit.as_millis()),
                );
                return Err(Attempt::Connect(Arc::new(elapsed)));
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(server = %server, error = %e, "Could not disable Nagle");
        }
        Ok(stream)
    }
}

fn build_request(
    server: &ServerAddress,
    request: &RequestDescriptor,
) -> std::result::Result<Request<Body>, Attempt> {
    let host = HeaderValue::from_str(&server.to_string())
        .map_err(|e| Attempt::Failed(EtcdError::InvalidRequest(e.to_string())))?;
    let mut builder = Request::builder()
        .method(request.method.clone())
        .uri(request.path.as_str())
        .header(HOST, host);

    if let Some(headers) = builder.headers_mut() {
        // Host always names the server the request goes to.
        for (name, value) in request.headers.iter().filter(|(name, _)| **name != HOST) {
            headers.append(name.clone(), value.clone());
        }
    }

    builder
        .body(Body::from(request.body.clone()))
        .map_err(|e| Attempt::Failed(EtcdError::InvalidRequest(e.to_string())))
}

async fn collect_body(body: Body, limit: usize) -> std::result::Result<Bytes, Attempt> {
    let mut stream = body.into_data_stream();
    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            if closed_before_response(&e) {
                TransportError::ConnectionClosed
            } else {
                TransportError::io(e)
            }
        })?;
        if collected.len() + chunk.len() > limit {
            return Err(TransportError::ResponseTooLarge { limit }.into());
        }
        collected.extend_from_slice(&chunk);
    }
    Ok(Bytes::from(collected))
}

/// Failures once connected; none of them fail over.
fn classify(error: hyper::Error) -> Attempt {
    if closed_before_response(&error) {
        TransportError::ConnectionClosed.into()
    } else {
        TransportError::io(error).into()
    }
}

/// True when the error chain shows the peer going away mid-exchange.
fn closed_before_response(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if let Some(hyper_error) = e.downcast_ref::<hyper::Error>() {
            if hyper_error.is_incomplete_message() || hyper_error.is_canceled() || hyper_error.is_closed() {
                return true;
            }
        }
        if let Some(io_error) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_error.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ) {
                return true;
            }
        }
        current = e.source();
    }
    false
}
