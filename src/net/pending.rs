//! Per-dispatch context owned by the in-flight connection task.
//!
//! # Responsibilities
//! - Carry the request descriptor and its completion handle
//! - Hand the outcome to the callback executor exactly once
//! - Resolve the handle if the task is torn down before finishing

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;

use crate::completion::{CallbackExecutor, CompletionHandle};
use crate::error::{EtcdError, Result, TransportError};
use crate::http::{RawResponse, RequestDescriptor};
use crate::observability::metrics;

/// Unique identifier of one logical dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchId(Uuid);

impl DispatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DispatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A request waiting for its response.
///
/// Created at dispatch time and moved into the task that drives the
/// connection, so the task never has to look its handler up. Dropping it
/// unresolved (runtime shutdown, panic) still resolves the handle.
pub struct PendingRequest {
    id: DispatchId,
    request: RequestDescriptor,
    handle: Option<CompletionHandle<RawResponse>>,
    executor: Arc<dyn CallbackExecutor>,
    started: Instant,
}

impl PendingRequest {
    pub fn new(
        request: RequestDescriptor,
        handle: CompletionHandle<RawResponse>,
        executor: Arc<dyn CallbackExecutor>,
    ) -> Self {
        Self {
            id: DispatchId::new(),
            request,
            handle: Some(handle),
            executor,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> DispatchId {
        self.id
    }

    pub fn request(&self) -> &RequestDescriptor {
        &self.request
    }

    /// Resolve the handle with `outcome` on the callback executor.
    pub fn complete(mut self, outcome: Result<RawResponse>) {
        if let Some(handle) = self.handle.take() {
            metrics::record_dispatch(&outcome, self.started);
            match &outcome {
                Ok(response) => tracing::debug!(
                    dispatch_id = %self.id,
                    status = %response.status,
                    "Dispatch completed"
                ),
                Err(e) => tracing::debug!(dispatch_id = %self.id, error = %e, "Dispatch failed"),
            }
            let resolution = Resolution {
                handle: Some(handle),
                outcome: Some(outcome),
            };
            self.executor.execute(Box::new(move || resolution.run()));
        }
    }
}

/// Completion work handed to the executor.
///
/// An executor that discards the task without running it (for instance a
/// blocking pool that has shut down) still resolves the handle, as closed.
struct Resolution {
    handle: Option<CompletionHandle<RawResponse>>,
    outcome: Option<Result<RawResponse>>,
}

impl Resolution {
    fn run(mut self) {
        if let (Some(handle), Some(outcome)) = (self.handle.take(), self.outcome.take()) {
            handle.resolve(outcome);
        }
    }
}

impl Drop for Resolution {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.resolve(Err(TransportError::ClientClosed.into()));
        }
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .finish_non_exhaustive()
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let error = if std::thread::panicking() {
            tracing::error!(dispatch_id = %self.id, "Dispatch task panicked before completing");
            EtcdError::Internal("dispatch task panicked".to_string())
        } else {
            tracing::warn!(dispatch_id = %self.id, "Dispatch abandoned before completing");
            EtcdError::Transport(TransportError::ClientClosed)
        };
        // Resolved inline: the executor may belong to a runtime that is
        // shutting down.
        handle.resolve(Err(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::InlineExecutor;
    use axum::http::Method;

    fn pending(handle: &CompletionHandle<RawResponse>) -> PendingRequest {
        PendingRequest::new(
            RequestDescriptor::new(Method::GET, "/v2/keys/a"),
            handle.clone(),
            Arc::new(InlineExecutor),
        )
    }

    #[test]
    fn complete_resolves_through_executor() {
        let handle = CompletionHandle::new();
        pending(&handle).complete(Err(TransportError::ConnectionClosed.into()));
        assert!(matches!(
            handle.try_outcome(),
            Some(Err(EtcdError::Transport(TransportError::ConnectionClosed)))
        ));
    }

    #[test]
    fn dropping_unresolved_reports_client_closed() {
        let handle = CompletionHandle::new();
        drop(pending(&handle));
        assert!(matches!(
            handle.try_outcome(),
            Some(Err(EtcdError::Transport(TransportError::ClientClosed)))
        ));
    }

    #[test]
    fn discarded_completion_task_reports_client_closed() {
        let handle = CompletionHandle::new();
        let discard: Arc<dyn CallbackExecutor> = Arc::new(|task: crate::completion::Task| drop(task));
        PendingRequest::new(
            RequestDescriptor::new(Method::GET, "/v2/keys/a"),
            handle.clone(),
            discard,
        )
        .complete(Err(TransportError::ConnectionClosed.into()));
        assert!(matches!(
            handle.try_outcome(),
            Some(Err(EtcdError::Transport(TransportError::ClientClosed)))
        ));
    }

    #[test]
    fn ids_are_distinct() {
        let handle = CompletionHandle::new();
        let a = pending(&handle);
        let b = pending(&handle);
        assert_ne!(a.id(), b.id());
        a.complete(Err(TransportError::NoEligibleServers.into()));
        b.complete(Err(TransportError::ConnectionClosed.into()));
        // First resolution wins.
        assert!(matches!(
            handle.try_outcome(),
            Some(Err(EtcdError::Transport(TransportError::NoEligibleServers)))
        ));
    }
}
