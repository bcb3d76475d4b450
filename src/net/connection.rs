//! Upstream connection lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count connections currently open towards the cluster
//! - Log open/close of every established connection

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cluster::ServerAddress;

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough, only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counts connections that are open towards the cluster.
///
/// Every exchange takes a [`ConnectionGuard`] once its TCP connection is
/// established and drops it when the response body is collected or the
/// exchange fails. Connect attempts in flight are not counted.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    open: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection to `server`. The guard decrements on drop.
    pub fn open(&self, server: &ServerAddress) -> ConnectionGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        let id = ConnectionId::new();
        tracing::trace!(connection_id = %id, server = %server, "Connection opened");
        ConnectionGuard {
            open: Arc::clone(&self.open),
            id,
        }
    }

    /// Number of connections currently open.
    pub fn open_count(&self) -> u64 {
        self.open.load(Ordering::SeqCst)
    }
}

/// Guard that tracks one connection's lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
        assert!(id1.to_string().starts_with("conn-"));
    }

    #[test]
    fn tracker_counts_open_connections() {
        let tracker = ConnectionTracker::new();
        let server = ServerAddress::new("127.0.0.1", 2379);
        assert_eq!(tracker.open_count(), 0);

        let guard1 = tracker.open(&server);
        let guard2 = tracker.clone().open(&server);
        assert_eq!(tracker.open_count(), 2);
        assert_ne!(guard1.id(), guard2.id());

        drop(guard1);
        assert_eq!(tracker.open_count(), 1);
        drop(guard2);
        assert_eq!(tracker.open_count(), 0);
    }
}
