//! Server pool management.
//!
//! # Responsibilities
//! - Hold the primary and secondary server tiers
//! - Produce a fresh, randomized, backoff-filtered order per dispatch
//! - Stamp servers whose connection attempt failed

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;

use crate::cluster::server::{ServerAddress, ServerEntry, Tier};

/// Default time a failed server is excluded from consideration.
pub const DEFAULT_BACKOFF_WINDOW: Duration = Duration::from_millis(2000);

/// Candidate endpoints partitioned into a primary and a secondary tier.
///
/// Entries are added while the pool is being assembled and never removed.
/// Once shared behind an `Arc` the lists are read-only; only the per-entry
/// failure stamps change.
#[derive(Debug)]
pub struct ServerPool {
    primary: Vec<Arc<ServerEntry>>,
    secondary: Vec<Arc<ServerEntry>>,
    backoff_window: Duration,
    /// Reference point for failure stamps.
    epoch: Instant,
}

impl ServerPool {
    /// Create an empty pool with the given backoff window.
    pub fn new(backoff_window: Duration) -> Self {
        Self {
            primary: Vec::new(),
            secondary: Vec::new(),
            backoff_window,
            epoch: Instant::now(),
        }
    }

    /// Append a server to the given tier.
    pub fn add_server(&mut self, address: ServerAddress, tier: Tier) -> &mut Self {
        let entry = Arc::new(ServerEntry::new(address, tier));
        match tier {
            Tier::Primary => self.primary.push(entry),
            Tier::Secondary => self.secondary.push(entry),
        }
        self
    }

    pub fn backoff_window(&self) -> Duration {
        self.backoff_window
    }

    /// Total number of known servers, eligible or not.
    pub fn len(&self) -> usize {
        self.primary.len() + self.secondary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every known server, primaries first, in insertion order.
    pub fn servers(&self) -> impl Iterator<Item = &Arc<ServerEntry>> {
        self.primary.iter().chain(self.secondary.iter())
    }

    /// The servers to try for one dispatch, as of now.
    pub fn eligible_order(&self) -> Vec<Arc<ServerEntry>> {
        self.eligible_order_at(Instant::now())
    }

    /// The servers to try for one dispatch, as of `now`.
    ///
    /// Servers still inside their backoff window are skipped. Each tier is
    /// shuffled independently and every eligible primary precedes every
    /// eligible secondary.
    pub fn eligible_order_at(&self, now: Instant) -> Vec<Arc<ServerEntry>> {
        let now_ms = self.offset_ms(now);
        let backoff_ms = self.backoff_ms();
        let mut rng = rand::thread_rng();

        let mut primary = Self::eligible(&self.primary, now_ms, backoff_ms);
        primary.shuffle(&mut rng);
        let mut secondary = Self::eligible(&self.secondary, now_ms, backoff_ms);
        secondary.shuffle(&mut rng);

        primary.extend(secondary);
        primary
    }

    /// Record a connect failure against `entry` at the current time.
    pub fn mark_failed(&self, entry: &ServerEntry) {
        self.mark_failed_at(entry, Instant::now());
    }

    /// Record a connect failure against `entry` at `at`.
    pub fn mark_failed_at(&self, entry: &ServerEntry, at: Instant) {
        let at_ms = self.offset_ms(at);
        entry.record_failure(at_ms);
        tracing::debug!(
            server = %entry.address(),
            backoff_ms = self.backoff_ms(),
            "Server excluded until backoff window elapses"
        );
    }

    fn eligible(tier: &[Arc<ServerEntry>], now_ms: u64, backoff_ms: u64) -> Vec<Arc<ServerEntry>> {
        tier.iter()
            .filter(|entry| entry.is_eligible(now_ms, backoff_ms))
            .cloned()
            .collect()
    }

    fn offset_ms(&self, at: Instant) -> u64 {
        u64::try_from(at.saturating_duration_since(self.epoch).as_millis()).unwrap_or(u64::MAX)
    }

    fn backoff_ms(&self) -> u64 {
        u64::try_from(self.backoff_window.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for ServerPool {
    fn default() -> Self {
        Self::new(DEFAULT_BACKOFF_WINDOW)
    }
}
