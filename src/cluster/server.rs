//! Server abstraction.
//!
//! # Responsibilities
//! - Represent a single service endpoint (host + port)
//! - Record the time of the last connect failure
//! - Answer whether the endpoint is outside its backoff window

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use url::Url;

/// Sentinel stored while an entry has never failed.
const NEVER_FAILED: u64 = u64::MAX;

/// Errors produced while parsing a server address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid server address '{address}': {source}")]
    Parse {
        address: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme '{0}', only plain http is supported")]
    UnsupportedScheme(String),

    #[error("server address '{0}' has no host")]
    MissingHost(String),
}

/// Host and port of a service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    /// Create an address from a host name (or IP literal) and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Build an address from the authority of an absolute URL.
    pub fn from_url(url: &Url) -> Result<Self, AddressError> {
        if url.scheme() != "http" {
            return Err(AddressError::UnsupportedScheme(url.scheme().to_string()));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AddressError::MissingHost(url.to_string()))?;
        let port = url.port_or_known_default().unwrap_or(80);
        Ok(Self::new(host, port))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `http://host:port/`, the base that relative locations resolve against.
    pub fn base_url(&self) -> Result<Url, AddressError> {
        let raw = format!("http://{}/", self);
        Url::parse(&raw).map_err(|source| AddressError::Parse {
            address: raw,
            source,
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerAddress {
    type Err = AddressError;

    /// Accepts `http://host:port[/]` or a bare `host:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = if s.contains("://") {
            s.to_string()
        } else {
            format!("http://{}", s)
        };
        let url = Url::parse(&raw).map_err(|source| AddressError::Parse {
            address: s.to_string(),
            source,
        })?;
        Self::from_url(&url)
    }
}

/// Preference tier of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Always offered before any secondary server.
    Primary,
    /// Offered only after every eligible primary.
    Secondary,
}

/// A server known to the pool.
///
/// The failure stamp is the only state mutated concurrently. Writers store
/// the current offset from the pool epoch; a racing writer may overwrite
/// another's stamp, which only shifts the backoff window slightly.
#[derive(Debug)]
pub struct ServerEntry {
    address: ServerAddress,
    tier: Tier,
    /// Milliseconds since the pool epoch of the last connect failure.
    last_failure_ms: AtomicU64,
}

impl ServerEntry {
    pub fn new(address: ServerAddress, tier: Tier) -> Self {
        Self {
            address,
            tier,
            last_failure_ms: AtomicU64::new(NEVER_FAILED),
        }
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Offset of the last recorded connect failure, if any.
    pub fn last_failure_ms(&self) -> Option<u64> {
        match self.last_failure_ms.load(Ordering::Relaxed) {
            NEVER_FAILED => None,
            ms => Some(ms),
        }
    }

    /// Stamp a connect failure at `at_ms` (offset from the pool epoch).
    pub(crate) fn record_failure(&self, at_ms: u64) {
        // NEVER_FAILED is reserved.
        let at_ms = at_ms.min(NEVER_FAILED - 1);
        self.last_failure_ms.store(at_ms, Ordering::Relaxed);
    }

    /// True once `backoff_ms` has elapsed since the last failure.
    pub fn is_eligible(&self, now_ms: u64, backoff_ms: u64) -> bool {
        match self.last_failure_ms() {
            None => true,
            Some(failed_at) => now_ms.saturating_sub(failed_at) >= backoff_ms,
        }
    }
}
