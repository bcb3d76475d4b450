//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every
//! section defaults, so a file naming only `[[servers]]` is complete.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cluster::{Tier, DEFAULT_BACKOFF_WINDOW};
use crate::http::{DispatchSettings, DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_REDIRECTS, DEFAULT_MAX_RESPONSE_BYTES};

/// Root configuration for a client.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    /// Cluster members, in any order.
    pub servers: Vec<ServerConfig>,

    /// Failover, redirect and timeout policy.
    pub dispatch: DispatchConfig,

    /// I/O runtime and callback placement.
    pub runtime: RuntimeConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// One cluster member.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    /// `host:port` or `http://host:port`.
    pub address: String,

    /// Primary servers are always tried before secondary ones.
    #[serde(default = "default_primary")]
    pub primary: bool,
}

fn default_primary() -> bool {
    true
}

impl ServerConfig {
    pub fn tier(&self) -> Tier {
        if self.primary {
            Tier::Primary
        } else {
            Tier::Secondary
        }
    }
}

/// Dispatch policy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Fail over to the next server after a connect failure.
    pub retry_on_connect_failure: bool,

    /// Connect timeout per attempt in milliseconds.
    pub connect_timeout_ms: u64,

    /// How long a server that failed to connect is skipped, in milliseconds.
    pub backoff_window_ms: u64,

    /// Response deadline in milliseconds. Absent means wait indefinitely.
    pub response_timeout_ms: Option<u64>,

    /// Redirect hop limit. Absent means unbounded.
    pub max_redirects: Option<u32>,

    /// Largest response body accepted, in bytes.
    pub max_response_bytes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            retry_on_connect_failure: true,
            connect_timeout_ms: millis(DEFAULT_CONNECT_TIMEOUT),
            backoff_window_ms: millis(DEFAULT_BACKOFF_WINDOW),
            response_timeout_ms: None,
            max_redirects: Some(DEFAULT_MAX_REDIRECTS),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl DispatchConfig {
    pub fn backoff_window(&self) -> Duration {
        Duration::from_millis(self.backoff_window_ms)
    }

    /// The dispatcher settings described by this section.
    pub fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            retry_on_connect_failure: self.retry_on_connect_failure,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            response_timeout: self.response_timeout_ms.map(Duration::from_millis),
            max_redirects: self.max_redirects,
            max_response_bytes: self.max_response_bytes,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Where completion callbacks run.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CallbackMode {
    /// On the I/O thread that finished the dispatch.
    #[default]
    Inline,
    /// On the runtime's blocking thread pool.
    BlockingPool,
}

/// Runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// I/O worker threads of the runtime owned by the client.
    pub worker_threads: usize,

    pub callbacks: CallbackMode,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            callbacks: CallbackMode::Inline,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
