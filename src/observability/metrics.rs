//! Client-side metrics.
//!
//! # Metrics
//! - `etcd_client_dispatch_total` (counter): dispatches by `outcome`
//! - `etcd_client_dispatch_duration_seconds` (histogram): dispatch latency
//! - `etcd_client_connect_failures_total` (counter): connect failures by `server`
//! - `etcd_client_redirects_total` (counter): redirect hops followed

use std::time::Instant;

use crate::cluster::ServerAddress;
use crate::error::{EtcdError, Result, TransportError};
use crate::http::RawResponse;

/// Record one finished dispatch.
pub fn record_dispatch(outcome: &Result<RawResponse>, started: Instant) {
    let label = outcome_label(outcome);
    metrics::counter!("etcd_client_dispatch_total", "outcome" => label).increment(1);
    metrics::histogram!("etcd_client_dispatch_duration_seconds", "outcome" => label)
        .record(started.elapsed().as_secs_f64());
}

/// Record a failed connection attempt against `server`.
pub fn record_connect_failure(server: &ServerAddress) {
    metrics::counter!("etcd_client_connect_failures_total", "server" => server.to_string())
        .increment(1);
}

pub fn record_redirect() {
    metrics::counter!("etcd_client_redirects_total").increment(1);
}

fn outcome_label(outcome: &Result<RawResponse>) -> &'static str {
    match outcome {
        Ok(response) if response.status.is_success() => "success",
        Ok(_) => "error_status",
        Err(EtcdError::Transport(TransportError::NoEligibleServers)) => "no_eligible_servers",
        Err(EtcdError::Transport(TransportError::Connect { .. })) => "connect_failed",
        Err(EtcdError::Transport(TransportError::ClientClosed)) => "client_closed",
        Err(EtcdError::Transport(_)) => "transport_error",
        Err(_) => "internal_error",
    }
}
