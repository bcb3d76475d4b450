//! Redirect resolution.
//!
//! # Responsibilities
//! - Recognise redirect statuses (301, 307)
//! - Derive the next target server and path from `Location`
//!
//! # Design Decisions
//! - Absolute locations switch server; relative ones keep the connected one
//! - The query string is preserved

use axum::http::header::LOCATION;
use axum::http::{HeaderMap, StatusCode};

use crate::cluster::ServerAddress;
use crate::error::TransportError;

/// Where a redirected request goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub server: ServerAddress,
    /// Origin-form path with query.
    pub path: String,
}

/// True for the statuses the dispatcher follows.
pub fn is_redirect(status: StatusCode) -> bool {
    status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::TEMPORARY_REDIRECT
}

/// Resolve the `Location` header of a redirect received from `connected`.
pub fn resolve_location(
    connected: &ServerAddress,
    headers: &HeaderMap,
) -> Result<RedirectTarget, TransportError> {
    let location = headers
        .get(LOCATION)
        .ok_or_else(|| TransportError::InvalidRedirect("missing Location header".to_string()))?
        .to_str()
        .map_err(|_| TransportError::InvalidRedirect("Location header is not valid text".to_string()))?;

    let base = connected
        .base_url()
        .map_err(|e| TransportError::InvalidRedirect(e.to_string()))?;
    let resolved = base
        .join(location)
        .map_err(|e| TransportError::InvalidRedirect(format!("'{}': {}", location, e)))?;
    let server = ServerAddress::from_url(&resolved)
        .map_err(|e| TransportError::InvalidRedirect(format!("'{}': {}", location, e)))?;

    let path = match resolved.query() {
        Some(query) => format!("{}?{}", resolved.path(), query),
        None => resolved.path().to_string(),
    };

    Ok(RedirectTarget { server, path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn location(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn redirect_statuses() {
        assert!(is_redirect(StatusCode::MOVED_PERMANENTLY));
        assert!(is_redirect(StatusCode::TEMPORARY_REDIRECT));
        assert!(!is_redirect(StatusCode::FOUND));
        assert!(!is_redirect(StatusCode::OK));
    }

    #[test]
    fn relative_location_keeps_connected_server() {
        let connected = ServerAddress::new("10.0.0.1", 4001);
        let target = resolve_location(&connected, &location("/v2/keys/foo")).unwrap();
        assert_eq!(target.server, connected);
        assert_eq!(target.path, "/v2/keys/foo");
    }

    #[test]
    fn absolute_location_switches_server() {
        let connected = ServerAddress::new("10.0.0.1", 4001);
        let target = resolve_location(
            &connected,
            &location("http://10.0.0.3:4002/v2/keys/foo?recursive=true"),
        )
        .unwrap();
        assert_eq!(target.server, ServerAddress::new("10.0.0.3", 4002));
        assert_eq!(target.path, "/v2/keys/foo?recursive=true");
    }

    #[test]
    fn absolute_location_without_port_uses_http_default() {
        let connected = ServerAddress::new("a", 1);
        let target = resolve_location(&connected, &location("http://leader/v2/keys/x")).unwrap();
        assert_eq!(target.server, ServerAddress::new("leader", 80));
    }

    #[test]
    fn missing_or_tls_location_is_rejected() {
        let connected = ServerAddress::new("a", 1);
        assert!(matches!(
            resolve_location(&connected, &HeaderMap::new()),
            Err(TransportError::InvalidRedirect(_))
        ));
        assert!(matches!(
            resolve_location(&connected, &location("https://b:2/v2/keys")),
            Err(TransportError::InvalidRedirect(_))
        ));
    }
}
