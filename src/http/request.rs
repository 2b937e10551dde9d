//! Request metadata extraction.
//!
//! # Responsibilities
//! - Read the request ID set by the request-id layer
//! - Resolve the peer address used as the rate-limit client key
//! - Read optional string headers (session id, user agent)

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderMap};

/// Correlation header set on every request and echoed on every response.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Optional caller-supplied session identifier.
pub const X_SESSION_ID: &str = "x-session-id";

/// Value of the request ID header, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> String {
    header_value(headers, X_REQUEST_ID)
        .unwrap_or("unknown")
        .to_string()
}

/// A header as UTF-8 text, if present and valid.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Peer IP recorded by `into_make_service_with_connect_info`.
pub fn client_addr(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
