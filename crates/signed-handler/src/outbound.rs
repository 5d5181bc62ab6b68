//! Signing helpers for calls this service makes to other internal handlers.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request};
use shared_signing::{request_path, Headers, SigningError, SigningManager};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutboundError {
    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Converts a signing header set into an HTTP header map.
pub fn to_header_map(headers: &Headers) -> Result<HeaderMap, OutboundError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| OutboundError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| OutboundError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

/// Builds a fully signed request for `path` carrying `body`.
///
/// Only the pathname of `path` is signed; a query string is sent but not
/// covered.
pub fn signed_request(
    manager: &SigningManager,
    secret: &str,
    method: &str,
    path: &str,
    body: &str,
    correlation_id: Option<&str>,
) -> Result<Request<Body>, OutboundError> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| OutboundError::InvalidRequest(e.to_string()))?;
    let headers = manager.sign_outbound(
        method.as_str(),
        request_path(path),
        body,
        secret,
        correlation_id,
    )?;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::from(body.to_string()))
        .map_err(|e| OutboundError::InvalidRequest(e.to_string()))?;
    request.headers_mut().extend(to_header_map(&headers)?);
    Ok(request)
}
