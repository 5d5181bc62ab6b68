//! Signature validation middleware.
//!
//! Reads the body once, runs the validation pipeline and either rejects the
//! request or forwards it with the verified body re-attached and a
//! [`VerifiedCall`] extension.

use crate::config::SharedSecret;
use crate::error::HandlerError;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{request::Parts, Request},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use shared_signing::{
    signature_value, BodyReadError, Headers, InboundRequest, SigningManager, ValidationErrorKind,
    SIGNATURE_HEADER,
};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

/// Facts about an accepted signed call, available to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCall {
    pub algorithm: String,
    pub correlation_id: Option<String>,
    pub observed_at_ms: u64,
}

#[derive(Debug)]
struct SignatureState {
    manager: Arc<SigningManager>,
    secret: SharedSecret,
    max_body_bytes: usize,
    require_signature: bool,
}

/// Signature validation layer
#[derive(Debug, Clone)]
pub struct SignatureLayer {
    state: Arc<SignatureState>,
}

impl SignatureLayer {
    /// `require_signature = false` lets requests without a signature header
    /// through untouched. Signed requests are always validated.
    pub fn new(
        manager: Arc<SigningManager>,
        secret: SharedSecret,
        max_body_bytes: usize,
        require_signature: bool,
    ) -> Self {
        Self {
            state: Arc::new(SignatureState {
                manager,
                secret,
                max_body_bytes,
                require_signature,
            }),
        }
    }
}

impl<S> Layer<S> for SignatureLayer {
    type Service = SignatureService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SignatureService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// Signature validation service
#[derive(Debug, Clone)]
pub struct SignatureService<S> {
    inner: S,
    state: Arc<SignatureState>,
}

impl<S> Service<Request<Body>> for SignatureService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let unsigned = signature_value(
                req.headers()
                    .get(SIGNATURE_HEADER)
                    .and_then(|v| v.to_str().ok()),
            )
            .is_none();
            if !state.require_signature && unsigned {
                debug!(path = %req.uri().path(), "Unsigned request passed through");
                return inner.call(req).await;
            }

            let mut inbound = AxumInbound::new(req, state.max_body_bytes);
            let outcome = state
                .manager
                .validate_request(&mut inbound, state.secret.expose())
                .await;

            if !outcome.result.is_valid {
                let error = match inbound.take_read_error() {
                    Some(source) if outcome.result.kind == Some(ValidationErrorKind::BodyReadError) => {
                        HandlerError::BodyRead {
                            source,
                            result: outcome.result,
                        }
                    }
                    _ => HandlerError::Rejected(outcome.result),
                };
                return Ok(error.into_response());
            }

            let verified = VerifiedCall {
                algorithm: outcome.result.algorithm,
                correlation_id: inbound.correlation_id(),
                observed_at_ms: outcome.result.observed_at_ms,
            };
            let mut req = inbound.into_request(outcome.body.unwrap_or_default());
            req.extensions_mut().insert(verified);
            inner.call(req).await
        })
    }
}

/// An axum request seen through [`InboundRequest`].
///
/// The body stream is read at most once, bounded by the size limit.
#[derive(Debug)]
pub struct AxumInbound {
    parts: Parts,
    url: String,
    headers: Headers,
    body: Option<Body>,
    limit: usize,
    read_error: Option<BodyReadError>,
}

impl AxumInbound {
    pub fn new(req: Request<Body>, limit: usize) -> Self {
        let (parts, body) = req.into_parts();
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        Self {
            url: parts.uri.to_string(),
            parts,
            headers,
            body: Some(body),
            limit,
            read_error: None,
        }
    }

    pub fn correlation_id(&self) -> Option<String> {
        self.headers
            .get(shared_signing::CORRELATION_ID_HEADER)
            .cloned()
    }

    /// The error from the last failed body read, if any.
    pub fn take_read_error(&mut self) -> Option<BodyReadError> {
        self.read_error.take()
    }

    /// Rebuilds the request around the already-read body text.
    pub fn into_request(self, body: String) -> Request<Body> {
        Request::from_parts(self.parts, Body::from(body))
    }

    async fn read_limited(&mut self) -> Result<String, BodyReadError> {
        let body = self.body.take().ok_or(BodyReadError::AlreadyConsumed)?;

        let limit = self.limit;
        let bytes = axum::body::to_bytes(body, limit)
            .await
            .map_err(|e| match e.into_inner() {
                inner if inner.is::<LengthLimitError>() => BodyReadError::TooLarge { limit },
                inner => BodyReadError::Io(inner.to_string()),
            })?;

        String::from_utf8(bytes.to_vec()).map_err(|_| BodyReadError::InvalidUtf8)
    }
}

#[async_trait]
impl InboundRequest for AxumInbound {
    fn method(&self) -> &str {
        self.parts.method.as_str()
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    async fn read_body(&mut self) -> Result<String, BodyReadError> {
        let result = self.read_limited().await;
        if let Err(e) = &result {
            self.read_error = Some(e.clone());
        }
        result
    }
}
