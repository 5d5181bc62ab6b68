//! Handler error types and their HTTP rendering.
//!
//! Rejection bodies carry the reason, the algorithm and the machine-readable
//! kind. Never the secret, a digest or replay cache contents.

use crate::config::HandlerConfigError;
use crate::gateway::ProcedureError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shared_signing::{BodyReadError, SigningError, ValidationErrorKind, ValidationResult};
use thiserror::Error;

/// JSON error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValidationErrorKind>,
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Signature validation failed.
    #[error("request rejected: {}", .0.error.as_deref().unwrap_or("invalid signature"))]
    Rejected(ValidationResult),

    /// The body could not be read for validation.
    #[error("request rejected: {source}")]
    BodyRead {
        source: BodyReadError,
        result: ValidationResult,
    },

    /// Procedure arguments are not valid JSON.
    #[error("invalid procedure arguments: {0}")]
    InvalidArguments(String),

    /// A signing reconfiguration was refused.
    #[error(transparent)]
    Signing(#[from] SigningError),

    #[error(transparent)]
    Procedure(#[from] ProcedureError),
}

impl HandlerError {
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Rejected(_) => StatusCode::UNAUTHORIZED,
            HandlerError::BodyRead {
                source: BodyReadError::TooLarge { .. },
                ..
            } => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerError::BodyRead { .. } => StatusCode::BAD_REQUEST,
            HandlerError::InvalidArguments(_) => StatusCode::BAD_REQUEST,
            HandlerError::Signing(SigningError::InvalidConfig(_))
            | HandlerError::Signing(SigningError::UnsupportedAlgorithm(_)) => {
                StatusCode::BAD_REQUEST
            }
            HandlerError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HandlerError::Procedure(ProcedureError::UnknownProcedure(_)) => StatusCode::NOT_FOUND,
            HandlerError::Procedure(ProcedureError::Failed(_)) => StatusCode::BAD_GATEWAY,
            HandlerError::Procedure(ProcedureError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            HandlerError::Rejected(result) | HandlerError::BodyRead { result, .. } => ErrorBody {
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "invalid signature".to_string()),
                algorithm: Some(result.algorithm.clone()),
                kind: result.kind,
            },
            other => ErrorBody {
                error: other.to_string(),
                algorithm: None,
                kind: None,
            },
        }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Startup and serving failures of the service binary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] HandlerConfigError),

    #[error("signing setup failed: {0}")]
    Signing(#[from] SigningError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}
