//! Per-request data model: the material parsed from headers, the context a
//! verdict is computed over, and the verdict itself.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Header name to header value. Names are matched exactly.
pub type Headers = BTreeMap<String, String>;

/// Signing metadata extracted from one inbound request.
///
/// Never persisted beyond the validation call that parsed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningMaterial {
    /// Hex-encoded keyed digest of the canonical payload.
    pub signature: String,
    /// Epoch milliseconds as sent by the caller.
    pub timestamp: Option<String>,
    pub correlation_id: Option<String>,
    /// Algorithm name; the active configuration's algorithm when absent.
    pub algorithm: String,
    /// Hex-encoded unkeyed digest of the raw body.
    pub body_hash: Option<String>,
}

/// Everything a verdict is computed over.
///
/// `body` must be the exact text that was transmitted; any re-encoding
/// invalidates the signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    pub method: String,
    /// Pathname only: no scheme, host or query.
    pub path: String,
    pub headers: Headers,
    pub body: String,
    /// Observation time in epoch milliseconds.
    pub observed_at_ms: u64,
    pub client_identity: Option<String>,
}

impl ValidationContext {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        body: impl Into<String>,
        observed_at_ms: u64,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            headers: Headers::new(),
            body: body.into(),
            observed_at_ms,
            client_identity: None,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_client_identity(mut self, identity: Option<String>) -> Self {
        self.client_identity = identity;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Why a validation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    MissingSignature,
    TimestampInvalid,
    ReplayDetected,
    SignatureMismatch,
    BodyHashMismatch,
    BodyReadError,
    /// Digest computation failed (e.g. unsupported algorithm). Infrastructure
    /// failure rather than a forged request.
    SignatureGeneration,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingSignature => "missing_signature",
            Self::TimestampInvalid => "timestamp_invalid",
            Self::ReplayDetected => "replay_detected",
            Self::SignatureMismatch => "signature_mismatch",
            Self::BodyHashMismatch => "body_hash_mismatch",
            Self::BodyReadError => "body_read_error",
            Self::SignatureGeneration => "signature_generation",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The verdict handed back to the calling handler.
///
/// `error` and `kind` are populated iff `is_valid` is false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ValidationErrorKind>,
    pub algorithm: String,
    pub observed_at_ms: u64,
}

impl ValidationResult {
    pub fn valid(algorithm: impl Into<String>, observed_at_ms: u64) -> Self {
        Self {
            is_valid: true,
            error: None,
            kind: None,
            algorithm: algorithm.into(),
            observed_at_ms,
        }
    }

    pub fn invalid(
        kind: ValidationErrorKind,
        error: impl Into<String>,
        algorithm: impl Into<String>,
        observed_at_ms: u64,
    ) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            kind: Some(kind),
            algorithm: algorithm.into(),
            observed_at_ms,
        }
    }
}
