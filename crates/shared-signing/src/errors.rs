//! # Error Types
//!
//! Raised errors are reserved for infrastructure failures (digest computation,
//! configuration, runtime). Expected rejections are reported through
//! [`ValidationResult`](crate::ValidationResult) instead.

use thiserror::Error;

/// Errors produced while merging or validating a signing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A zero tolerance was configured while a feature that depends on it is on.
    #[error("timestamp_tolerance_ms must be greater than 0 while {feature} is enabled")]
    ZeroTolerance { feature: &'static str },

    /// A configuration value could not be parsed.
    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// Errors raised by signing primitives and the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    /// The requested digest algorithm is not supported.
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key import or digest computation failed.
    #[error("signature generation failed: {0}")]
    SignatureGeneration(String),

    /// The merged configuration violates an invariant.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The replay cleanup task needs a Tokio runtime and none is running.
    #[error("no tokio runtime available to run the replay cleanup task")]
    RuntimeUnavailable,
}

/// Errors from reading an inbound request body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyReadError {
    /// The body stream was already read once.
    #[error("request body has already been consumed")]
    AlreadyConsumed,

    /// The body is not valid UTF-8 text.
    #[error("request body is not valid UTF-8")]
    InvalidUtf8,

    /// The body exceeds the configured limit.
    #[error("request body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    /// The underlying stream failed.
    #[error("failed to read request body: {0}")]
    Io(String),
}
