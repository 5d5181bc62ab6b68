//! # Shared Signing
//!
//! Request signing, timestamp freshness and replay protection for calls
//! between internal services and the stored-procedure backend.
//!
//! ## Components
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`codec`] | Canonical payload, HMAC sign/verify, body hash |
//! | [`timestamp`] | Freshness window check |
//! | [`replay`] | Replay cache, pluggable store, periodic clearing |
//! | [`pipeline`] | Ordered validation stages and the raw-request adapter |
//! | [`headers`] | Header names and header <-> material mapping |
//! | [`manager`] | Configuration, cleanup lifecycle, introspection |
//!
//! ## Usage
//!
//! ```no_run
//! use shared_signing::{SigningConfigOverrides, SigningManager, ValidationContext};
//!
//! # async fn run() -> Result<(), shared_signing::SigningError> {
//! let manager = SigningManager::new(SigningConfigOverrides::default())?;
//! let secret = "shared-secret-from-deployment-config";
//!
//! let headers = manager.sign_outbound("POST", "/contracts", "{\"a\":1}", secret, None)?;
//! let ctx = ValidationContext::new("POST", "/contracts", "{\"a\":1}", 0).with_headers(headers);
//! let result = manager.validate(&ctx, secret);
//! # let _ = result;
//! # Ok(())
//! # }
//! ```
//!
//! The shared secret is always supplied by the caller; nothing here stores it.

pub mod clock;
pub mod codec;
pub mod config;
pub mod context;
pub mod correlation;
pub mod errors;
pub mod headers;
pub mod manager;
pub mod metrics;
pub mod pipeline;
pub mod replay;
pub mod secret;
pub mod timestamp;

pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use codec::{
    body_hash, build_signable_payload, constant_time_eq, sign, verify, SigningAlgorithm,
    PAYLOAD_SEPARATOR,
};
pub use config::{SigningConfig, SigningConfigOverrides, DEFAULT_TIMESTAMP_TOLERANCE_MS};
pub use context::{
    Headers, SigningMaterial, ValidationContext, ValidationErrorKind, ValidationResult,
};
pub use correlation::{generate_correlation_id, CorrelationId};
pub use errors::{BodyReadError, ConfigError, SigningError};
pub use headers::{
    build_outbound_headers, extract, signature_value, ALGORITHM_HEADER, BODY_HASH_HEADER,
    CORRELATION_ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use manager::{SigningManager, SigningStats};
pub use metrics::{MetricsSnapshot, ValidationMetrics};
pub use pipeline::{
    request_path, verify_body_hash, BufferedRequest, InboundRequest, RequestValidation,
    ValidationPipeline,
};
pub use replay::{replay_key, CleanupTask, InMemoryReplayStore, ReplayError, ReplayGuard, ReplayStore};
pub use secret::{validate_secret_strength, SecretStrength};
pub use timestamp::{check_timestamp, TimestampError};
