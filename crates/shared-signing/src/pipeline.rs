//! # Validation Pipeline
//!
//! Linear, short-circuiting checks over one inbound request:
//!
//! ```text
//! Extract -> CheckTimestamp -> CheckReplay -> VerifySignature [-> VerifyBodyHash] -> Valid
//! ```
//!
//! Every expected failure ends in an invalid [`ValidationResult`]; nothing
//! here returns an error to the caller. The replay key recorded by
//! `CheckReplay` is released again when a later stage rejects the call, so the
//! cache only holds calls whose signature matched.

use crate::codec::{self, digest_preview, SigningAlgorithm};
use crate::config::SigningConfig;
use crate::context::{
    Headers, SigningMaterial, ValidationContext, ValidationErrorKind, ValidationResult,
};
use crate::errors::{BodyReadError, SigningError};
use crate::headers::{self, CORRELATION_ID_HEADER};
use crate::replay::ReplayGuard;
use crate::timestamp::check_timestamp;
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

pub const MISSING_SIGNATURE_MESSAGE: &str = "No signature found in request headers";
pub const SIGNATURE_MISMATCH_MESSAGE: &str = "Signature mismatch";
pub const BODY_HASH_MISMATCH_MESSAGE: &str = "Body hash mismatch";

/// Pipeline stage, reported in rejection logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    CheckTimestamp,
    CheckReplay,
    VerifySignature,
    VerifyBodyHash,
    ReadBody,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "extract",
            Stage::CheckTimestamp => "check_timestamp",
            Stage::CheckReplay => "check_replay",
            Stage::VerifySignature => "verify_signature",
            Stage::VerifyBodyHash => "verify_body_hash",
            Stage::ReadBody => "read_body",
        };
        f.write_str(name)
    }
}

/// One validation run bound to a configuration snapshot and a replay guard.
pub struct ValidationPipeline<'a> {
    config: &'a SigningConfig,
    replay: &'a ReplayGuard,
}

impl<'a> ValidationPipeline<'a> {
    pub fn new(config: &'a SigningConfig, replay: &'a ReplayGuard) -> Self {
        Self { config, replay }
    }

    /// Runs every stage against `ctx` using the caller's shared secret.
    pub fn run(&self, ctx: &ValidationContext, secret: &str) -> ValidationResult {
        let Some(material) = headers::extract(&ctx.headers, self.config.algorithm) else {
            return self.reject(
                ctx,
                Stage::Extract,
                ValidationErrorKind::MissingSignature,
                MISSING_SIGNATURE_MESSAGE.to_string(),
                self.config.algorithm.as_str(),
            );
        };
        let algorithm_label = material.algorithm.as_str();

        // Without `require_timestamp` a missing timestamp skips this stage.
        let timestamp_required =
            self.config.require_timestamp && self.config.enable_timestamp_validation;
        if material.timestamp.is_some() || timestamp_required {
            if let Err(e) = check_timestamp(
                material.timestamp.as_deref(),
                ctx.observed_at_ms,
                self.config.timestamp_tolerance_ms,
                self.config.enable_timestamp_validation,
            ) {
                return self.reject(
                    ctx,
                    Stage::CheckTimestamp,
                    ValidationErrorKind::TimestampInvalid,
                    e.to_string(),
                    algorithm_label,
                );
            }
        }

        let replay_key = match self.replay.check_and_record(
            &material,
            ctx,
            self.config.enable_replay_protection,
        ) {
            Ok(key) => key,
            Err(e) => {
                return self.reject(
                    ctx,
                    Stage::CheckReplay,
                    ValidationErrorKind::ReplayDetected,
                    e.to_string(),
                    algorithm_label,
                )
            }
        };

        let failure = self
            .verify_signature(ctx, &material, secret)
            .err()
            .or_else(|| self.verify_body_hash(ctx, &material).err());

        if let Some((stage, kind, error)) = failure {
            if let Some(key) = replay_key.as_deref() {
                self.replay.release(key);
            }
            return self.reject(ctx, stage, kind, error, algorithm_label);
        }

        ValidationResult::valid(algorithm_label, ctx.observed_at_ms)
    }

    fn verify_signature(
        &self,
        ctx: &ValidationContext,
        material: &SigningMaterial,
        secret: &str,
    ) -> Result<(), (Stage, ValidationErrorKind, String)> {
        let generation_failure = |e: SigningError| {
            (
                Stage::VerifySignature,
                ValidationErrorKind::SignatureGeneration,
                e.to_string(),
            )
        };

        let algorithm: SigningAlgorithm = material.algorithm.parse().map_err(generation_failure)?;
        let payload = codec::build_signable_payload(ctx, true);
        let expected = codec::sign(&payload, secret, algorithm).map_err(generation_failure)?;

        if codec::constant_time_eq(&expected, &material.signature) {
            return Ok(());
        }

        if self.config.debug_mode {
            debug!(
                received = %digest_preview(&material.signature),
                expected = %digest_preview(&expected),
                algorithm = %algorithm,
                "Signature digest previews"
            );
        }
        Err((
            Stage::VerifySignature,
            ValidationErrorKind::SignatureMismatch,
            SIGNATURE_MISMATCH_MESSAGE.to_string(),
        ))
    }

    fn verify_body_hash(
        &self,
        ctx: &ValidationContext,
        material: &SigningMaterial,
    ) -> Result<(), (Stage, ValidationErrorKind, String)> {
        if !self.config.enforce_body_hash || verify_body_hash(material, &ctx.body) {
            return Ok(());
        }
        Err((
            Stage::VerifyBodyHash,
            ValidationErrorKind::BodyHashMismatch,
            BODY_HASH_MISMATCH_MESSAGE.to_string(),
        ))
    }

    fn reject(
        &self,
        ctx: &ValidationContext,
        stage: Stage,
        kind: ValidationErrorKind,
        error: String,
        algorithm: &str,
    ) -> ValidationResult {
        warn!(
            stage = %stage,
            kind = %kind,
            method = %ctx.method,
            path = %ctx.path,
            correlation_id = ctx.header(CORRELATION_ID_HEADER).unwrap_or("-"),
            client = ctx.client_identity.as_deref().unwrap_or("-"),
            error = %error,
            "Rejected signed request"
        );
        ValidationResult::invalid(kind, error, algorithm, ctx.observed_at_ms)
    }
}

/// Compares the body-hash header, if any, against `body` in constant time.
///
/// A request without the header passes; the header is only sent for
/// non-empty bodies.
pub fn verify_body_hash(material: &SigningMaterial, body: &str) -> bool {
    match material.body_hash.as_deref() {
        Some(claimed) => codec::constant_time_eq(&codec::body_hash(body), claimed),
        None => true,
    }
}

// =============================================================================
// RAW REQUEST ADAPTER
// =============================================================================

/// A raw inbound request whose body can be read exactly once.
#[async_trait]
pub trait InboundRequest: Send {
    fn method(&self) -> &str;

    /// Full request target; may include scheme, host and query.
    fn url(&self) -> &str;

    fn headers(&self) -> Headers;

    fn client_identity(&self) -> Option<String> {
        None
    }

    /// Reads the body. A second call must fail with
    /// [`BodyReadError::AlreadyConsumed`].
    async fn read_body(&mut self) -> Result<String, BodyReadError>;
}

/// In-memory [`InboundRequest`], mostly for tests and outbound loopback.
#[derive(Debug, Clone)]
pub struct BufferedRequest {
    method: String,
    url: String,
    headers: Headers,
    body: Option<String>,
    client_identity: Option<String>,
}

impl BufferedRequest {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: Headers,
        body: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers,
            body: Some(body.into()),
            client_identity: None,
        }
    }

    pub fn with_client_identity(mut self, identity: impl Into<String>) -> Self {
        self.client_identity = Some(identity.into());
        self
    }
}

#[async_trait]
impl InboundRequest for BufferedRequest {
    fn method(&self) -> &str {
        &self.method
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> Headers {
        self.headers.clone()
    }

    fn client_identity(&self) -> Option<String> {
        self.client_identity.clone()
    }

    async fn read_body(&mut self) -> Result<String, BodyReadError> {
        self.body.take().ok_or(BodyReadError::AlreadyConsumed)
    }
}

/// Outcome of validating a raw request.
///
/// `body` is the text read from the request, handed back so the handler does
/// not need to read the stream a second time. `None` if the read failed.
#[derive(Debug, Clone)]
pub struct RequestValidation {
    pub result: ValidationResult,
    pub body: Option<String>,
}

/// Pathname of a request target: scheme, authority, query and fragment removed.
pub fn request_path(url: &str) -> &str {
    let without_scheme = match url.find("://") {
        Some(i) => {
            let rest = &url[i + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => url,
    };
    let end = without_scheme
        .find(['?', '#'])
        .unwrap_or(without_scheme.len());
    let path = &without_scheme[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
