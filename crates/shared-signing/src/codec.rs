//! # Signature Codec
//!
//! Canonical payload construction and HMAC signing/verification.
//!
//! ## Canonical payload
//!
//! ```text
//! method | path | body [ | timestamp ] [ | correlation-id ]
//! ```
//!
//! The order and the `|` separator are part of the wire contract: signer and
//! verifier must agree byte for byte or every signature mismatches.

use crate::context::ValidationContext;
use crate::errors::SigningError;
use crate::headers::{CORRELATION_ID_HEADER, TIMESTAMP_HEADER};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::str::FromStr;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Separator between canonical payload fields.
pub const PAYLOAD_SEPARATOR: char = '|';

/// Supported keyed digest algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl SigningAlgorithm {
    pub const ALL: [SigningAlgorithm; 2] = [SigningAlgorithm::Sha256, SigningAlgorithm::Sha512];

    /// Wire name, as carried in the algorithm header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    pub fn supported_names() -> Vec<&'static str> {
        Self::ALL.iter().map(SigningAlgorithm::as_str).collect()
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = SigningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            _ => Err(SigningError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// Builds the canonical signable string for a request.
///
/// The timestamp header value is appended only when `include_timestamp` is set
/// and the header is present; the correlation-id header value whenever present.
pub fn build_signable_payload(ctx: &ValidationContext, include_timestamp: bool) -> String {
    let mut payload =
        String::with_capacity(ctx.method.len() + ctx.path.len() + ctx.body.len() + 64);
    payload.push_str(&ctx.method);
    payload.push(PAYLOAD_SEPARATOR);
    payload.push_str(&ctx.path);
    payload.push(PAYLOAD_SEPARATOR);
    payload.push_str(&ctx.body);

    if include_timestamp {
        if let Some(timestamp) = ctx.header(TIMESTAMP_HEADER) {
            payload.push(PAYLOAD_SEPARATOR);
            payload.push_str(timestamp);
        }
    }

    if let Some(correlation_id) = ctx.header(CORRELATION_ID_HEADER) {
        payload.push(PAYLOAD_SEPARATOR);
        payload.push_str(correlation_id);
    }

    payload
}

/// Computes the lowercase hex HMAC of `payload` under `secret`.
pub fn sign(payload: &str, secret: &str, algorithm: SigningAlgorithm) -> Result<String, SigningError> {
    let digest = match algorithm {
        SigningAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .map_err(|e| SigningError::SignatureGeneration(e.to_string()))?;
            mac.update(payload.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
        SigningAlgorithm::Sha512 => {
            let mut mac = HmacSha512::new_from_slice(secret.as_bytes())
                .map_err(|e| SigningError::SignatureGeneration(e.to_string()))?;
            mac.update(payload.as_bytes());
            mac.finalize().into_bytes().to_vec()
        }
    };
    Ok(hex::encode(digest))
}

/// Recomputes the digest and compares it to `candidate` in constant time.
///
/// The comparison is exact: an upper-case rendering of a valid digest does not
/// verify, so one accepted call cannot be replayed under a second spelling.
pub fn verify(
    payload: &str,
    secret: &str,
    algorithm: SigningAlgorithm,
    candidate: &str,
) -> Result<bool, SigningError> {
    let expected = sign(payload, secret, algorithm)?;
    Ok(constant_time_eq(&expected, candidate))
}

/// Unkeyed SHA-256 of the raw body, lowercase hex.
pub fn body_hash(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Constant-time string comparison.
///
/// Both inputs are padded to the longer length with different filler bytes and
/// the length check is folded in, so neither content nor length leaks through
/// timing.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = a.len().max(b.len());
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}

/// First characters of a digest for debug logs. Never the full value.
pub(crate) fn digest_preview(digest: &str) -> String {
    const PREVIEW_CHARS: usize = 8;
    let preview: String = digest.chars().take(PREVIEW_CHARS).collect();
    format!("{preview}...")
}
