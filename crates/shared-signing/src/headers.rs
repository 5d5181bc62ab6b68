//! Header names and the mapping between headers and [`SigningMaterial`].

use crate::codec::{self, SigningAlgorithm};
use crate::context::{Headers, SigningMaterial, ValidationContext};
use crate::correlation::generate_correlation_id;
use crate::errors::SigningError;

pub const SIGNATURE_HEADER: &str = "x-internal-signature";
pub const TIMESTAMP_HEADER: &str = "x-internal-timestamp";
pub const ALGORITHM_HEADER: &str = "x-internal-signature-algorithm";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const BODY_HASH_HEADER: &str = "x-internal-body-hash";

/// All headers this crate reads or writes.
pub const SIGNING_HEADERS: [&str; 5] = [
    SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
    ALGORITHM_HEADER,
    CORRELATION_ID_HEADER,
    BODY_HASH_HEADER,
];

/// The usable signature in a raw header value. Blank counts as absent.
pub fn signature_value(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parses signing material from a header set.
///
/// Returns `None` when the signature header is absent or empty; that is a
/// valid state for endpoints that do not require signing.
pub fn extract(headers: &Headers, default_algorithm: SigningAlgorithm) -> Option<SigningMaterial> {
    let signature = signature_value(headers.get(SIGNATURE_HEADER).map(String::as_str))?;

    let algorithm = headers
        .get(ALGORITHM_HEADER)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_algorithm.as_str().to_string());

    Some(SigningMaterial {
        signature: signature.to_string(),
        timestamp: headers.get(TIMESTAMP_HEADER).cloned(),
        correlation_id: headers.get(CORRELATION_ID_HEADER).cloned(),
        algorithm,
        body_hash: headers.get(BODY_HASH_HEADER).cloned(),
    })
}

/// Builds the complete signing header set for an outbound call.
///
/// A correlation id is generated when none is supplied. The body-hash header
/// is attached only for a non-empty body.
pub fn build_outbound_headers(
    method: &str,
    path: &str,
    body: &str,
    secret: &str,
    correlation_id: Option<&str>,
    algorithm: SigningAlgorithm,
    now_ms: u64,
) -> Result<Headers, SigningError> {
    let correlation_id = correlation_id
        .map(str::to_string)
        .unwrap_or_else(generate_correlation_id);

    let mut headers = Headers::new();
    headers.insert(TIMESTAMP_HEADER.to_string(), now_ms.to_string());
    headers.insert(CORRELATION_ID_HEADER.to_string(), correlation_id);
    headers.insert(ALGORITHM_HEADER.to_string(), algorithm.as_str().to_string());

    let ctx = ValidationContext::new(method, path, body, now_ms).with_headers(headers.clone());
    let payload = codec::build_signable_payload(&ctx, true);
    let signature = codec::sign(&payload, secret, algorithm)?;
    headers.insert(SIGNATURE_HEADER.to_string(), signature);

    if !body.is_empty() {
        headers.insert(BODY_HASH_HEADER.to_string(), codec::body_hash(body));
    }

    Ok(headers)
}
