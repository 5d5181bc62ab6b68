//! Validation counters.

use crate::context::{ValidationErrorKind, ValidationResult};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ValidationMetrics {
    total: AtomicU64,
    accepted: AtomicU64,
    missing_signature: AtomicU64,
    timestamp_invalid: AtomicU64,
    replay_detected: AtomicU64,
    signature_mismatch: AtomicU64,
    body_hash_mismatch: AtomicU64,
    body_read_error: AtomicU64,
    signature_generation: AtomicU64,
}

impl ValidationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: &ValidationResult) {
        self.total.fetch_add(1, Ordering::Relaxed);
        match result.kind {
            None => self.accepted.fetch_add(1, Ordering::Relaxed),
            Some(kind) => self.counter(kind).fetch_add(1, Ordering::Relaxed),
        };
    }

    fn counter(&self, kind: ValidationErrorKind) -> &AtomicU64 {
        match kind {
            ValidationErrorKind::MissingSignature => &self.missing_signature,
            ValidationErrorKind::TimestampInvalid => &self.timestamp_invalid,
            ValidationErrorKind::ReplayDetected => &self.replay_detected,
            ValidationErrorKind::SignatureMismatch => &self.signature_mismatch,
            ValidationErrorKind::BodyHashMismatch => &self.body_hash_mismatch,
            ValidationErrorKind::BodyReadError => &self.body_read_error,
            ValidationErrorKind::SignatureGeneration => &self.signature_generation,
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let accepted = load(&self.accepted);
        let total = load(&self.total);
        MetricsSnapshot {
            total,
            accepted,
            rejected: total.saturating_sub(accepted),
            missing_signature: load(&self.missing_signature),
            timestamp_invalid: load(&self.timestamp_invalid),
            replay_detected: load(&self.replay_detected),
            signature_mismatch: load(&self.signature_mismatch),
            body_hash_mismatch: load(&self.body_hash_mismatch),
            body_read_error: load(&self.body_read_error),
            signature_generation: load(&self.signature_generation),
        }
    }
}

/// Point-in-time copy of [`ValidationMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub missing_signature: u64,
    pub timestamp_invalid: u64,
    pub replay_detected: u64,
    pub signature_mismatch: u64,
    pub body_hash_mismatch: u64,
    pub body_read_error: u64,
    pub signature_generation: u64,
}
