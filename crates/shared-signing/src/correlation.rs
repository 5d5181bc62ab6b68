//! Correlation ids for outbound signed calls.
//!
//! Ids are UUID v7: unique across concurrent callers and roughly time-ordered,
//! which keeps them readable in logs. Receivers treat the value as opaque.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque token that scopes replay detection and traces one logical call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Milliseconds since the Unix epoch embedded in a v7 id.
    pub fn timestamp_ms(&self) -> Option<u64> {
        let bytes = self.0.as_bytes();
        if (bytes[6] >> 4) != 7 {
            return None;
        }
        Some(bytes[..6].iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Generate a correlation id in its header form.
pub fn generate_correlation_id() -> String {
    CorrelationId::new().to_string()
}
