//! Freshness check for the timestamp header.
//!
//! Pure function of its inputs; the caller supplies the observation time.

use thiserror::Error;

/// Why a timestamp failed the freshness check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("timestamp required")]
    Missing,

    #[error("invalid timestamp format")]
    InvalidFormat,

    #[error("timestamp outside tolerance: difference {difference_ms}ms exceeds tolerance {tolerance_ms}ms")]
    OutOfTolerance {
        difference_ms: u128,
        tolerance_ms: u64,
    },
}

/// Checks `timestamp` against `now_ms`.
///
/// A difference equal to the tolerance is still valid; one millisecond more is
/// not. Disabled validation accepts anything, including a missing or garbage
/// value.
pub fn check_timestamp(
    timestamp: Option<&str>,
    now_ms: u64,
    tolerance_ms: u64,
    enabled: bool,
) -> Result<(), TimestampError> {
    if !enabled {
        return Ok(());
    }

    let raw = timestamp.ok_or(TimestampError::Missing)?;
    let parsed: i64 = raw
        .trim()
        .parse()
        .map_err(|_| TimestampError::InvalidFormat)?;

    let difference_ms = (i128::from(now_ms) - i128::from(parsed)).unsigned_abs();
    if difference_ms > u128::from(tolerance_ms) {
        return Err(TimestampError::OutOfTolerance {
            difference_ms,
            tolerance_ms,
        });
    }

    Ok(())
}
