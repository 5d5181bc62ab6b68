//! Signing configuration and partial overrides.

use crate::codec::SigningAlgorithm;
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default freshness window and replay cleanup cadence (5 minutes).
pub const DEFAULT_TIMESTAMP_TOLERANCE_MS: u64 = 300_000;

/// Active signing policy. One instance per process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub algorithm: SigningAlgorithm,
    /// Freshness window; also the replay cache clearing interval.
    pub timestamp_tolerance_ms: u64,
    pub enable_timestamp_validation: bool,
    pub enable_replay_protection: bool,
    /// Allows truncated digest previews in debug logs.
    pub debug_mode: bool,
    /// Reject signed requests that carry no timestamp.
    pub require_timestamp: bool,
    /// Compare the body-hash header, when present, against the received body.
    pub enforce_body_hash: bool,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            algorithm: SigningAlgorithm::Sha256,
            timestamp_tolerance_ms: DEFAULT_TIMESTAMP_TOLERANCE_MS,
            enable_timestamp_validation: true,
            enable_replay_protection: true,
            debug_mode: false,
            require_timestamp: false,
            enforce_body_hash: false,
        }
    }
}

impl SigningConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timestamp_tolerance_ms == 0 {
            if self.enable_timestamp_validation {
                return Err(ConfigError::ZeroTolerance {
                    feature: "timestamp validation",
                });
            }
            // the tolerance doubles as the cleanup cadence
            if self.enable_replay_protection {
                return Err(ConfigError::ZeroTolerance {
                    feature: "replay protection",
                });
            }
        }
        Ok(())
    }

    pub fn tolerance(&self) -> Duration {
        Duration::from_millis(self.timestamp_tolerance_ms)
    }
}

/// Partial configuration merged onto the active one by
/// [`SigningManager::configure`](crate::SigningManager::configure).
///
/// Unknown keys are rejected so a misspelled policy change never
/// deserializes to an empty override. camelCase names are accepted as
/// aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SigningConfigOverrides {
    pub algorithm: Option<SigningAlgorithm>,
    #[serde(alias = "timestampToleranceMs")]
    pub timestamp_tolerance_ms: Option<u64>,
    #[serde(alias = "enableTimestampValidation")]
    pub enable_timestamp_validation: Option<bool>,
    #[serde(alias = "enableReplayProtection")]
    pub enable_replay_protection: Option<bool>,
    #[serde(alias = "debugMode")]
    pub debug_mode: Option<bool>,
    #[serde(alias = "requireTimestamp")]
    pub require_timestamp: Option<bool>,
    #[serde(alias = "enforceBodyHash")]
    pub enforce_body_hash: Option<bool>,
}

impl SigningConfigOverrides {
    /// Returns `base` with every set field replaced.
    pub fn apply_to(&self, base: &SigningConfig) -> SigningConfig {
        SigningConfig {
            algorithm: self.algorithm.unwrap_or(base.algorithm),
            timestamp_tolerance_ms: self
                .timestamp_tolerance_ms
                .unwrap_or(base.timestamp_tolerance_ms),
            enable_timestamp_validation: self
                .enable_timestamp_validation
                .unwrap_or(base.enable_timestamp_validation),
            enable_replay_protection: self
                .enable_replay_protection
                .unwrap_or(base.enable_replay_protection),
            debug_mode: self.debug_mode.unwrap_or(base.debug_mode),
            require_timestamp: self.require_timestamp.unwrap_or(base.require_timestamp),
            enforce_body_hash: self.enforce_body_hash.unwrap_or(base.enforce_body_hash),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Reads overrides from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `SIGNING_ALGORITHM`: `sha256` or `sha512`
    /// - `SIGNING_TIMESTAMP_TOLERANCE_MS`: freshness window in milliseconds
    /// - `SIGNING_ENABLE_TIMESTAMP_VALIDATION`
    /// - `SIGNING_ENABLE_REPLAY_PROTECTION`
    /// - `SIGNING_DEBUG_MODE`
    /// - `SIGNING_REQUIRE_TIMESTAMP`
    /// - `SIGNING_ENFORCE_BODY_HASH`
    ///
    /// Booleans accept `true/false`, `1/0` and `yes/no`. Unset variables leave
    /// the field untouched.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let algorithm = match lookup("SIGNING_ALGORITHM") {
            Some(raw) => Some(raw.parse::<SigningAlgorithm>().map_err(|_| {
                ConfigError::InvalidValue {
                    field: "SIGNING_ALGORITHM",
                    value: raw.clone(),
                }
            })?),
            None => None,
        };

        let timestamp_tolerance_ms = match lookup("SIGNING_TIMESTAMP_TOLERANCE_MS") {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue {
                    field: "SIGNING_TIMESTAMP_TOLERANCE_MS",
                    value: raw.clone(),
                }
            })?),
            None => None,
        };

        Ok(Self {
            algorithm,
            timestamp_tolerance_ms,
            enable_timestamp_validation: lookup_bool(
                &lookup,
                "SIGNING_ENABLE_TIMESTAMP_VALIDATION",
            )?,
            enable_replay_protection: lookup_bool(&lookup, "SIGNING_ENABLE_REPLAY_PROTECTION")?,
            debug_mode: lookup_bool(&lookup, "SIGNING_DEBUG_MODE")?,
            require_timestamp: lookup_bool(&lookup, "SIGNING_REQUIRE_TIMESTAMP")?,
            enforce_body_hash: lookup_bool(&lookup, "SIGNING_ENFORCE_BODY_HASH")?,
        })
    }
}

/// Parses a boolean flag the way the deployment manifests spell them.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn lookup_bool<F>(lookup: &F, field: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(field) {
        Some(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or(ConfigError::InvalidValue { field, value: raw }),
        None => Ok(None),
    }
}
