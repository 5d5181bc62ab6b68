//! Service configuration from environment variables.

use shared_signing::config::parse_bool;
use shared_signing::{ConfigError, SigningConfigOverrides};
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerConfigError {
    #[error("SIGNING_SHARED_SECRET is not set or empty")]
    MissingSecret,

    #[error("invalid value for {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },

    #[error("port cannot be 0")]
    ZeroPort,

    #[error("max_body_bytes cannot be 0")]
    ZeroBodyLimit,

    #[error(transparent)]
    Signing(#[from] ConfigError),
}

/// Shared secret supplied by the deployment. Redacted in `Debug`.
#[derive(Clone)]
pub struct SharedSecret(Arc<str>);

impl SharedSecret {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_body_bytes: usize,
    /// Reject unsigned procedure calls. Admin routes always require a signature.
    pub require_signature: bool,
    pub shared_secret: SharedSecret,
    pub log_filter: String,
    pub json_logs: bool,
    /// Applied on top of the signing defaults at startup.
    pub signing: SigningConfigOverrides,
}

impl HandlerConfig {
    /// Configuration with defaults and the given secret.
    pub fn with_secret(secret: impl Into<Arc<str>>) -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            require_signature: true,
            shared_secret: SharedSecret::new(secret),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            json_logs: false,
            signing: SigningConfigOverrides::default(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `SIGNED_HANDLER_HOST`: bind address (default: 0.0.0.0)
    /// - `SIGNED_HANDLER_PORT`: bind port (default: 8080)
    /// - `SIGNED_HANDLER_MAX_BODY_BYTES`: request body limit (default: 1 MiB)
    /// - `SIGNED_HANDLER_REQUIRE_SIGNATURE`: reject unsigned calls (default: true)
    /// - `SIGNING_SHARED_SECRET`: shared secret (required)
    /// - `SIGNED_HANDLER_LOG` or `RUST_LOG`: log filter (default: info)
    /// - `SIGNED_HANDLER_JSON_LOGS`: JSON log output (default: false)
    /// - `SIGNING_*`: see [`SigningConfigOverrides::from_env`]
    pub fn from_env() -> Result<Self, HandlerConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, HandlerConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("SIGNING_SHARED_SECRET").ok_or(HandlerConfigError::MissingSecret)?;
        let mut config = Self::with_secret(secret);

        if let Some(raw) = lookup("SIGNED_HANDLER_HOST") {
            config.host = parse_field("SIGNED_HANDLER_HOST", &raw)?;
        }
        if let Some(raw) = lookup("SIGNED_HANDLER_PORT") {
            config.port = parse_field("SIGNED_HANDLER_PORT", &raw)?;
        }
        if let Some(raw) = lookup("SIGNED_HANDLER_MAX_BODY_BYTES") {
            config.max_body_bytes = parse_field("SIGNED_HANDLER_MAX_BODY_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("SIGNED_HANDLER_REQUIRE_SIGNATURE") {
            config.require_signature =
                parse_bool(&raw).ok_or_else(|| HandlerConfigError::InvalidValue {
                    field: "SIGNED_HANDLER_REQUIRE_SIGNATURE",
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = lookup("SIGNED_HANDLER_JSON_LOGS") {
            config.json_logs = parse_bool(&raw).ok_or_else(|| HandlerConfigError::InvalidValue {
                field: "SIGNED_HANDLER_JSON_LOGS",
                value: raw.clone(),
            })?;
        }
        config.log_filter = lookup("SIGNED_HANDLER_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        config.signing = SigningConfigOverrides::from_lookup(&lookup)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), HandlerConfigError> {
        if self.shared_secret.is_empty() {
            return Err(HandlerConfigError::MissingSecret);
        }
        if self.port == 0 {
            return Err(HandlerConfigError::ZeroPort);
        }
        if self.max_body_bytes == 0 {
            return Err(HandlerConfigError::ZeroBodyLimit);
        }
        self.signing
            .apply_to(&Default::default())
            .validate()
            .map_err(HandlerConfigError::from)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_field<T: std::str::FromStr>(
    field: &'static str,
    raw: &str,
) -> Result<T, HandlerConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| HandlerConfigError::InvalidValue {
            field,
            value: raw.to_string(),
        })
}
