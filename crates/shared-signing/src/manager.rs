//! # Signing Manager
//!
//! Owns the active [`SigningConfig`], the process-wide replay cache and the
//! single cleanup task that clears it.
//!
//! ## Lifecycle
//!
//! - Replay protection on and no task running: a task is started.
//! - Replay protection off and a task running: it is stopped.
//! - Tolerance changed while on: the task is replaced with one on the new
//!   cadence.
//!
//! At most one task is alive per manager. `cleanup_generation` counts starts.

use crate::clock::{Clock, SystemClock};
use crate::codec::SigningAlgorithm;
use crate::config::{SigningConfig, SigningConfigOverrides};
use crate::context::{Headers, ValidationContext, ValidationErrorKind, ValidationResult};
use crate::errors::SigningError;
use crate::headers::build_outbound_headers;
use crate::metrics::{MetricsSnapshot, ValidationMetrics};
use crate::pipeline::{request_path, InboundRequest, RequestValidation, Stage, ValidationPipeline};
use crate::replay::{CleanupTask, InMemoryReplayStore, ReplayGuard, ReplayStore};
use crate::secret::{self, SecretStrength};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Read-only introspection. Never contains the secret.
#[derive(Debug, Clone, Serialize)]
pub struct SigningStats {
    pub replay_cache_size: usize,
    pub config: SigningConfig,
    pub supported_algorithms: Vec<String>,
    pub cleanup_running: bool,
    pub cleanup_generation: u64,
    pub last_cleared_ms: u64,
    pub validations: MetricsSnapshot,
}

#[derive(Debug)]
pub struct SigningManager {
    config: RwLock<SigningConfig>,
    replay: Arc<ReplayGuard>,
    clock: Arc<dyn Clock>,
    cleanup: Mutex<Option<CleanupTask>>,
    cleanup_generation: AtomicU64,
    metrics: ValidationMetrics,
}

impl SigningManager {
    /// Creates a manager on the system clock with an in-memory replay store.
    ///
    /// Must be called inside a Tokio runtime when replay protection ends up
    /// enabled, since that starts the cleanup task.
    pub fn new(overrides: SigningConfigOverrides) -> Result<Self, SigningError> {
        Self::with_parts(
            overrides,
            Arc::new(SystemClock),
            Arc::new(InMemoryReplayStore::new()),
        )
    }

    pub fn with_parts(
        overrides: SigningConfigOverrides,
        clock: Arc<dyn Clock>,
        store: Arc<dyn ReplayStore>,
    ) -> Result<Self, SigningError> {
        let config = overrides.apply_to(&SigningConfig::default());
        config.validate()?;

        let manager = Self {
            config: RwLock::new(config.clone()),
            replay: Arc::new(ReplayGuard::new(store, clock.clone())),
            clock,
            cleanup: Mutex::new(None),
            cleanup_generation: AtomicU64::new(0),
            metrics: ValidationMetrics::new(),
        };
        manager.sync_cleanup(&config)?;
        Ok(manager)
    }

    /// Merges `overrides` onto the active configuration.
    ///
    /// An invalid merge, or a cleanup task that cannot be started, leaves the
    /// previous configuration active.
    pub fn configure(
        &self,
        overrides: SigningConfigOverrides,
    ) -> Result<SigningConfig, SigningError> {
        let mut config = self.config.write();
        let merged = overrides.apply_to(&config);
        merged.validate()?;
        self.sync_cleanup(&merged)?;
        *config = merged.clone();

        info!(
            algorithm = %merged.algorithm,
            tolerance_ms = merged.timestamp_tolerance_ms,
            timestamp_validation = merged.enable_timestamp_validation,
            replay_protection = merged.enable_replay_protection,
            debug_mode = merged.debug_mode,
            "Signing configuration updated"
        );
        Ok(merged)
    }

    fn sync_cleanup(&self, config: &SigningConfig) -> Result<(), SigningError> {
        let mut cleanup = self.cleanup.lock();
        let running_interval = cleanup.as_ref().map(CleanupTask::interval);

        match (config.enable_replay_protection, running_interval) {
            (true, Some(interval)) if interval == config.tolerance() => {}
            (true, _) => {
                let task = CleanupTask::spawn(self.replay.clone(), config.tolerance())?;
                if let Some(previous) = cleanup.replace(task) {
                    previous.stop();
                }
                self.cleanup_generation.fetch_add(1, Ordering::SeqCst);
            }
            (false, Some(_)) => {
                if let Some(previous) = cleanup.take() {
                    previous.stop();
                }
            }
            (false, None) => {}
        }
        Ok(())
    }

    /// Snapshot of the active configuration.
    pub fn config(&self) -> SigningConfig {
        self.config.read().clone()
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.config.read().algorithm
    }

    /// Runs the validation pipeline over a prepared context.
    pub fn validate(&self, ctx: &ValidationContext, secret: &str) -> ValidationResult {
        let config = self.config();
        let result = ValidationPipeline::new(&config, &self.replay).run(ctx, secret);
        self.metrics.record(&result);
        result
    }

    /// Reads the body of `request` once, builds the context and validates it.
    ///
    /// The body text is handed back in the outcome so the caller never reads
    /// the stream a second time.
    pub async fn validate_request<R>(&self, request: &mut R, secret: &str) -> RequestValidation
    where
        R: InboundRequest + ?Sized,
    {
        let observed_at_ms = self.clock.now_ms();
        let method = request.method().to_string();
        let path = request_path(request.url()).to_string();
        let headers = request.headers();
        let client_identity = request.client_identity();

        match request.read_body().await {
            Ok(body) => {
                let ctx = ValidationContext {
                    method,
                    path,
                    headers,
                    body,
                    observed_at_ms,
                    client_identity,
                };
                let result = self.validate(&ctx, secret);
                RequestValidation {
                    result,
                    body: Some(ctx.body),
                }
            }
            Err(e) => {
                warn!(
                    stage = %Stage::ReadBody,
                    kind = %ValidationErrorKind::BodyReadError,
                    method = %method,
                    path = %path,
                    error = %e,
                    "Rejected signed request"
                );
                let result = ValidationResult::invalid(
                    ValidationErrorKind::BodyReadError,
                    e.to_string(),
                    self.algorithm().as_str(),
                    observed_at_ms,
                );
                self.metrics.record(&result);
                RequestValidation { result, body: None }
            }
        }
    }

    /// Signing headers for an outbound call, using the active algorithm and
    /// the manager's clock.
    pub fn sign_outbound(
        &self,
        method: &str,
        path: &str,
        body: &str,
        secret: &str,
        correlation_id: Option<&str>,
    ) -> Result<Headers, SigningError> {
        build_outbound_headers(
            method,
            path,
            body,
            secret,
            correlation_id,
            self.algorithm(),
            self.clock.now_ms(),
        )
    }

    /// Administrative wipe of the replay cache. Returns the evicted count.
    pub fn clear_replay_cache(&self) -> usize {
        let evicted = self.replay.clear();
        info!(evicted, "Replay cache cleared on request");
        evicted
    }

    pub fn stats(&self) -> SigningStats {
        SigningStats {
            replay_cache_size: self.replay.len(),
            config: self.config(),
            supported_algorithms: SigningAlgorithm::supported_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
            cleanup_running: self.is_cleanup_running(),
            cleanup_generation: self.cleanup_generation(),
            last_cleared_ms: self.replay.last_cleared_ms(),
            validations: self.metrics.snapshot(),
        }
    }

    /// Advisory only; see [`secret::validate_secret_strength`].
    pub fn validate_secret_strength(secret: &str) -> SecretStrength {
        secret::validate_secret_strength(secret)
    }

    /// How many cleanup tasks have been started over this manager's life.
    pub fn cleanup_generation(&self) -> u64 {
        self.cleanup_generation.load(Ordering::SeqCst)
    }

    pub fn is_cleanup_running(&self) -> bool {
        self.cleanup
            .lock()
            .as_ref()
            .is_some_and(CleanupTask::is_running)
    }

    /// Stops the cleanup task. Validation keeps working; the cache is simply
    /// no longer cleared on a cadence.
    pub fn shutdown(&self) {
        if let Some(task) = self.cleanup.lock().take() {
            task.stop();
            info!("Signing manager shut down");
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    pub fn replay_guard(&self) -> Arc<ReplayGuard> {
        self.replay.clone()
    }
}
