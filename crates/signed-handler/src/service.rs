//! Handler service: wiring, serving and graceful shutdown.

use crate::config::HandlerConfig;
use crate::error::ServiceError;
use crate::gateway::ProcedureGateway;
use crate::routes::{build_router, AppState, RouterOptions};
use axum::Router;
use shared_signing::{validate_secret_strength, SigningManager};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct HandlerService {
    config: HandlerConfig,
    signing: Arc<SigningManager>,
    gateway: Arc<dyn ProcedureGateway>,
}

impl HandlerService {
    /// Validates the configuration and starts the signing manager.
    ///
    /// Must run inside a Tokio runtime.
    pub fn new(
        config: HandlerConfig,
        gateway: Arc<dyn ProcedureGateway>,
    ) -> Result<Self, ServiceError> {
        config.validate()?;

        let strength = validate_secret_strength(config.shared_secret.expose());
        for warning in &strength.warnings {
            warn!(warning = %warning, "Weak shared secret");
        }

        let signing = Arc::new(SigningManager::new(config.signing.clone())?);
        let active = signing.config();
        info!(
            algorithm = %active.algorithm,
            tolerance_ms = active.timestamp_tolerance_ms,
            replay_protection = active.enable_replay_protection,
            require_signature = config.require_signature,
            "Signing manager ready"
        );

        Ok(Self {
            config,
            signing,
            gateway,
        })
    }

    pub fn signing(&self) -> Arc<SigningManager> {
        Arc::clone(&self.signing)
    }

    pub fn router(&self) -> Router {
        build_router(
            AppState {
                signing: Arc::clone(&self.signing),
                gateway: Arc::clone(&self.gateway),
            },
            RouterOptions {
                secret: self.config.shared_secret.clone(),
                max_body_bytes: self.config.max_body_bytes,
                require_signature: self.config.require_signature,
            },
        )
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServiceError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves, then
    /// stops the replay cleanup task.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServiceError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!(addr = %listener.local_addr()?, "Starting signed handler");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        self.signing.shutdown();
        info!("Signed handler stopped");
        Ok(())
    }
}
