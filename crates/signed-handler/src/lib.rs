//! # Signed Handler
//!
//! HTTP front for the stored-procedure backend. Every procedure and admin
//! call is validated by [`shared_signing`] before a handler sees it.
//!
//! ## Modules
//!
//! - [`config`]: environment-driven service configuration
//! - [`middleware`]: signature and tracing layers
//! - [`routes`]: procedure, admin and health endpoints
//! - [`gateway`]: procedure backend boundary
//! - [`outbound`]: signing helpers for calls to other handlers
//! - [`service`]: serving and graceful shutdown

pub mod config;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod outbound;
pub mod routes;
pub mod service;
pub mod telemetry;

pub use config::{HandlerConfig, HandlerConfigError, SharedSecret};
pub use error::{ErrorBody, HandlerError, ServiceError};
pub use gateway::{EchoGateway, ProcedureError, ProcedureGateway};
pub use middleware::{SignatureLayer, TracingLayer, VerifiedCall};
pub use outbound::{signed_request, to_header_map, OutboundError};
pub use routes::{build_router, AppState, RouterOptions};
pub use service::HandlerService;
