//! Middleware stack.
//!
//! Layer order: Request → Tracing → Signature → Handler. `/health` skips the
//! signature layer.

pub mod signature;
pub mod tracing;

pub use signature::{AxumInbound, SignatureLayer, VerifiedCall};
pub use tracing::TracingLayer;
