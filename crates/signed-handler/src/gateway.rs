//! Boundary to the stored-procedure backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcedureError {
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),

    #[error("procedure failed: {0}")]
    Failed(String),

    #[error("procedure backend unavailable: {0}")]
    Unavailable(String),
}

/// Executes a named stored procedure with JSON arguments.
///
/// Called only after the request signature has been validated.
#[async_trait]
pub trait ProcedureGateway: Send + Sync {
    async fn call(&self, procedure: &str, args: Value) -> Result<Value, ProcedureError>;
}

/// Development backend: `echo` returns its arguments, `ping` returns `"pong"`.
#[derive(Debug, Clone)]
pub struct EchoGateway {
    procedures: BTreeSet<String>,
}

impl Default for EchoGateway {
    fn default() -> Self {
        Self {
            procedures: ["echo", "ping"].into_iter().map(String::from).collect(),
        }
    }
}

impl EchoGateway {
    pub fn procedures(&self) -> impl Iterator<Item = &str> {
        self.procedures.iter().map(String::as_str)
    }
}

#[async_trait]
impl ProcedureGateway for EchoGateway {
    async fn call(&self, procedure: &str, args: Value) -> Result<Value, ProcedureError> {
        if !self.procedures.contains(procedure) {
            return Err(ProcedureError::UnknownProcedure(procedure.to_string()));
        }
        match procedure {
            "ping" => Ok(json!("pong")),
            _ => Ok(args),
        }
    }
}
