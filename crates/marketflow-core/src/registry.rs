//! Seam between the interpreter and the domain method catalog.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a method registry invocation.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No method with a matching name and arity exists.
    #[error("no method named '{name}' taking {arity} argument(s)")]
    NotFound { name: String, arity: usize },
    /// The method resolved, ran, and failed.
    #[error("{0}")]
    Host(String),
}

/// A callable set of named domain methods.
///
/// Implementations resolve case-insensitively on name and exactly on arity,
/// marshal the JSON arguments into native parameters, and convert the native
/// return back into a JSON value.
#[async_trait]
pub trait MethodRegistry: Send + Sync {
    async fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Value, InvokeError>;
}
