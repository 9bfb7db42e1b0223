//! Aggregated error type shared by every `treb` component.

use std::fmt;

/// Result alias used throughout the `treb` workspace.
pub type Result<T> = std::result::Result<T, TrebError>;

/// The error kinds from the core's error handling design: every failure a caller can act on
/// (retry, surface to a user, map to an exit code) is one of these variants, never an opaque
/// string.
#[derive(thiserror::Error, Debug)]
pub enum TrebError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous reference `{reference}`: candidates {candidates:?}")]
    Ambiguous { reference: String, candidates: Vec<String> },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    #[error("cyclic sender reference detected: {0}")]
    CyclicSenderReference(String),

    #[error("external tool failure ({tool}): {reason}")]
    ExternalToolFailure { tool: String, reason: String },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("registry conflict: {0}")]
    RegistryConflict(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("{context}: {source}")]
    Context { context: String, #[source] source: Box<TrebError> },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
}

impl TrebError {
    /// Wraps `self` with `(component, operation, id)` context, mirroring the propagation
    /// policy in the error handling design: every external-tool or resolver failure carries
    /// the component name, the operation, and the relevant id at each boundary it crosses.
    pub fn with_context(self, component: &str, operation: &str, id: impl fmt::Display) -> Self {
        TrebError::Context {
            context: format!("{component}::{operation}({id})"),
            source: Box::new(self),
        }
    }

    /// The exit code this error maps to, per the core's CLI contract (§6): `0` is reserved for
    /// success and is never produced by this function.
    pub fn exit_code(&self) -> i32 {
        match self {
            TrebError::NotFound(_)
            | TrebError::Ambiguous { .. }
            | TrebError::InvalidArgument(_)
            | TrebError::MissingParameter(_)
            | TrebError::CyclicSenderReference(_) => 1,
            TrebError::ExternalToolFailure { .. } | TrebError::Timeout(_) => 2,
            TrebError::RegistryConflict(_) | TrebError::Io(_) | TrebError::Json(_) => 3,
            TrebError::Reqwest(_) => 2,
            TrebError::VerificationFailed(_) => 2,
            TrebError::Context { source, .. } => source.exit_code(),
        }
    }
}

/// Extension used at component boundaries to attach context without losing the original kind.
pub trait ResultExt<T> {
    fn ctx(self, component: &str, operation: &str, id: impl fmt::Display) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn ctx(self, component: &str, operation: &str, id: impl fmt::Display) -> Result<T> {
        self.map_err(|e| e.with_context(component, operation, id))
    }
}
