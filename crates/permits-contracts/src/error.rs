//! Runtime error types for the permit execution pipeline.
//!
//! All fallible operations return `PermitResult<T>`. The orchestrator decides
//! what is fatal: only errors raised while fetching permits (or resolving the
//! agent credential) abort a run. Every other variant is caught at the
//! per-permit boundary and recorded.

use thiserror::Error;

/// The unified error type for the permits runtime.
#[derive(Debug, Error)]
pub enum PermitError {
    /// The ledger could not be read or reached.
    #[error("ledger unavailable: {reason}")]
    LedgerUnavailable { reason: String },

    /// The agent credential is missing or unusable. Raised before any ledger call.
    #[error("agent credential missing: {reason}")]
    CredentialMissing { reason: String },

    /// A condition evaluator failed internally.
    #[error("condition evaluation failed: {reason}")]
    EvaluationError { reason: String },

    /// The ledger refused or reverted the submitted action.
    #[error("execution rejected by ledger: {reason}")]
    ExecutionRejected { reason: String },

    /// The ledger did not answer the submission in time.
    #[error("execution timed out: {reason}")]
    ExecutionTimeout { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl PermitError {
    /// True for the error kinds that abort a run when raised during the fetch stage.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PermitError::LedgerUnavailable { .. } | PermitError::CredentialMissing { .. }
        )
    }

    pub fn evaluation(reason: impl Into<String>) -> Self {
        PermitError::EvaluationError { reason: reason.into() }
    }
}

/// Convenience alias used throughout the permits crates.
pub type PermitResult<T> = Result<T, PermitError>;
