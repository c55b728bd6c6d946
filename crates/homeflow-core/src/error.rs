use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{OperationKind, PhaseNumber, Role};

/// Typed failure reported by an external collaborator call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationError {
    /// Transport or server failure
    #[error("Network error: {0}")]
    Network(String),

    /// The collaborator rejected the request payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Too many requests for the same subject
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// No answer within the bounded wait
    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

impl OperationError {
    /// Whether the phase view should offer a retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OperationError::Network(_) | OperationError::RateLimited(_) | OperationError::Timeout(_)
        )
    }
}

/// Error type for the workflow engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Bad user input, recovered locally by re-prompting
    #[error("Validation error: {0}")]
    Validation(String),

    /// External call failed; session data is unchanged
    #[error("Async operation error: {0}")]
    AsyncOperation(#[from] OperationError),

    /// Attempted to reach or edit a phase that is locked
    #[error("Gate violation: phase {to} is not reachable from phase {from}")]
    GateViolation {
        /// Phase the instance was on
        from: PhaseNumber,
        /// Phase that was requested
        to: PhaseNumber,
    },

    /// Response from a superseded request; it was discarded
    #[error("Stale response for {kind} (sequence {seq})")]
    StaleResponse {
        /// Operation kind of the response
        kind: OperationKind,
        /// Sequence number carried by the response
        seq: u64,
    },

    /// A call of a kind that does not allow overlap is still pending
    #[error("Operation already in flight: {0}")]
    OperationInFlight(OperationKind),

    /// The operation does not exist for this role
    #[error("Role mismatch: expected {expected}, found {actual}")]
    RoleMismatch {
        /// Role the operation belongs to
        expected: Role,
        /// Role of the instance
        actual: Role,
    },
}

impl WorkflowError {
    /// Errors that are expected UI conditions rather than failures
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            WorkflowError::GateViolation { .. } | WorkflowError::StaleResponse { .. }
        )
    }
}

impl From<String> for WorkflowError {
    fn from(err: String) -> Self {
        WorkflowError::Validation(err)
    }
}

impl From<&str> for WorkflowError {
    fn from(err: &str) -> Self {
        WorkflowError::Validation(err.to_string())
    }
}
