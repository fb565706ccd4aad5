//! Error taxonomy for the evaluation workflow core.
//!
//! The variants map one-to-one onto the failure modes the calling UI
//! branches on: an entity that does not exist (or is hidden by tenant
//! scoping), an entity the caller may see but not act on, an operation
//! attempted in the wrong lifecycle state, and malformed input. Storage
//! faults are carried separately so business-rule failures never get
//! mixed up with infrastructure problems.

use thiserror::Error;

use crate::models::EvaluationStatus;

/// Main error type for evaluation workflow operations.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// The entity is absent, or belongs to another organization. The two
    /// cases are deliberately indistinguishable so cross-tenant existence
    /// never leaks.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// The entity is visible to the caller but their role or ownership
    /// does not allow the action.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The operation is not legal in the instance's current status.
    #[error("cannot {action} an evaluation in status {from}")]
    InvalidTransition {
        from: EvaluationStatus,
        action: &'static str,
    },

    /// Malformed input: rating out of range, missing identifier, wrong
    /// evaluation kind for the operation.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Underlying store or directory failure.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl WorkflowError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type alias for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;
