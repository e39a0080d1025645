//! Error types for the validation workflow.
//!
//! Every denial is a recoverable, user-facing rejection; callers render the
//! message. Nothing here panics on a normal denial path.

use crate::status::ValidationStatus;
use crate::store::StoreError;

/// Error types for workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Scope does not permit the requested action
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// Target is not reachable from the current status, whatever the role
    #[error("Invalid transition: {from} → {to}")]
    InvalidTransition {
        from: ValidationStatus,
        to: ValidationStatus,
    },

    /// Justification or edit payload rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Mutation attempted on a VERROUILLE program outside the unlock path
    #[error("Program {0} is locked")]
    RecordLocked(String),

    /// Program id unknown to the store
    #[error("Program not found: {0}")]
    ProgramNotFound(String),

    /// Unlock request id unknown
    #[error("Unlock request not found: {0}")]
    UnlockRequestNotFound(String),

    /// A pending unlock request already exists for the program
    #[error("An unlock request is already pending for program {0}")]
    UnlockRequestPending(String),

    /// Unlock request was already approved or rejected
    #[error("Unlock request {0} has already been handled")]
    UnlockRequestHandled(String),

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// Short machine-readable kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAuthorized(_) => "not_authorized",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvalidInput(_) => "invalid_input",
            Self::RecordLocked(_) => "record_locked",
            Self::ProgramNotFound(_) => "program_not_found",
            Self::UnlockRequestNotFound(_) => "unlock_request_not_found",
            Self::UnlockRequestPending(_) => "unlock_request_pending",
            Self::UnlockRequestHandled(_) => "unlock_request_handled",
            Self::Store(_) => "store",
        }
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;
