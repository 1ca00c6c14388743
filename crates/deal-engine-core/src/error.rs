use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proposal::model::ApprovalStatus;

#[derive(Debug, Error)]
pub enum DealEngineError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid currency code: '{0}'")]
    InvalidCurrencyCode(String),

    #[error("Invalid contract term: {0} months (must be 1..=600)")]
    InvalidContractTerm(i32),

    #[error("Invalid line item #{index}: {reason}")]
    InvalidLineItem { index: usize, reason: String },

    #[error("Master variable '{0}' has no recorded value")]
    MissingMasterVariable(String),

    #[error("IRR did not converge after {iterations} iterations (last NPV: {last_delta})")]
    IrrNotConvergent { iterations: u32, last_delta: f64 },

    #[error("State conflict on proposal {proposal_id}: expected {expected}, found {actual}")]
    StateConflict {
        proposal_id: String,
        expected: String,
        actual: String,
    },

    #[error("A rejection note is required to reject a proposal")]
    MissingRejectionNote,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    PrerequisiteMissing,
    IrrNotConvergent,
    StateConflict,
    MissingRejectionNote,
    NotFound,
    PermissionDenied,
    Internal,
}

impl DealEngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DealEngineError::InvalidInput { .. }
            | DealEngineError::InvalidCurrencyCode(_)
            | DealEngineError::InvalidContractTerm(_)
            | DealEngineError::InvalidLineItem { .. } => ErrorKind::Validation,
            DealEngineError::MissingMasterVariable(_) => ErrorKind::PrerequisiteMissing,
            DealEngineError::IrrNotConvergent { .. } => ErrorKind::IrrNotConvergent,
            DealEngineError::StateConflict { .. } => ErrorKind::StateConflict,
            DealEngineError::MissingRejectionNote => ErrorKind::MissingRejectionNote,
            DealEngineError::NotFound(_) => ErrorKind::NotFound,
            DealEngineError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            DealEngineError::SerializationError(_) | DealEngineError::Storage(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn state_conflict(
        proposal_id: &str,
        expected: &str,
        actual: ApprovalStatus,
    ) -> Self {
        DealEngineError::StateConflict {
            proposal_id: proposal_id.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

impl From<serde_json::Error> for DealEngineError {
    fn from(e: serde_json::Error) -> Self {
        DealEngineError::SerializationError(e.to_string())
    }
}
