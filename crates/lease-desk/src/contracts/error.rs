use super::lifecycle::{ContractStatus, LifecycleAction};
use super::upload::UploadViolation;

/// Failure taxonomy shared by every stage of the contract pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractError {
    #[error("validation failed: {0}")]
    Validation(#[from] UploadViolation),
    #[error("page index {index} is out of range for a document with {len} page(s)")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("signature failed: {0}")]
    SignatureFailed(String),
    #[error("state transition rejected: {0}")]
    StateTransitionRejected(#[from] TransitionRejection),
}

/// Why a lifecycle or structural change was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionRejection {
    #[error("cannot {action} a contract that is {from}")]
    Lifecycle {
        from: ContractStatus,
        action: LifecycleAction,
    },
    #[error("a contract document must keep at least one page")]
    LastPage,
    #[error("the document can no longer be edited once the contract is {0}")]
    DocumentLocked(ContractStatus),
}

impl ContractError {
    pub(crate) fn lifecycle(from: ContractStatus, action: LifecycleAction) -> Self {
        Self::StateTransitionRejected(TransitionRejection::Lifecycle { from, action })
    }

    pub(crate) fn signature(reason: impl Into<String>) -> Self {
        Self::SignatureFailed(reason.into())
    }
}
