use thiserror::Error;

use super::types::{Capability, DesignId, DesignStatus, EntryId, ItemId, UserId};

/// Codes surfaced to the user when an action is refused for a data reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReasonCode {
    MissingReason,
    MissingComment,
    MissingAttachment,
    ModificationLimit,
    NothingToDelete,
    EmptyName,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::MissingReason => "missing_reason",
            ReasonCode::MissingComment => "missing_comment",
            ReasonCode::MissingAttachment => "missing_attachment",
            ReasonCode::ModificationLimit => "modification_limit",
            ReasonCode::NothingToDelete => "nothing_to_delete",
            ReasonCode::EmptyName => "empty_name",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {entity} {id}")]
    NotFound { entity: &'static str, id: u64 },
    #[error("Revision log entries cannot be modified or deleted (entry {entry_id})")]
    ImmutableRevisionLog { entry_id: EntryId },
    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Design {0} not found")]
    DesignNotFound(DesignId),
    #[error("Checklist item {item_id} not found on design {design_id}")]
    ItemNotFound { design_id: DesignId, item_id: ItemId },
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Permission denied: user {user_id} lacks {required} capability")]
    PermissionDenied { user_id: UserId, required: Capability },
    #[error("Permission denied: user {user_id} may not act on design {design_id}")]
    NotOwner { user_id: UserId, design_id: DesignId },
    #[error("Action refused: {0}")]
    Validation(ReasonCode),
    #[error("Invalid transition: {action} not allowed while design is {status}")]
    InvalidTransition { action: &'static str, status: DesignStatus },
    #[error("Revision log entries cannot be modified or deleted (entry {entry_id})")]
    ImmutableRevisionLog { entry_id: EntryId },
    #[error("Storage error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ImmutableRevisionLog { entry_id } => {
                WorkflowError::ImmutableRevisionLog { entry_id }
            }
            other => WorkflowError::Store(other),
        }
    }
}

impl WorkflowError {
    /// Reason code to put in a portal redirect, if the error is user-facing
    pub fn reason_code(&self) -> Option<ReasonCode> {
        match self {
            WorkflowError::Validation(code) => Some(*code),
            _ => None,
        }
    }

    pub fn is_access_error(&self) -> bool {
        matches!(
            self,
            WorkflowError::PermissionDenied { .. }
                | WorkflowError::NotOwner { .. }
                | WorkflowError::UserNotFound(_)
        )
    }
}
