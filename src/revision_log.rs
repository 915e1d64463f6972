//! Append-only audit trail of workflow events.
//!
//! The [`RevisionLog`] trait exposes `amend` and `remove` so callers get a
//! typed refusal instead of a missing method; every implementation must
//! refuse them regardless of the acting user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::design::{DesignId, EntryId, StoreError, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionKind {
    Created,
    DesignerValidation,
    ValidatorValidation,
    Rejection,
    ClientApproval,
    ChangesRequested,
    Reupload,
    StatusChange,
    Comment,
    Deletion,
}

impl RevisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RevisionKind::Created => "created",
            RevisionKind::DesignerValidation => "designer_validation",
            RevisionKind::ValidatorValidation => "validator_validation",
            RevisionKind::Rejection => "rejection",
            RevisionKind::ClientApproval => "client_approval",
            RevisionKind::ChangesRequested => "changes_requested",
            RevisionKind::Reupload => "reupload",
            RevisionKind::StatusChange => "status_change",
            RevisionKind::Comment => "comment",
            RevisionKind::Deletion => "deletion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(RevisionKind::Created),
            "designer_validation" => Some(RevisionKind::DesignerValidation),
            "validator_validation" => Some(RevisionKind::ValidatorValidation),
            "rejection" => Some(RevisionKind::Rejection),
            "client_approval" => Some(RevisionKind::ClientApproval),
            "changes_requested" => Some(RevisionKind::ChangesRequested),
            "reupload" => Some(RevisionKind::Reupload),
            "status_change" => Some(RevisionKind::StatusChange),
            "comment" => Some(RevisionKind::Comment),
            "deletion" => Some(RevisionKind::Deletion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionEntry {
    pub id: EntryId,
    pub design_id: DesignId,
    pub actor_id: UserId,
    pub timestamp: DateTime<Utc>,
    pub kind: RevisionKind,
    pub notes: String,
}

/// Entry as handed to [`RevisionLog::append`]; the log assigns id and timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRevisionEntry {
    pub design_id: DesignId,
    pub actor_id: UserId,
    pub kind: RevisionKind,
    pub notes: String,
}

impl NewRevisionEntry {
    pub fn new(design_id: DesignId, actor_id: UserId, kind: RevisionKind, notes: impl Into<String>) -> Self {
        Self {
            design_id,
            actor_id,
            kind,
            notes: notes.into(),
        }
    }
}

#[async_trait]
pub trait RevisionLog: Send + Sync {
    /// Append an entry and return it as stored
    async fn append(&self, entry: NewRevisionEntry) -> Result<RevisionEntry, StoreError>;

    /// Entries for a design, newest first
    async fn entries_for(&self, design_id: DesignId) -> Result<Vec<RevisionEntry>, StoreError>;

    /// Always fails with [`StoreError::ImmutableRevisionLog`]
    async fn amend(&self, actor_id: UserId, entry_id: EntryId, notes: String) -> Result<(), StoreError> {
        tracing::warn!(actor_id = %actor_id, entry_id = %entry_id, notes_len = notes.len(), "Refused revision log amendment");
        Err(StoreError::ImmutableRevisionLog { entry_id })
    }

    /// Always fails with [`StoreError::ImmutableRevisionLog`]
    async fn remove(&self, actor_id: UserId, entry_id: EntryId) -> Result<(), StoreError> {
        tracing::warn!(actor_id = %actor_id, entry_id = %entry_id, "Refused revision log deletion");
        Err(StoreError::ImmutableRevisionLog { entry_id })
    }
}
