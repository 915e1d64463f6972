// Message templates keyed by workflow transition

use serde::{Deserialize, Serialize};

use crate::design::Design;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    Created,
    PendingValidation,
    Validated,
    Rejected,
    ClientApproved,
    ClientRejected,
    CorrectionsRequested,
}

/// Who receives a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Audience {
    /// Every user with the validator capability
    Validators,
    /// The designer who owns the design
    DesignOwner,
    /// The client partner of the design
    Client,
}

impl TransitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Created => "created",
            TransitionKind::PendingValidation => "pending-validation",
            TransitionKind::Validated => "validated",
            TransitionKind::Rejected => "rejected",
            TransitionKind::ClientApproved => "client-approved",
            TransitionKind::ClientRejected => "client-rejected",
            TransitionKind::CorrectionsRequested => "corrections-requested",
        }
    }

    pub fn audiences(&self) -> &'static [Audience] {
        match self {
            TransitionKind::Created | TransitionKind::PendingValidation => &[Audience::Validators],
            TransitionKind::Validated => &[Audience::Client],
            TransitionKind::Rejected | TransitionKind::CorrectionsRequested => {
                &[Audience::DesignOwner]
            }
            TransitionKind::ClientApproved | TransitionKind::ClientRejected => {
                &[Audience::DesignOwner, Audience::Validators]
            }
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

/// Render the subject and body for a transition; `note` carries the
/// rejection reason or the client's comment when there is one
pub fn render(kind: TransitionKind, design: &Design, note: Option<&str>) -> RenderedMessage {
    let name = &design.name;
    let (subject, mut body) = match kind {
        TransitionKind::Created => (
            format!("New design: {name}"),
            format!("Design \"{name}\" was created and its checklist is ready."),
        ),
        TransitionKind::PendingValidation => (
            format!("Design awaiting validation: {name}"),
            format!("Design \"{name}\" is ready for validation. Please review its checklist."),
        ),
        TransitionKind::Validated => (
            format!("Your design is ready for review: {name}"),
            format!("Design \"{name}\" passed internal validation and is waiting for your approval in the portal."),
        ),
        TransitionKind::Rejected => (
            format!("Design rejected: {name}"),
            format!("Design \"{name}\" was rejected during validation and must be uploaded again."),
        ),
        TransitionKind::ClientApproved => (
            format!("Client approved design: {name}"),
            format!("The client approved design \"{name}\". It moves on to stage 2."),
        ),
        TransitionKind::ClientRejected => (
            format!("Client rejected design: {name}"),
            format!("The client rejected design \"{name}\". It must be uploaded again."),
        ),
        TransitionKind::CorrectionsRequested => (
            format!("Corrections requested: {name}"),
            format!(
                "The client approved design \"{name}\" with changes (request {} so far).",
                design.modification_count
            ),
        ),
    };

    if let Some(note) = note.map(str::trim).filter(|n| !n.is_empty()) {
        body.push_str("\n\n");
        body.push_str(note);
    }

    RenderedMessage { subject, body }
}
