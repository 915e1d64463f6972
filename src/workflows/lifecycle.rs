//! Status lifecycle of a single design.
//!
//! The machine is rebuilt for every operation: a [`LifecycleEvent::Hydrate`]
//! moves it from `unloaded` into the state matching the stored status, then
//! the operation's event is handled. Handlers mutate the design held in
//! [`LifecycleContext`] and queue [`Effect`]s (log entries, notifications)
//! for the engine to apply after the design is persisted. An event a state
//! does not accept leaves the design untouched and records a refusal.

use chrono::{DateTime, Utc};
use statig::prelude::*;

use crate::checklist::{carry_into_stage, GateReport};
use crate::design::{
    Attachment, ChecklistItem, Design, DesignStatus, ReasonCode, Stage, ThreadMessage,
    UserId, WorkflowError,
};
use crate::notifications::TransitionKind;
use crate::revision_log::RevisionKind;

/// Who issued a rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectOrigin {
    Validator,
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Enter the state stored on the design
    Hydrate,
    /// A checklist flag changed; re-run the completion gate
    ChecklistChanged,
    Reject {
        reason: String,
        origin: RejectOrigin,
    },
    /// Client approval; `stage2_items` come from the stage 2 template when one exists
    ClientApprove {
        stage2_items: Option<Vec<ChecklistItem>>,
    },
    ClientRequestChanges {
        comment: String,
        max_modifications: u8,
    },
    Resubmit {
        attachments: Vec<Attachment>,
    },
}

impl LifecycleEvent {
    pub fn action(&self) -> &'static str {
        match self {
            LifecycleEvent::Hydrate => "hydrate",
            LifecycleEvent::ChecklistChanged => "checklist_changed",
            LifecycleEvent::Reject { .. } => "reject",
            LifecycleEvent::ClientApprove { .. } => "approve",
            LifecycleEvent::ClientRequestChanges { .. } => "approve_with_changes",
            LifecycleEvent::Resubmit { .. } => "resubmit",
        }
    }
}

/// Side effect queued by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Log { kind: RevisionKind, notes: String },
    Notify { kind: TransitionKind, note: Option<String> },
}

/// Mutable state threaded through the handlers
#[derive(Debug)]
pub struct LifecycleContext {
    pub design: Design,
    pub actor: UserId,
    pub now: DateTime<Utc>,
    pub effects: Vec<Effect>,
    pub refusal: Option<WorkflowError>,
}

impl LifecycleContext {
    pub fn new(design: Design, actor: UserId, now: DateTime<Utc>) -> Self {
        Self {
            design,
            actor,
            now,
            effects: Vec::new(),
            refusal: None,
        }
    }

    fn log(&mut self, kind: RevisionKind, notes: impl Into<String>) {
        self.effects.push(Effect::Log {
            kind,
            notes: notes.into(),
        });
    }

    fn notify(&mut self, kind: TransitionKind, note: Option<String>) {
        self.effects.push(Effect::Notify { kind, note });
    }

    fn refuse_transition(&mut self, event: &LifecycleEvent) {
        tracing::warn!(
            design_id = %self.design.id,
            status = %self.design.status,
            action = event.action(),
            "Transition refused"
        );
        self.refusal = Some(WorkflowError::InvalidTransition {
            action: event.action(),
            status: self.design.status,
        });
    }

    fn refuse(&mut self, code: ReasonCode) {
        self.refusal = Some(WorkflowError::Validation(code));
    }

    fn set_status(&mut self, status: DesignStatus) {
        let from = self.design.status;
        self.design.status = status;
        self.design.updated_at = self.now;
        self.log(RevisionKind::StatusChange, format!("{from} -> {status}"));
    }

    fn advance_to_awaiting_client(&mut self) {
        self.set_status(DesignStatus::AwaitingClient);
        self.design.visible_to_client = true;
        self.notify(TransitionKind::Validated, None);
    }

    /// Shared by validator and client rejections; false when refused
    fn reject(&mut self, reason: &str, origin: RejectOrigin) -> bool {
        let reason = reason.trim();
        if reason.is_empty() {
            self.refuse(ReasonCode::MissingReason);
            return false;
        }

        let design = &mut self.design;
        design.attachments.clear();
        design.checklist.retain(|item| item.stage == Stage::Stage1);
        design.checklist.iter_mut().for_each(ChecklistItem::reset_validations);
        design.stage = Stage::Stage1;
        design.visible_to_client = false;
        design.client_approved = false;
        design.client_approved_at = None;
        design.rejection_reason = Some(reason.to_string());
        design.rejected_at = Some(self.now);

        self.set_status(DesignStatus::Rejected);
        let (kind, who) = match origin {
            RejectOrigin::Validator => (TransitionKind::Rejected, "validator"),
            RejectOrigin::Client => (TransitionKind::ClientRejected, "client"),
        };
        self.log(RevisionKind::Rejection, format!("Rejected by {who}: {reason}"));
        self.notify(kind, Some(reason.to_string()));
        true
    }

    fn resubmit(&mut self, attachments: &[Attachment]) -> bool {
        if attachments.is_empty() {
            self.refuse(ReasonCode::MissingAttachment);
            return false;
        }

        let design = &mut self.design;
        design.attachments.extend(attachments.iter().cloned());
        let stage = design.stage;
        design
            .checklist
            .iter_mut()
            .filter(|item| item.stage == stage)
            .for_each(ChecklistItem::reset_validations);
        design.rejection_reason = None;
        design.rejected_at = None;
        design.visible_to_client = false;

        let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
        let notes = format!("Uploaded {}", names.join(", "));
        self.set_status(DesignStatus::AwaitingValidation);
        self.log(RevisionKind::Reupload, notes);
        self.notify(TransitionKind::PendingValidation, None);
        true
    }
}

/// Shared storage of the machine; all mutable data lives in the context
#[derive(Debug, Default)]
pub struct DesignLifecycle;

#[state_machine(initial = "State::unloaded()")]
impl DesignLifecycle {
    #[state]
    fn unloaded(context: &mut LifecycleContext, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Hydrate => Transition(match context.design.status {
                DesignStatus::Draft => State::draft(),
                DesignStatus::AwaitingValidation => State::awaiting_validation(),
                DesignStatus::AwaitingClient => State::awaiting_client(),
                DesignStatus::Approved => State::approved(),
                DesignStatus::Rejected => State::rejected(),
                DesignStatus::ChangesRequested => State::changes_requested(),
            }),
            other => {
                context.refuse_transition(other);
                Handled
            }
        }
    }

    #[state]
    fn draft(context: &mut LifecycleContext, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::ChecklistChanged => {
                let report = GateReport::evaluate(&context.design);
                if context.design.attachments.is_empty() {
                    // nothing to review yet; stays a draft until the first upload
                    tracing::debug!(design_id = %context.design.id, "Gate held back: no attachment");
                    Handled
                } else if report.fully_validated() {
                    context.advance_to_awaiting_client();
                    Transition(State::awaiting_client())
                } else if report.designer_complete() {
                    context.set_status(DesignStatus::AwaitingValidation);
                    context.notify(TransitionKind::PendingValidation, None);
                    Transition(State::awaiting_validation())
                } else {
                    Handled
                }
            }
            LifecycleEvent::Reject { reason, origin: RejectOrigin::Validator } => {
                reject_outcome(context, reason, RejectOrigin::Validator)
            }
            other => {
                context.refuse_transition(other);
                Handled
            }
        }
    }

    #[state]
    fn awaiting_validation(context: &mut LifecycleContext, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::ChecklistChanged => {
                if GateReport::evaluate(&context.design).fully_validated() {
                    context.advance_to_awaiting_client();
                    Transition(State::awaiting_client())
                } else {
                    Handled
                }
            }
            LifecycleEvent::Reject { reason, origin: RejectOrigin::Validator } => {
                reject_outcome(context, reason, RejectOrigin::Validator)
            }
            other => {
                context.refuse_transition(other);
                Handled
            }
        }
    }

    #[state]
    fn awaiting_client(context: &mut LifecycleContext, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            // already past the gate
            LifecycleEvent::ChecklistChanged => Handled,
            LifecycleEvent::Reject { reason, origin } => reject_outcome(context, reason, *origin),
            LifecycleEvent::ClientApprove { stage2_items } => {
                let now = context.now;
                let design = &mut context.design;
                design.client_approved = true;
                design.client_approved_at = Some(now);
                design.stage = Stage::Stage2;
                match stage2_items {
                    Some(items) if !design.has_stage_items(Stage::Stage2) => {
                        design.checklist.extend(items.iter().cloned());
                    }
                    Some(_) => {}
                    None => {
                        // no stage 2 template: stage 1 items carry over with fresh validations
                        carry_into_stage(&mut design.checklist, Stage::Stage2);
                    }
                }
                context.set_status(DesignStatus::Approved);
                context.log(RevisionKind::ClientApproval, "Approved by client");
                context.notify(TransitionKind::ClientApproved, None);
                Transition(State::approved())
            }
            LifecycleEvent::ClientRequestChanges {
                comment,
                max_modifications,
            } => {
                let comment = comment.trim();
                if comment.is_empty() {
                    context.refuse(ReasonCode::MissingComment);
                    return Handled;
                }
                if context.design.modification_count >= *max_modifications {
                    context.refuse(ReasonCode::ModificationLimit);
                    return Handled;
                }

                let (actor, now) = (context.actor, context.now);
                let design = &mut context.design;
                design.modification_count += 1;
                design.last_change_request = Some(comment.to_string());
                design.messages.push(ThreadMessage {
                    author_id: actor,
                    body: comment.to_string(),
                    posted_at: now,
                });
                let count = design.modification_count;

                context.set_status(DesignStatus::ChangesRequested);
                context.log(
                    RevisionKind::ChangesRequested,
                    format!("Change request {count}/{max_modifications}: {comment}"),
                );
                context.notify(TransitionKind::CorrectionsRequested, Some(comment.to_string()));
                Transition(State::changes_requested())
            }
            other => {
                context.refuse_transition(other);
                Handled
            }
        }
    }

    #[state]
    fn approved(context: &mut LifecycleContext, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::ChecklistChanged => {
                if context.design.stage == Stage::Stage2
                    && GateReport::evaluate(&context.design).fully_validated()
                {
                    context.design.stage = Stage::Complete;
                    context.design.updated_at = context.now;
                    context.log(RevisionKind::StatusChange, "stage2 -> complete");
                }
                Handled
            }
            other => {
                context.refuse_transition(other);
                Handled
            }
        }
    }

    #[state]
    fn rejected(context: &mut LifecycleContext, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Resubmit { attachments } => resubmit_outcome(context, attachments),
            // flags were reset; nothing advances until a new upload
            LifecycleEvent::ChecklistChanged => Handled,
            other => {
                context.refuse_transition(other);
                Handled
            }
        }
    }

    #[state]
    fn changes_requested(context: &mut LifecycleContext, event: &LifecycleEvent) -> Outcome<State> {
        match event {
            LifecycleEvent::Resubmit { attachments } => resubmit_outcome(context, attachments),
            LifecycleEvent::Reject { reason, origin: RejectOrigin::Validator } => {
                reject_outcome(context, reason, RejectOrigin::Validator)
            }
            LifecycleEvent::ChecklistChanged => Handled,
            other => {
                context.refuse_transition(other);
                Handled
            }
        }
    }
}

fn reject_outcome(context: &mut LifecycleContext, reason: &str, origin: RejectOrigin) -> Outcome<State> {
    if context.reject(reason, origin) {
        Transition(State::rejected())
    } else {
        Handled
    }
}

fn resubmit_outcome(context: &mut LifecycleContext, attachments: &[Attachment]) -> Outcome<State> {
    if context.resubmit(attachments) {
        Transition(State::awaiting_validation())
    } else {
        Handled
    }
}

/// Hydrate a fresh machine from the stored status and feed it one event
pub fn drive(context: &mut LifecycleContext, event: &LifecycleEvent) -> Result<(), WorkflowError> {
    let mut machine = DesignLifecycle.state_machine();
    machine.handle_with_context(&LifecycleEvent::Hydrate, context);
    machine.handle_with_context(event, context);
    match context.refusal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
