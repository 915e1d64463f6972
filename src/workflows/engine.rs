//! Workflow engine: permission checks, lifecycle transitions, persistence,
//! revision logging and notification dispatch for designs.
//!
//! Every mutating call holds the engine's write lock for its whole
//! load-validate-mutate-persist cycle, so two requests never interleave.
//! Notifications go out after the design and its log entries are stored;
//! a delivery failure is logged and never undoes the transition.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, Instrument};
use uuid::Uuid;

use super::lifecycle::{drive, Effect, LifecycleContext, LifecycleEvent, RejectOrigin};
use crate::access::{client_owns, require, require_author};
use crate::checklist::{instantiate, write_flag, FlagWrite, ValidationRole};
use crate::config::WorkflowConfig;
use crate::design::{
    sniff_mimetype, Attachment, Capability, ChecklistTemplate, Design, DesignId, DesignStatus,
    EntryId, ItemId, NewAttachment, NewDesign, NewTemplate, ReasonCode, Stage, ThreadMessage, User,
    UserId, WorkflowError,
};
use crate::notifications::{Dispatcher, TransitionKind};
use crate::observability::{workflow_metrics, OperationTimer};
use crate::revision_log::{NewRevisionEntry, RevisionEntry, RevisionKind};
use crate::store::{DesignQuery, WorkflowStore};
use crate::telemetry::{create_workflow_span, generate_correlation_id};

pub type WorkflowResult<T> = Result<T, WorkflowError>;

pub struct DesignWorkflow<S: WorkflowStore> {
    store: Arc<S>,
    dispatcher: Dispatcher,
    config: WorkflowConfig,
    write_lock: Mutex<()>,
}

impl<S: WorkflowStore> std::fmt::Debug for DesignWorkflow<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignWorkflow")
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish()
    }
}

impl<S: WorkflowStore> DesignWorkflow<S> {
    pub fn new(store: Arc<S>, dispatcher: Dispatcher, config: WorkflowConfig) -> Self {
        Self {
            store,
            dispatcher,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    // ---- staff operations ----

    /// Create a draft and populate its checklist from the stage 1 template
    pub async fn create_design(
        &self,
        actor_id: UserId,
        input: NewDesign,
        uploads: Vec<NewAttachment>,
    ) -> WorkflowResult<Design> {
        let span = create_workflow_span("create_design", None, Some(actor_id), &generate_correlation_id());
        async move {
            let timer = OperationTimer::new("create_design");
            let _guard = self.write_lock.lock().await;
            let actor = self.actor(actor_id).await?;
            require_author(&actor)?;
            if input.name.trim().is_empty() {
                return Err(WorkflowError::Validation(ReasonCode::EmptyName));
            }

            let now = Utc::now();
            let mut design = Design::draft(0, input, actor.id, now);
            if let Some(template) = self.store.find_template(design.category_id, Stage::Stage1).await? {
                design.checklist = instantiate(&template, 1);
            }
            for upload in uploads {
                let attachment = build_attachment(&design, upload)?;
                design.attachments.push(attachment);
            }

            let design = self.store.insert_design(design).await?;
            let notes = format!("Design \"{}\" created with {} checklist items", design.name, design.checklist.len());
            self.apply_effects(
                &design,
                actor.id,
                vec![
                    Effect::Log { kind: RevisionKind::Created, notes },
                    Effect::Notify { kind: TransitionKind::Created, note: None },
                ],
            )
            .await?;

            info!(design_id = %design.id, items = design.checklist.len(), "Design created");
            timer.finish();
            Ok(design)
        }
        .instrument(span)
        .await
    }

    /// Attach a file to a design that is still being prepared
    pub async fn add_attachment(
        &self,
        actor_id: UserId,
        design_id: DesignId,
        upload: NewAttachment,
    ) -> WorkflowResult<Attachment> {
        let span = create_workflow_span("add_attachment", Some(design_id), Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let actor = self.actor(actor_id).await?;
            require_author(&actor)?;
            let mut design = self.load(design_id).await?;
            if !matches!(design.status, DesignStatus::Draft | DesignStatus::AwaitingValidation) {
                return Err(WorkflowError::InvalidTransition {
                    action: "upload",
                    status: design.status,
                });
            }

            let now = Utc::now();
            let attachment = build_attachment(&design, upload)?;
            design.attachments.push(attachment.clone());
            design.updated_at = now;

            // a checklist ticked before the first upload may now pass the gate
            let mut context = LifecycleContext::new(design, actor.id, now);
            drive(&mut context, &LifecycleEvent::ChecklistChanged)?;
            self.commit(context).await?;
            info!(attachment = %attachment.name, mimetype = %attachment.mimetype, "Attachment added");
            Ok(attachment)
        }
        .instrument(span)
        .await
    }

    /// Write a designer or validator flag on one checklist item and run the gate
    pub async fn set_validation(
        &self,
        actor_id: UserId,
        design_id: DesignId,
        item_id: ItemId,
        role: ValidationRole,
        value: bool,
    ) -> WorkflowResult<Design> {
        let span = create_workflow_span("set_validation", Some(design_id), Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let actor = self.actor(actor_id).await?;
            require(&actor, role.required_capability())?;
            let mut design = self.load(design_id).await?;
            if design.status == DesignStatus::Rejected {
                return Err(WorkflowError::InvalidTransition {
                    action: "validate",
                    status: design.status,
                });
            }

            let now = Utc::now();
            let item = design
                .item_mut(item_id)
                .ok_or(WorkflowError::ItemNotFound { design_id, item_id })?;
            let write = write_flag(item, role, value, actor.id, now);
            if write == FlagWrite::Unchanged {
                tracing::debug!(item_id = %item_id, "Validation flag already set; nothing to do");
                return Ok(design);
            }

            let kind = match role {
                ValidationRole::Designer => RevisionKind::DesignerValidation,
                ValidationRole::Validator => RevisionKind::ValidatorValidation,
            };
            let verb = if write == FlagWrite::Set { "validated" } else { "unvalidated" };
            let notes = format!("Item \"{}\" {verb}", item.description);
            design.updated_at = now;

            let timer = OperationTimer::new("validate");
            let mut context = LifecycleContext::new(design, actor.id, now);
            context.effects.push(Effect::Log { kind, notes });
            drive(&mut context, &LifecycleEvent::ChecklistChanged)?;
            let design = self.commit(context).await?;
            timer.finish();
            Ok(design)
        }
        .instrument(span)
        .await
    }

    /// Validator rejection with a mandatory reason
    pub async fn validator_reject(
        &self,
        actor_id: UserId,
        design_id: DesignId,
        reason: &str,
    ) -> WorkflowResult<Design> {
        let span = create_workflow_span("validator_reject", Some(design_id), Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let actor = self.actor(actor_id).await?;
            require(&actor, Capability::Validator)?;
            let design = self.load(design_id).await?;
            if !design.status.is_rejectable() {
                return Err(WorkflowError::InvalidTransition {
                    action: "reject",
                    status: design.status,
                });
            }
            self.transition(
                &actor,
                design,
                LifecycleEvent::Reject {
                    reason: reason.to_string(),
                    origin: RejectOrigin::Validator,
                },
            )
            .await
        }
        .instrument(span)
        .await
    }

    /// New upload after a rejection or a change request
    pub async fn resubmit(
        &self,
        actor_id: UserId,
        design_id: DesignId,
        uploads: Vec<NewAttachment>,
    ) -> WorkflowResult<Design> {
        let span = create_workflow_span("resubmit", Some(design_id), Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let actor = self.actor(actor_id).await?;
            require_author(&actor)?;
            let design = self.load(design_id).await?;
            if design.designer_id != actor.id && !actor.is_admin() {
                workflow_metrics().record_permission_denied();
                tracing::warn!(user_id = %actor.id, designer_id = %design.designer_id, "Re-upload refused to non-owner");
                return Err(WorkflowError::NotOwner {
                    user_id: actor.id,
                    design_id,
                });
            }

            let mut scratch = design.clone();
            let mut attachments = Vec::with_capacity(uploads.len());
            for upload in uploads {
                let attachment = build_attachment(&scratch, upload)?;
                scratch.attachments.push(attachment.clone());
                attachments.push(attachment);
            }
            self.transition(&actor, design, LifecycleEvent::Resubmit { attachments })
                .await
        }
        .instrument(span)
        .await
    }

    /// Post a message to the design thread
    pub async fn post_comment(&self, actor_id: UserId, design_id: DesignId, body: &str) -> WorkflowResult<Design> {
        let span = create_workflow_span("post_comment", Some(design_id), Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let actor = self.actor(actor_id).await?;
            let mut design = self.load(design_id).await?;
            self.ensure_may_comment(&actor, &design).await?;
            let body = body.trim();
            if body.is_empty() {
                return Err(WorkflowError::Validation(ReasonCode::MissingComment));
            }

            let now = Utc::now();
            design.messages.push(ThreadMessage {
                author_id: actor.id,
                body: body.to_string(),
                posted_at: now,
            });
            design.updated_at = now;
            self.store.save_design(&design).await?;
            self.apply_effects(
                &design,
                actor.id,
                vec![Effect::Log {
                    kind: RevisionKind::Comment,
                    notes: body.to_string(),
                }],
            )
            .await?;
            Ok(design)
        }
        .instrument(span)
        .await
    }

    /// Admin bulk delete; returns how many designs existed and were removed
    pub async fn delete_designs(&self, actor_id: UserId, design_ids: &[DesignId]) -> WorkflowResult<usize> {
        let span = create_workflow_span("delete_designs", None, Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let actor = self.actor(actor_id).await?;
            require(&actor, Capability::Admin)?;
            if design_ids.is_empty() {
                return Err(WorkflowError::Validation(ReasonCode::NothingToDelete));
            }

            let mut removed = 0;
            for &design_id in design_ids {
                let Some(design) = self.store.get_design(design_id).await? else {
                    tracing::debug!(design_id = %design_id, "Skipping unknown design");
                    continue;
                };
                if self.store.delete_design(design_id).await? {
                    removed += 1;
                    self.store
                        .append(NewRevisionEntry::new(
                            design_id,
                            actor.id,
                            RevisionKind::Deletion,
                            format!("Design \"{}\" deleted", design.name),
                        ))
                        .await?;
                }
            }
            info!(requested = design_ids.len(), removed, "Designs deleted");
            Ok(removed)
        }
        .instrument(span)
        .await
    }

    // ---- client operations ----

    pub async fn client_approve(&self, actor_id: UserId, design_id: DesignId) -> WorkflowResult<Design> {
        let span = create_workflow_span("client_approve", Some(design_id), Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let (actor, design) = self.client_design(actor_id, design_id).await?;
            let stage2_items = self
                .store
                .find_template(design.category_id, Stage::Stage2)
                .await?
                .map(|template| instantiate(&template, design.next_item_id()));
            self.transition(&actor, design, LifecycleEvent::ClientApprove { stage2_items })
                .await
        }
        .instrument(span)
        .await
    }

    pub async fn client_request_changes(
        &self,
        actor_id: UserId,
        design_id: DesignId,
        comment: &str,
    ) -> WorkflowResult<Design> {
        let span = create_workflow_span("client_request_changes", Some(design_id), Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let (actor, design) = self.client_design(actor_id, design_id).await?;
            let event = LifecycleEvent::ClientRequestChanges {
                comment: comment.to_string(),
                max_modifications: self.config.max_modifications,
            };
            self.transition(&actor, design, event).await
        }
        .instrument(span)
        .await
    }

    pub async fn client_reject(&self, actor_id: UserId, design_id: DesignId, reason: &str) -> WorkflowResult<Design> {
        let span = create_workflow_span("client_reject", Some(design_id), Some(actor_id), &generate_correlation_id());
        async move {
            let _guard = self.write_lock.lock().await;
            let (actor, design) = self.client_design(actor_id, design_id).await?;
            let event = LifecycleEvent::Reject {
                reason: reason.to_string(),
                origin: RejectOrigin::Client,
            };
            self.transition(&actor, design, event).await
        }
        .instrument(span)
        .await
    }

    /// Designs a portal user may see, with the total before paging
    pub async fn portal_designs(&self, user: &User, mut query: DesignQuery) -> WorkflowResult<(Vec<Design>, usize)> {
        require(user, Capability::Portal)?;
        let clients = crate::access::visible_clients(self.store.as_ref(), user).await?;
        query.client_ids = Some(clients.into_iter().collect());
        query.visible_only = true;
        let total = self.store.count_designs(&query).await?;
        let designs = self.store.list_designs(&query).await?;
        Ok((designs, total))
    }

    /// One design for a portal user; `None` when missing, hidden or not theirs
    pub async fn portal_design(&self, user: &User, design_id: DesignId) -> WorkflowResult<Option<Design>> {
        require(user, Capability::Portal)?;
        let Some(design) = self.store.get_design(design_id).await? else {
            return Ok(None);
        };
        if design.visible_to_client && client_owns(self.store.as_ref(), user, &design).await? {
            Ok(Some(design))
        } else {
            tracing::warn!(user_id = %user.id, design_id = %design_id, "Portal user denied design access");
            Ok(None)
        }
    }

    // ---- catalog and log ----

    pub async fn create_template(&self, actor_id: UserId, template: NewTemplate) -> WorkflowResult<ChecklistTemplate> {
        let actor = self.actor(actor_id).await?;
        require(&actor, Capability::Admin)?;
        if template.name.trim().is_empty() {
            return Err(WorkflowError::Validation(ReasonCode::EmptyName));
        }
        let template = self.store.insert_template(template).await?;
        info!(template_id = %template.id, category_id = %template.category_id, stage = %template.stage, "Checklist template registered");
        Ok(template)
    }

    pub async fn list_templates(&self) -> WorkflowResult<Vec<ChecklistTemplate>> {
        Ok(self.store.list_templates().await?)
    }

    pub async fn get_design(&self, design_id: DesignId) -> WorkflowResult<Design> {
        self.load(design_id).await
    }

    /// Revision history of a design, newest first; survives deletion
    pub async fn history(&self, design_id: DesignId) -> WorkflowResult<Vec<RevisionEntry>> {
        Ok(self.store.entries_for(design_id).await?)
    }

    pub async fn amend_revision(&self, actor_id: UserId, entry_id: EntryId, notes: String) -> WorkflowResult<()> {
        Ok(self.store.amend(actor_id, entry_id, notes).await?)
    }

    pub async fn remove_revision(&self, actor_id: UserId, entry_id: EntryId) -> WorkflowResult<()> {
        Ok(self.store.remove(actor_id, entry_id).await?)
    }

    // ---- internals ----

    async fn actor(&self, user_id: UserId) -> WorkflowResult<User> {
        self.store
            .get_user(user_id)
            .await?
            .ok_or(WorkflowError::UserNotFound(user_id))
    }

    async fn load(&self, design_id: DesignId) -> WorkflowResult<Design> {
        self.store
            .get_design(design_id)
            .await?
            .ok_or(WorkflowError::DesignNotFound(design_id))
    }

    /// Portal actor plus a design they own and can see
    async fn client_design(&self, actor_id: UserId, design_id: DesignId) -> WorkflowResult<(User, Design)> {
        let actor = self.actor(actor_id).await?;
        require(&actor, Capability::Portal)?;
        let design = self.load(design_id).await?;
        if !design.visible_to_client || !client_owns(self.store.as_ref(), &actor, &design).await? {
            workflow_metrics().record_permission_denied();
            tracing::warn!(user_id = %actor.id, client_id = %design.client_id, "Client does not own design");
            return Err(WorkflowError::NotOwner {
                user_id: actor.id,
                design_id,
            });
        }
        Ok((actor, design))
    }

    async fn ensure_may_comment(&self, actor: &User, design: &Design) -> WorkflowResult<()> {
        let staff = [Capability::Designer, Capability::Validator, Capability::Admin];
        if staff.iter().any(|cap| actor.has(*cap)) {
            return Ok(());
        }
        if actor.has(Capability::Portal)
            && design.visible_to_client
            && client_owns(self.store.as_ref(), actor, design).await?
        {
            return Ok(());
        }
        workflow_metrics().record_permission_denied();
        tracing::warn!(user_id = %actor.id, design_id = %design.id, "Comment refused");
        Err(WorkflowError::NotOwner {
            user_id: actor.id,
            design_id: design.id,
        })
    }

    async fn transition(&self, actor: &User, design: Design, event: LifecycleEvent) -> WorkflowResult<Design> {
        let timer = OperationTimer::new(event.action());
        let mut context = LifecycleContext::new(design, actor.id, Utc::now());
        drive(&mut context, &event)?;
        let design = self.commit(context).await?;
        timer.finish();
        Ok(design)
    }

    /// Persist the design, then write its log entries and send notifications
    async fn commit(&self, context: LifecycleContext) -> WorkflowResult<Design> {
        let LifecycleContext {
            design,
            actor,
            effects,
            ..
        } = context;
        self.store.save_design(&design).await?;
        self.apply_effects(&design, actor, effects).await?;
        Ok(design)
    }

    async fn apply_effects(&self, design: &Design, actor: UserId, effects: Vec<Effect>) -> WorkflowResult<()> {
        for effect in effects {
            match effect {
                Effect::Log { kind, notes } => {
                    match kind {
                        RevisionKind::StatusChange => workflow_metrics().record_transition(),
                        RevisionKind::Rejection => workflow_metrics().record_rejection(),
                        _ => {}
                    }
                    self.store
                        .append(NewRevisionEntry::new(design.id, actor, kind, notes))
                        .await?;
                }
                Effect::Notify { kind, note } => {
                    self.dispatcher
                        .dispatch(self.store.as_ref(), kind, design, note.as_deref())
                        .await;
                }
            }
        }
        Ok(())
    }
}

/// Turn an upload into an attachment of `design`; empty files are refused
fn build_attachment(design: &Design, upload: NewAttachment) -> WorkflowResult<Attachment> {
    if upload.content.is_empty() || upload.name.trim().is_empty() {
        return Err(WorkflowError::Validation(ReasonCode::MissingAttachment));
    }
    let mimetype = sniff_mimetype(&upload.name, &upload.content);
    Ok(Attachment {
        id: design.next_attachment_id(),
        size: upload.content.len(),
        sequence: design.attachments.len() as u32 + 1,
        access_token: Uuid::new_v4().simple().to_string(),
        name: upload.name,
        content: upload.content,
        mimetype,
    })
}
