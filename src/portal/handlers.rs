//! Route handlers for the client portal.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pager::{parse_date_bound, Pager};
use super::{PortalError, PortalState};
use crate::design::{
    Capability, ChecklistItem, Design, DesignId, DesignStatus, Stage, ThreadMessage, User,
    WorkflowError,
};
use crate::store::{DesignQuery, SortOrder, WorkflowStore};

/// Authenticated portal user and the session token they presented
#[derive(Debug, Clone)]
pub struct PortalSession {
    pub user: User,
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<PortalState<S>> for PortalSession
where
    S: WorkflowStore + 'static,
{
    type Rejection = PortalError;

    async fn from_request_parts(parts: &mut Parts, state: &PortalState<S>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(PortalError::Unauthorized)?;

        let user = state
            .workflow
            .store()
            .user_by_token(token)
            .await?
            .filter(|user| user.has(Capability::Portal))
            .ok_or(PortalError::Unauthorized)?;

        Ok(Self {
            user,
            token: token.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct HomeCounters {
    pub design_count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub date_begin: Option<String>,
    pub date_end: Option<String>,
    pub sortby: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DesignSummary {
    pub id: DesignId,
    pub name: String,
    pub status: DesignStatus,
    pub stage: Stage,
    pub attachment_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct DesignPage {
    pub designs: Vec<DesignSummary>,
    pub pager: Pager,
    pub sortby: &'static str,
    pub message: Option<String>,
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct AttachmentView {
    pub id: u64,
    pub name: String,
    pub mimetype: String,
    pub size: usize,
    pub data_base64: String,
}

#[derive(Debug, Serialize)]
pub struct DesignView {
    pub id: DesignId,
    pub name: String,
    pub status: DesignStatus,
    pub stage: Stage,
    pub task_ref: Option<String>,
    pub client_approved: bool,
    pub client_approved_at: Option<DateTime<Utc>>,
    pub modification_count: u8,
    pub max_modifications: u8,
    pub last_change_request: Option<String>,
    /// Decisions are only offered while the design awaits the client
    pub can_decide: bool,
    pub attachments: Vec<AttachmentView>,
    pub checklist: Vec<ChecklistItem>,
    pub messages: Vec<ThreadMessage>,
    pub error: Option<String>,
    pub csrf_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DesignParams {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionForm {
    pub design_id: DesignId,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    ApproveWithChanges,
    Reject,
}

impl Decision {
    fn success_message(&self) -> &'static str {
        match self {
            Decision::Approve => "design_approved",
            Decision::ApproveWithChanges => "design_approved_with_changes",
            Decision::Reject => "design_rejected",
        }
    }
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn home<S>(State(state): State<PortalState<S>>, session: PortalSession) -> Result<Json<HomeCounters>, PortalError>
where
    S: WorkflowStore + 'static,
{
    let query = DesignQuery {
        limit: Some(0),
        ..DesignQuery::default()
    };
    let (_, design_count) = state.workflow.portal_designs(&session.user, query).await?;
    Ok(Json(HomeCounters { design_count }))
}

pub async fn list_designs<S>(
    state: State<PortalState<S>>,
    session: PortalSession,
    params: Query<ListParams>,
) -> Result<Json<DesignPage>, PortalError>
where
    S: WorkflowStore + 'static,
{
    list_page(state, session, 1, params.0).await
}

pub async fn list_designs_page<S>(
    state: State<PortalState<S>>,
    session: PortalSession,
    Path(page): Path<usize>,
    params: Query<ListParams>,
) -> Result<Json<DesignPage>, PortalError>
where
    S: WorkflowStore + 'static,
{
    list_page(state, session, page, params.0).await
}

async fn list_page<S>(
    State(state): State<PortalState<S>>,
    session: PortalSession,
    page: usize,
    params: ListParams,
) -> Result<Json<DesignPage>, PortalError>
where
    S: WorkflowStore + 'static,
{
    let (sort, sortby) = match params.sortby.as_deref() {
        Some("name") => (SortOrder::NameAsc, "name"),
        _ => (SortOrder::CreatedDesc, "date"),
    };
    let step = state.items_per_page;
    let requested = page.max(1);
    let mut query = DesignQuery {
        created_from: params.date_begin.as_deref().and_then(|v| parse_date_bound(v, false)),
        created_to: params.date_end.as_deref().and_then(|v| parse_date_bound(v, true)),
        sort,
        offset: (requested - 1).saturating_mul(step),
        limit: Some(step),
        ..DesignQuery::default()
    };

    let (mut designs, total) = state.workflow.portal_designs(&session.user, query.clone()).await?;
    let pager = Pager::new(total, requested, step);
    if pager.offset != query.offset {
        query.offset = pager.offset;
        designs = state.workflow.portal_designs(&session.user, query).await?.0;
    }

    let designs = designs
        .into_iter()
        .map(|design| DesignSummary {
            id: design.id,
            attachment_count: design.attachments.len(),
            name: design.name,
            status: design.status,
            stage: design.stage,
            created_at: design.created_at,
        })
        .collect();

    Ok(Json(DesignPage {
        designs,
        pager,
        sortby,
        message: params.message,
        csrf_token: state.csrf.token_for(&session.token),
    }))
}

pub async fn show_design<S>(
    State(state): State<PortalState<S>>,
    session: PortalSession,
    Path(design_id): Path<DesignId>,
    Query(params): Query<DesignParams>,
) -> Result<Response, PortalError>
where
    S: WorkflowStore + 'static,
{
    let Some(design) = state.workflow.portal_design(&session.user, design_id).await? else {
        return Ok(Redirect::to("/my").into_response());
    };
    let max_modifications = state.workflow.config().max_modifications;
    let view = design_view(
        design,
        max_modifications,
        params.error,
        state.csrf.token_for(&session.token),
    );
    Ok(Json(view).into_response())
}

fn design_view(design: Design, max_modifications: u8, error: Option<String>, csrf_token: String) -> DesignView {
    let attachments = design
        .attachments
        .iter()
        .map(|a| AttachmentView {
            id: a.id,
            name: a.name.clone(),
            mimetype: a.mimetype.clone(),
            size: a.size,
            data_base64: STANDARD.encode(&a.content),
        })
        .collect();

    DesignView {
        id: design.id,
        can_decide: design.status == DesignStatus::AwaitingClient,
        name: design.name,
        status: design.status,
        stage: design.stage,
        task_ref: design.task_ref,
        client_approved: design.client_approved,
        client_approved_at: design.client_approved_at,
        modification_count: design.modification_count,
        max_modifications,
        last_change_request: design.last_change_request,
        attachments,
        checklist: design.checklist,
        messages: design.messages,
        error,
        csrf_token,
    }
}

pub async fn approve<S>(
    state: State<PortalState<S>>,
    session: PortalSession,
    Form(form): Form<DecisionForm>,
) -> Result<Redirect, PortalError>
where
    S: WorkflowStore + 'static,
{
    decide(state, session, form, Decision::Approve).await
}

pub async fn approve_with_changes<S>(
    state: State<PortalState<S>>,
    session: PortalSession,
    Form(form): Form<DecisionForm>,
) -> Result<Redirect, PortalError>
where
    S: WorkflowStore + 'static,
{
    decide(state, session, form, Decision::ApproveWithChanges).await
}

pub async fn reject<S>(
    state: State<PortalState<S>>,
    session: PortalSession,
    Form(form): Form<DecisionForm>,
) -> Result<Redirect, PortalError>
where
    S: WorkflowStore + 'static,
{
    decide(state, session, form, Decision::Reject).await
}

async fn decide<S>(
    State(state): State<PortalState<S>>,
    session: PortalSession,
    form: DecisionForm,
    decision: Decision,
) -> Result<Redirect, PortalError>
where
    S: WorkflowStore + 'static,
{
    if !state.csrf.verify(&session.token, &form.csrf_token) {
        tracing::warn!(user_id = %session.user.id, design_id = %form.design_id, "Rejected portal decision with bad CSRF token");
        return Err(PortalError::InvalidCsrf);
    }

    let workflow = &state.workflow;
    let user_id = session.user.id;
    let design_id = form.design_id;
    let outcome = match decision {
        Decision::Approve => workflow.client_approve(user_id, design_id).await,
        Decision::ApproveWithChanges => {
            workflow
                .client_request_changes(user_id, design_id, &form.message)
                .await
        }
        Decision::Reject => workflow.client_reject(user_id, design_id, &form.message).await,
    };

    match outcome {
        Ok(_) => Ok(Redirect::to(&format!("/my/designs?message={}", decision.success_message()))),
        Err(err) => redirect_for_error(design_id, err),
    }
}

fn redirect_for_error(design_id: DesignId, err: WorkflowError) -> Result<Redirect, PortalError> {
    if let Some(code) = err.reason_code() {
        return Ok(error_redirect(design_id, code.as_str()));
    }
    match err {
        WorkflowError::DesignNotFound(_) => Ok(Redirect::to("/my")),
        err if err.is_access_error() => Ok(Redirect::to("/my")),
        WorkflowError::InvalidTransition { .. } => Ok(error_redirect(design_id, "invalid_state")),
        other => Err(PortalError::Workflow(other)),
    }
}

fn error_redirect(design_id: DesignId, code: &str) -> Redirect {
    Redirect::to(&format!("/my/design/{design_id}?error={code}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::ReasonCode;

    #[test]
    fn test_validation_errors_redirect_to_design() {
        let redirect = redirect_for_error(4, WorkflowError::Validation(ReasonCode::MissingComment));
        assert!(redirect.is_ok());
    }

    #[test]
    fn test_storage_errors_surface() {
        let err = WorkflowError::Store(crate::design::StoreError::Backend("disk".to_string()));
        assert!(matches!(redirect_for_error(4, err), Err(PortalError::Workflow(_))));
    }
}
