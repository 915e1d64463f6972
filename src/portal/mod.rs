//! Client portal: an axum router exposing the designs a client may see and
//! the three client decisions.

pub mod csrf;
pub mod handlers;
pub mod pager;

use axum::{
    extract::{Request, State},
    http::{header::WWW_AUTHENTICATE, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::config::PortalConfig;
use crate::design::{StoreError, WorkflowError};
use crate::shutdown::ShutdownCoordinator;
use crate::store::WorkflowStore;
use crate::workflows::DesignWorkflow;

pub use csrf::CsrfKeys;
pub use pager::Pager;

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Missing or unknown portal session")]
    Unauthorized,
    #[error("Invalid CSRF token")]
    InvalidCsrf,
    #[error("Too many decisions, slow down")]
    RateLimited,
    #[error("Workflow error: {0}")]
    Workflow(WorkflowError),
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<WorkflowError> for PortalError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::PermissionDenied { .. } | WorkflowError::UserNotFound(_) => {
                PortalError::Unauthorized
            }
            other => PortalError::Workflow(other),
        }
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        match self {
            PortalError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, "Bearer")],
                "portal login required",
            )
                .into_response(),
            PortalError::InvalidCsrf => (StatusCode::FORBIDDEN, "invalid csrf token").into_response(),
            PortalError::RateLimited => {
                (StatusCode::TOO_MANY_REQUESTS, "too many requests").into_response()
            }
            PortalError::Workflow(_) | PortalError::Store(_) => {
                error!(error = %self, "Portal request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

/// Shared state handed to every portal handler
pub struct PortalState<S: WorkflowStore> {
    pub workflow: Arc<DesignWorkflow<S>>,
    pub csrf: CsrfKeys,
    pub decision_limiter: Arc<DefaultDirectRateLimiter>,
    pub items_per_page: usize,
}

impl<S: WorkflowStore> Clone for PortalState<S> {
    fn clone(&self) -> Self {
        Self {
            workflow: Arc::clone(&self.workflow),
            csrf: self.csrf.clone(),
            decision_limiter: Arc::clone(&self.decision_limiter),
            items_per_page: self.items_per_page,
        }
    }
}

impl<S: WorkflowStore> PortalState<S> {
    pub fn new(workflow: Arc<DesignWorkflow<S>>, config: &PortalConfig) -> Self {
        let csrf = match &config.csrf_secret {
            Some(secret) => CsrfKeys::new(secret),
            None => {
                warn!("portal.csrf_secret not set; CSRF tokens will not survive a restart");
                CsrfKeys::generate()
            }
        };
        let quota = Quota::per_second(NonZeroU32::new(config.decisions_per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(config.decision_burst).unwrap_or(NonZeroU32::MIN));

        Self {
            workflow,
            csrf,
            decision_limiter: Arc::new(RateLimiter::direct(quota)),
            items_per_page: config.items_per_page.max(1),
        }
    }
}

async fn limit_decisions<S>(State(state): State<PortalState<S>>, request: Request, next: Next) -> Response
where
    S: WorkflowStore + 'static,
{
    if state.decision_limiter.check().is_err() {
        warn!(path = %request.uri().path(), "Portal decision rate limit exceeded");
        return PortalError::RateLimited.into_response();
    }
    next.run(request).await
}

/// Build the portal router
pub fn router<S>(state: PortalState<S>, max_body_bytes: usize) -> Router
where
    S: WorkflowStore + 'static,
{
    let decisions = Router::new()
        .route("/my/design/approve", post(handlers::approve::<S>))
        .route("/my/design/approve-with-changes", post(handlers::approve_with_changes::<S>))
        .route("/my/design/reject", post(handlers::reject::<S>))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_decisions::<S>));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/my", get(handlers::home::<S>))
        .route("/my/home", get(handlers::home::<S>))
        .route("/my/designs", get(handlers::list_designs::<S>))
        .route("/my/designs/page/:page", get(handlers::list_designs_page::<S>))
        .route("/my/design/:id", get(handlers::show_design::<S>))
        .merge(decisions)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

/// Serve the portal until SIGINT/SIGTERM
pub async fn serve<S>(workflow: Arc<DesignWorkflow<S>>, config: &PortalConfig) -> anyhow::Result<()>
where
    S: WorkflowStore + 'static,
{
    let state = PortalState::new(workflow, config);
    let app = router(state, config.max_body_bytes);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "Client portal listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(ShutdownCoordinator::wait_for_signal())
        .await?;
    Ok(())
}
