// Design Approval Library - checklist-gated design workflow with a client portal
// This exposes the core components for testing and integration

pub mod access;
pub mod checklist;
pub mod cli;
pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod design;
pub mod notifications;
pub mod observability;
pub mod portal;
pub mod revision_log;
pub mod seed;
pub mod shutdown;
pub mod store;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use config::{config, init_config, DesignApprovalConfig};
pub use design::{
    Attachment, Capability, ChecklistItem, Design, DesignId, DesignStatus, Partner, Stage, User,
    WorkflowError,
};
pub use notifications::{Dispatcher, Notifier, OutboxNotifier, TransitionKind};
pub use observability::{workflow_metrics, OperationTimer};
pub use portal::{router, PortalState};
pub use revision_log::{RevisionEntry, RevisionKind, RevisionLog};
pub use seed::SeedFile;
pub use shutdown::ShutdownCoordinator;
pub use store::{DesignQuery, MemoryStore, WorkflowStore};
pub use telemetry::{create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflows::{DesignWorkflow, LifecycleEvent};

#[cfg(feature = "database")]
pub use database::SqliteStore;
