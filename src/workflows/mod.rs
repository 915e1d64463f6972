// Design workflow: statig lifecycle plus the engine that drives it

pub mod engine;
pub mod lifecycle;

pub use engine::{DesignWorkflow, WorkflowResult};
pub use lifecycle::{drive, DesignLifecycle, Effect, LifecycleContext, LifecycleEvent, RejectOrigin};
