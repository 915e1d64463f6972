use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use crate::config::ObservabilityConfig;

/// Initialize structured logging.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    if config.json_logs {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .try_init()?;
    }

    tracing::info!("Design approval telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking the events of one request
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping one workflow operation
pub fn create_workflow_span(
    operation: &str,
    design_id: Option<u64>,
    actor_id: Option<u64>,
    correlation_id: &str,
) -> tracing::Span {
    tracing::info_span!(
        "design_workflow",
        operation = operation,
        design.id = design_id,
        actor.id = actor_id,
        correlation.id = correlation_id
    )
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    crate::observability::workflow_metrics().log_stats();
    tracing::info!("Design approval telemetry shutdown complete");
}
