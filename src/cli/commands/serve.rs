use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::Command;
use crate::config::{config, DesignApprovalConfig};
use crate::notifications::{notifier_from_config, Dispatcher};
use crate::seed::SeedFile;
use crate::shutdown::ShutdownCoordinator;
use crate::store::{MemoryStore, WorkflowStore};
use crate::workflows::DesignWorkflow;

/// Run the client portal
pub struct ServeCommand {
    pub seed: Option<PathBuf>,
    pub bind: Option<String>,
}

impl ServeCommand {
    pub fn new(seed: Option<PathBuf>, bind: Option<String>) -> Self {
        Self { seed, bind }
    }
}

impl Command for ServeCommand {
    async fn execute(&self) -> Result<()> {
        let mut config = config()?.clone();
        if let Some(bind) = &self.bind {
            config.portal.bind_addr = bind.clone();
        }
        let seed = self.seed.as_deref().map(SeedFile::load).transpose()?;

        #[cfg(feature = "database")]
        if let Some(database) = &config.database {
            let store = Arc::new(crate::database::SqliteStore::connect(database).await?);
            run(Arc::clone(&store), &config, seed.as_ref()).await?;
            return ShutdownCoordinator::default()
                .shutdown_all_services(store.shutdown())
                .await;
        }

        #[cfg(not(feature = "database"))]
        if config.database.is_some() {
            tracing::warn!("Database configured but the `database` feature is disabled; using the in-memory store");
        }

        run(Arc::new(MemoryStore::new()), &config, seed.as_ref()).await?;
        ShutdownCoordinator::default()
            .shutdown_all_services(async {})
            .await
    }
}

async fn run<S>(store: Arc<S>, config: &DesignApprovalConfig, seed: Option<&SeedFile>) -> Result<()>
where
    S: WorkflowStore + 'static,
{
    if let Some(seed) = seed {
        seed.apply(store.as_ref()).await?;
    }

    let notifier = notifier_from_config(&config.notifications)?;
    let dispatcher = Dispatcher::new(notifier, config.notifications.from_address.clone());
    let workflow = Arc::new(DesignWorkflow::new(store, dispatcher, config.workflow.clone()));

    info!(
        backend = ?config.notifications.backend,
        max_modifications = config.workflow.max_modifications,
        "Design workflow ready"
    );
    crate::portal::serve(workflow, &config.portal).await
}
