use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the design approval service
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DesignApprovalConfig {
    /// Client portal settings
    pub portal: PortalConfig,
    /// Workflow limits
    pub workflow: WorkflowConfig,
    /// Notification dispatch
    pub notifications: NotificationConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Address the portal listens on
    pub bind_addr: String,
    /// Designs per listing page
    pub items_per_page: usize,
    /// Secret used to derive CSRF tokens; generated per process when unset
    pub csrf_secret: Option<String>,
    /// Decision POSTs allowed per second across the process
    pub decisions_per_second: u32,
    /// Burst capacity for decision POSTs
    pub decision_burst: u32,
    /// Largest accepted request body in bytes
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// How many times a client may approve with changes
    pub max_modifications: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationBackend {
    Log,
    Webhook,
    Outbox,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Where notifications go
    pub backend: NotificationBackend,
    /// Target for the webhook backend
    pub webhook_url: Option<String>,
    /// Webhook request timeout
    pub timeout_seconds: u64,
    /// Sender shown in rendered messages
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8069".to_string(),
            items_per_page: 20,
            csrf_secret: None,
            decisions_per_second: 5,
            decision_burst: 20,
            max_body_bytes: 1024 * 1024,
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self { max_modifications: 3 }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            backend: NotificationBackend::Log,
            webhook_url: None,
            timeout_seconds: 10,
            from_address: "studio@example.com".to_string(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl Default for DesignApprovalConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            workflow: WorkflowConfig::default(),
            notifications: NotificationConfig::default(),
            observability: ObservabilityConfig::default(),
            database: None,
        }
    }
}

impl DesignApprovalConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (design-approval.toml, .design-approval-rc)
    /// 3. Environment variables (prefixed with DESIGN_APPROVAL_)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) with config files looked up in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        let toml_file = dir.join("design-approval.toml");
        if toml_file.exists() {
            builder = builder.add_source(File::from(toml_file));
        }

        let rc_file = dir.join(".design-approval-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("DESIGN_APPROVAL")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let loaded: DesignApprovalConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.portal.items_per_page == 0 {
            anyhow::bail!("portal.items_per_page must be at least 1");
        }
        if self.portal.decisions_per_second == 0 {
            anyhow::bail!("portal.decisions_per_second must be at least 1");
        }
        if self.notifications.backend == NotificationBackend::Webhook
            && self.notifications.webhook_url.is_none()
        {
            anyhow::bail!("notifications.webhook_url is required for the webhook backend");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<DesignApprovalConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = DesignApprovalConfig::load_env_file();
        DesignApprovalConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static DesignApprovalConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DesignApprovalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workflow.max_modifications, 3);
        assert_eq!(config.portal.items_per_page, 20);
    }

    #[test]
    fn test_webhook_backend_requires_url() {
        let mut config = DesignApprovalConfig::default();
        config.notifications.backend = NotificationBackend::Webhook;
        assert!(config.validate().is_err());

        config.notifications.webhook_url = Some("http://localhost:9000/hook".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("design-approval.toml");
        std::fs::write(
            &path,
            "[portal]\nitems_per_page = 5\n\n[workflow]\nmax_modifications = 2\n",
        )
        .unwrap();

        let loaded = DesignApprovalConfig::load_from(dir.path()).unwrap();
        assert_eq!(loaded.portal.items_per_page, 5);
        assert_eq!(loaded.workflow.max_modifications, 2);
        assert_eq!(loaded.portal.bind_addr, "127.0.0.1:8069");

        let out = dir.path().join("written.toml");
        loaded.save_to_file(&out).unwrap();
        let text = std::fs::read_to_string(out).unwrap();
        assert!(text.contains("items_per_page = 5"));
    }
}
