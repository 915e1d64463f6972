//! Notification backends and best-effort dispatch.
//!
//! A failed send never propagates into the workflow: [`Dispatcher::dispatch`]
//! logs the failure, counts it and returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use super::templates::{render, Audience, TransitionKind};
use crate::config::{NotificationBackend, NotificationConfig};
use crate::design::{Capability, Design, DesignId, StoreError};
use crate::observability::workflow_metrics;
use crate::store::Directory;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Webhook rejected notification with status {status}")]
    Rejected { status: u16 },
    #[error("Recipient lookup failed: {0}")]
    Directory(#[from] StoreError),
    #[error("Notifier misconfigured: {0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: TransitionKind,
    pub design_id: DesignId,
    pub from: String,
    pub recipients: Vec<Recipient>,
    pub subject: String,
    pub body: String,
}

/// Delivery backend
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications to the tracing output
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let to: Vec<&str> = notification.recipients.iter().map(|r| r.email.as_str()).collect();
        tracing::info!(
            kind = %notification.kind,
            design_id = %notification.design_id,
            to = ?to,
            subject = %notification.subject,
            "Notification dispatched"
        );
        Ok(())
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default, Clone)]
pub struct OutboxNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl OutboxNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<TransitionKind> {
        self.sent().into_iter().map(|n| n.kind).collect()
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError::Config("outbox lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

/// POSTs each notification as JSON
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.client.post(&self.url).json(notification).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        tracing::debug!(url = %self.url, kind = %notification.kind, "Webhook accepted notification");
        Ok(())
    }
}

/// Build the configured backend
pub fn notifier_from_config(config: &NotificationConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match config.backend {
        NotificationBackend::Log => Ok(Arc::new(LogNotifier)),
        NotificationBackend::Outbox => Ok(Arc::new(OutboxNotifier::new())),
        NotificationBackend::Webhook => {
            let url = config
                .webhook_url
                .clone()
                .ok_or_else(|| NotifyError::Config("webhook_url is not set".to_string()))?;
            Ok(Arc::new(WebhookNotifier::new(
                url,
                Duration::from_secs(config.timeout_seconds),
            )?))
        }
    }
}

/// Resolves audiences, renders templates and sends through a [`Notifier`]
#[derive(Clone)]
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    from: String,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("from", &self.from).finish()
    }
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, from: impl Into<String>) -> Self {
        Self {
            notifier,
            from: from.into(),
        }
    }

    /// Render and send; failures are logged and counted, never returned
    pub async fn dispatch<D>(&self, directory: &D, kind: TransitionKind, design: &Design, note: Option<&str>)
    where
        D: Directory + ?Sized,
    {
        match self.try_dispatch(directory, kind, design, note).await {
            Ok(true) => workflow_metrics().record_notification_sent(),
            Ok(false) => {
                tracing::debug!(kind = %kind, design_id = %design.id, "No recipients for notification");
            }
            Err(e) => {
                workflow_metrics().record_notification_failure();
                tracing::warn!(
                    kind = %kind,
                    design_id = %design.id,
                    error = %e,
                    "Notification failed; transition kept"
                );
            }
        }
    }

    async fn try_dispatch<D>(
        &self,
        directory: &D,
        kind: TransitionKind,
        design: &Design,
        note: Option<&str>,
    ) -> Result<bool, NotifyError>
    where
        D: Directory + ?Sized,
    {
        let recipients = resolve_recipients(directory, kind.audiences(), design).await?;
        if recipients.is_empty() {
            return Ok(false);
        }

        let message = render(kind, design, note);
        let notification = Notification {
            kind,
            design_id: design.id,
            from: self.from.clone(),
            recipients,
            subject: message.subject,
            body: message.body,
        };
        self.notifier.send(&notification).await?;
        Ok(true)
    }
}

async fn resolve_recipients<D>(
    directory: &D,
    audiences: &[Audience],
    design: &Design,
) -> Result<Vec<Recipient>, StoreError>
where
    D: Directory + ?Sized,
{
    // keyed by address so a designer who also validates is notified once
    let mut by_email = BTreeMap::new();
    for audience in audiences {
        match audience {
            Audience::Validators => {
                for user in directory.users_with(Capability::Validator).await? {
                    if let Some(email) = user.email {
                        by_email.entry(email.clone()).or_insert(Recipient { name: user.name, email });
                    }
                }
            }
            Audience::DesignOwner => {
                if let Some(user) = directory.get_user(design.designer_id).await? {
                    if let Some(email) = user.email {
                        by_email.entry(email.clone()).or_insert(Recipient { name: user.name, email });
                    }
                }
            }
            Audience::Client => {
                if let Some(partner) = directory.get_partner(design.client_id).await? {
                    if let Some(email) = partner.email {
                        by_email.entry(email.clone()).or_insert(Recipient { name: partner.name, email });
                    }
                }
            }
        }
    }
    Ok(by_email.into_values().collect())
}
