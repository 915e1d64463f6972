// Templated, best-effort notifications on workflow transitions

pub mod dispatcher;
pub mod templates;

pub use dispatcher::{
    notifier_from_config, Dispatcher, LogNotifier, Notification, Notifier, NotifyError,
    OutboxNotifier, Recipient, WebhookNotifier,
};
pub use templates::{render, Audience, RenderedMessage, TransitionKind};
