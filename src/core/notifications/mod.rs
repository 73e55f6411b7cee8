mod correlator;
mod desktop;
mod slack;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::{NotificationChannelType, NotificationConfig};

pub use correlator::{NotificationCorrelator, reports_new_artifacts};
pub use desktop::DesktopNotifier;
pub use slack::SlackNotifier;

/// Action data attached to a notification so a click can find its artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub artifact: PathBuf,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    pub action_label: Option<String>,
    pub payload: Option<NotificationPayload>,
}

impl NotificationEvent {
    pub fn plain(title: &str, subtitle: &str, body: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            subtitle: subtitle.to_string(),
            body: body.into(),
            action_label: None,
            payload: None,
        }
    }
}

/// A click on a delivered notification. Some transports drop the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    pub payload: Option<NotificationPayload>,
}

/// Trait for notification channel implementations (desktop, Slack, etc.)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<()>;
}

/// Factory function to create a notifier based on config.
///
/// `clicks` receives action invocations from channels that can report them.
pub fn create_notifier(
    config: &NotificationConfig,
    clicks: mpsc::UnboundedSender<ClickEvent>,
) -> Option<Arc<dyn NotificationChannel>> {
    match &config.channel {
        NotificationChannelType::None => None,
        NotificationChannelType::Desktop => Some(Arc::new(DesktopNotifier::new(Some(clicks)))),
        NotificationChannelType::Slack => {
            let webhook = config.slack_webhook.as_ref()?;
            if webhook.is_empty() {
                return None;
            }
            Some(Arc::new(SlackNotifier::new(webhook.clone())))
        }
    }
}
