use anyhow::Result;
use async_trait::async_trait;
use notify_rust::{Notification, NotificationHandle};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ClickEvent, NotificationChannel, NotificationEvent};

/// Invoked by clicking the notification body. Servers don't render it as a button.
const DEFAULT_ACTION: &str = "default";
/// The explicit "Open" button.
const OPEN_ACTION: &str = "open";

/// Desktop notifications through the platform notification center.
///
/// On freedesktop systems the "Open" action is awaited on the blocking pool
/// and reported back as a [`ClickEvent`]. Elsewhere clicks have to come in
/// through the RPC `notification.click` method.
pub struct DesktopNotifier {
    clicks: Option<mpsc::UnboundedSender<ClickEvent>>,
}

impl DesktopNotifier {
    pub fn new(clicks: Option<mpsc::UnboundedSender<ClickEvent>>) -> Self {
        #[cfg(target_os = "macos")]
        {
            // Without a preset bundle id the first notification runs an
            // AppleScript lookup that never returns in a background daemon.
            let _ = notify_rust::set_application("com.apple.Terminal");
        }
        Self { clicks }
    }
}

#[async_trait]
impl NotificationChannel for DesktopNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let event = event.clone();
        let clicks = self.clicks.clone();
        // show() is synchronous and waiting for an action blocks until the
        // notification is closed, so neither may run on the async workers.
        tokio::task::spawn_blocking(move || show(event, clicks));
        Ok(())
    }
}

fn show(event: NotificationEvent, clicks: Option<mpsc::UnboundedSender<ClickEvent>>) {
    let mut notification = Notification::new();
    notification.summary(&event.title);

    #[cfg(target_os = "macos")]
    {
        notification.subtitle(&event.subtitle).body(&event.body);
    }
    #[cfg(not(target_os = "macos"))]
    {
        let body = if event.subtitle.is_empty() {
            event.body.clone()
        } else {
            format!("{}\n{}", event.subtitle, event.body)
        };
        notification.body(&body);
    }

    if let Some(label) = &event.action_label {
        for (id, text) in actions(label) {
            notification.action(id, text);
        }
    }

    match notification.show() {
        Ok(handle) => {
            info!(title = %event.title, body = %event.body, "Desktop notification sent");
            if event.action_label.is_some() {
                if let Some(clicks) = clicks {
                    await_click(handle, event, clicks);
                }
            }
        }
        Err(e) => {
            warn!(title = %event.title, error = %e, "Desktop notification failed");
        }
    }
}

/// Body click plus one labelled button; only the button carries the label.
fn actions(label: &str) -> [(&'static str, &str); 2] {
    [(DEFAULT_ACTION, ""), (OPEN_ACTION, label)]
}

#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
fn opens_artifact(action: &str) -> bool {
    action == DEFAULT_ACTION || action == OPEN_ACTION
}

#[cfg(all(unix, not(target_os = "macos")))]
fn await_click(
    handle: NotificationHandle,
    event: NotificationEvent,
    clicks: mpsc::UnboundedSender<ClickEvent>,
) {
    let payload = event.payload;
    handle.wait_for_action(move |action| {
        if opens_artifact(action) {
            debug!(action, "Notification action invoked");
            let _ = clicks.send(ClickEvent { payload });
        }
    });
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn await_click(
    _handle: NotificationHandle,
    event: NotificationEvent,
    _clicks: mpsc::UnboundedSender<ClickEvent>,
) {
    debug!(title = %event.title, "Notification actions are not reported on this platform");
}
