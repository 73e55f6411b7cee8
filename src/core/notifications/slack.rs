use super::{NotificationChannel, NotificationEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn format_message(&self, event: &NotificationEvent) -> serde_json::Value {
        let header = if event.subtitle.is_empty() {
            event.title.clone()
        } else {
            format!("{}: {}", event.title, event.subtitle)
        };

        let mut blocks = vec![
            json!({
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": header,
                    "emoji": true
                }
            }),
            json!({
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": event.body
                }
            }),
        ];

        // Slack cannot open local files, so the artifact is shown rather than linked.
        if let Some(payload) = &event.payload {
            blocks.push(json!({
                "type": "context",
                "elements": [
                    {
                        "type": "mrkdwn",
                        "text": format!("*Note:* `{}`", payload.artifact.display())
                    }
                ]
            }));
        }

        json!({ "blocks": blocks })
    }
}

#[async_trait]
impl NotificationChannel for SlackNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let payload = self.format_message(event);
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach Slack webhook")?
            .error_for_status()
            .context("Slack webhook rejected notification")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::notifications::NotificationPayload;
    use std::path::PathBuf;

    #[test]
    fn message_includes_artifact_context() {
        let notifier = SlackNotifier::new("https://hooks.example.invalid".to_string());
        let event = NotificationEvent {
            title: "Granola Sync".to_string(),
            subtitle: "Sync complete: 1 exported, 0 skipped".to_string(),
            body: "2024 03 04 Design Review".to_string(),
            action_label: Some("Open".to_string()),
            payload: Some(NotificationPayload {
                artifact: PathBuf::from("/notes/2024-03-04-design-review.md"),
            }),
        };

        let message = notifier.format_message(&event);
        let blocks = message["blocks"].as_array().unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0]["text"]["text"],
            "Granola Sync: Sync complete: 1 exported, 0 skipped"
        );
        assert!(
            blocks[2]["elements"][0]["text"]
                .as_str()
                .unwrap()
                .contains("design-review.md")
        );
    }

    #[test]
    fn plain_message_has_no_context_block() {
        let notifier = SlackNotifier::new("https://hooks.example.invalid".to_string());
        let event = NotificationEvent::plain("Obsidian Import", "", "Import already in progress...");
        let message = notifier.format_message(&event);
        assert_eq!(message["blocks"].as_array().unwrap().len(), 2);
        assert_eq!(message["blocks"][0]["text"]["text"], "Obsidian Import");
    }
}
