use std::path::PathBuf;
use std::sync::{LazyLock, Mutex};

use regex::Regex;

use super::{NotificationEvent, NotificationPayload};
use crate::core::error::{MAX_ERROR_CHARS, truncate_chars};
use crate::core::models::{JobKind, JobOutcome};
use crate::core::snapshot::{NOTIFICATION_NAME_CHARS, StatusSnapshot, display_name};

/// "0 exported" as a count on its own, so "10 exported" still counts as new work.
static ZERO_EXPORTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^0-9])0 exported").expect("zero-export regex is valid"));

/// Whether a sync summary reports newly written artifacts.
///
/// Keyword match on the sync tool's "N exported" wording.
pub fn reports_new_artifacts(summary: &str) -> bool {
    summary.contains("exported") && !ZERO_EXPORTED.is_match(summary)
}

/// Turns job outcomes into notifications and resolves clicks on them.
///
/// Clicks can arrive long after the run finished, or without their payload,
/// so the last artifact any successful run produced is kept as a fallback.
#[derive(Debug, Default)]
pub struct NotificationCorrelator {
    last_artifact: Mutex<Option<PathBuf>>,
}

impl NotificationCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_result(&self, outcome: &JobOutcome, snapshot: &StatusSnapshot) -> NotificationEvent {
        let title = outcome.kind.title();

        if let Some(failure) = &outcome.failure {
            let body = truncate_chars(&failure.to_string(), MAX_ERROR_CHARS);
            return NotificationEvent::plain(title, "Error", body);
        }

        if let Some(newest) = &snapshot.most_recent {
            self.remember(newest.clone());

            if outcome.kind == JobKind::Sync && reports_new_artifacts(&outcome.summary) {
                return NotificationEvent {
                    title: title.to_string(),
                    subtitle: outcome.summary.clone(),
                    body: display_name(newest, NOTIFICATION_NAME_CHARS),
                    action_label: Some("Open".to_string()),
                    payload: Some(NotificationPayload {
                        artifact: newest.clone(),
                    }),
                };
            }
        }

        NotificationEvent::plain(title, "Complete", outcome.summary.clone())
    }

    /// Informational notice for a manual request that hit a busy guard.
    pub fn already_running(&self, kind: JobKind) -> NotificationEvent {
        let body = match kind {
            JobKind::Sync => "Sync already in progress...",
            JobKind::Import => "Import already in progress...",
        };
        NotificationEvent::plain(kind.title(), "", body)
    }

    pub fn resolve_click(&self, payload: Option<&NotificationPayload>) -> Option<PathBuf> {
        match payload {
            Some(payload) => Some(payload.artifact.clone()),
            None => self.last_artifact(),
        }
    }

    pub fn last_artifact(&self) -> Option<PathBuf> {
        self.last_artifact
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn remember(&self, artifact: PathBuf) {
        *self
            .last_artifact
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(artifact);
    }
}
