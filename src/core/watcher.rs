//! State file watcher.
//!
//! The upstream application rewrites its state file many times during a single
//! save, so raw filesystem events are debounced into at most one trigger per
//! cooldown window before they reach the orchestrator.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Local;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::logging::LogThrottle;

use super::error::CoordinatorError;
use super::models::Trigger;

/// Minimum spacing between two accepted triggers.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Accepts an event only if the previous acceptance is older than the cooldown.
#[derive(Debug)]
pub struct Debouncer {
    cooldown: Duration,
    last_accepted: Option<Instant>,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_accepted: None,
        }
    }

    pub fn accept(&mut self, at: Instant) -> bool {
        if let Some(prev) = self.last_accepted {
            if at.saturating_duration_since(prev) <= self.cooldown {
                return false;
            }
        }
        self.last_accepted = Some(at);
        true
    }
}

/// Keeps the OS watch alive; dropping it stops event delivery.
pub struct ChangeWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    /// Watch `file` and send a debounced [`Trigger`] for each accepted change.
    ///
    /// The parent directory must exist. Files replaced by rename are still
    /// seen because the watch is on the directory, filtered by file name.
    pub fn start(
        file: &Path,
        cooldown: Duration,
        tx: mpsc::Sender<Trigger>,
    ) -> Result<Self, CoordinatorError> {
        let unavailable = |reason: String| CoordinatorError::WatcherUnavailable {
            path: file.to_path_buf(),
            reason,
        };

        let parent = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| unavailable("path has no parent directory".to_string()))?;
        if !parent.is_dir() {
            return Err(unavailable(format!(
                "directory {} does not exist",
                parent.display()
            )));
        }
        let file_name: OsString = file
            .file_name()
            .ok_or_else(|| unavailable("path has no file name".to_string()))?
            .to_os_string();

        let mut debouncer = Debouncer::new(cooldown);
        let suppressed_log = LogThrottle::new(Duration::from_secs(10));

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "State file watcher error");
                        return;
                    }
                };

                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                let touches_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if !touches_file {
                    return;
                }

                if !debouncer.accept(Instant::now()) {
                    if suppressed_log.should_log() {
                        debug!("State file change within cooldown, trigger suppressed");
                    }
                    return;
                }

                let trigger = Trigger::StateFileChanged { at: Local::now() };
                if let Err(e) = tx.try_send(trigger) {
                    debug!(error = %e, "Trigger channel unavailable, dropping trigger");
                }
            },
        )
        .map_err(|e| unavailable(e.to_string()))?;

        watcher
            .watch(parent, RecursiveMode::NonRecursive)
            .map_err(|e| unavailable(e.to_string()))?;

        info!(path = %file.display(), cooldown_secs = cooldown.as_secs(), "Watching state file");

        Ok(Self {
            path: file.to_path_buf(),
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
