//! Derived status of the artifact directory.
//!
//! A [`StatusSnapshot`] is always computed from scratch and published as a
//! whole through [`StatusBoard`]; readers never see a partially updated one.
//! The rendered [`StatusView`] is refreshed separately on a timer so the
//! "last sync" age keeps moving between runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Number of artifacts listed in the recent menu.
pub const RECENT_LIMIT: usize = 5;

/// Display length for menu entries.
pub const MENU_NAME_CHARS: usize = 40;

/// Display length for notification text.
pub const NOTIFICATION_NAME_CHARS: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub count: usize,
    /// Newest first, at most [`RECENT_LIMIT`] entries.
    pub recent: Vec<PathBuf>,
    pub most_recent: Option<PathBuf>,
    pub last_run: Option<DateTime<Local>>,
}

/// Whether `path` is an existing `extension` file directly inside `dir`.
///
/// Both sides are canonicalized, so `..` segments and symlinks leading out of
/// `dir` are rejected.
pub fn is_artifact(dir: &Path, extension: &str, path: &Path) -> bool {
    let matches = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    if !matches {
        return false;
    }
    match (path.canonicalize(), dir.canonicalize()) {
        (Ok(path), Ok(dir)) => path.parent() == Some(dir.as_path()) && path.is_file(),
        _ => false,
    }
}

/// Scan `dir` for artifacts with `extension`.
///
/// A missing or unreadable directory yields an empty snapshot. Performs
/// blocking I/O.
pub fn recompute(
    dir: &Path,
    extension: &str,
    last_run: Option<DateTime<Local>>,
) -> StatusSnapshot {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Artifact directory not readable");
            return StatusSnapshot {
                last_run,
                ..Default::default()
            };
        }
    };

    let mut artifacts: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let path = entry.path();
            let matches = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if !matches {
                return None;
            }
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((meta.modified().unwrap_or(SystemTime::UNIX_EPOCH), path))
        })
        .collect();

    // Newest first; name breaks ties so equal mtimes list deterministically.
    artifacts.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    StatusSnapshot {
        count: artifacts.len(),
        most_recent: artifacts.first().map(|(_, p)| p.clone()),
        recent: artifacts
            .into_iter()
            .take(RECENT_LIMIT)
            .map(|(_, p)| p)
            .collect(),
        last_run,
    }
}

/// Human label for an artifact path: "2024-05-01-team_sync.md" becomes
/// "2024 05 01 Team Sync".
pub fn display_name(path: &Path, max_chars: usize) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = stem
        .replace(['-', '_'], " ")
        .split(' ')
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ");

    if name.chars().count() > max_chars {
        let cut: String = name.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        name
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Relative age of `at` as seen from `now`.
pub fn format_relative(at: Option<DateTime<Local>>, now: DateTime<Local>) -> String {
    let Some(at) = at else {
        return "Never".to_string();
    };

    let secs = (now - at).num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3_600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3_600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

/// One openable entry of the recent list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEntry {
    pub label: String,
    pub path: PathBuf,
}

/// Display lines for the status menu.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub status_line: String,
    pub last_sync_line: String,
    pub recent: Vec<RecentEntry>,
}

impl StatusView {
    pub fn render(snapshot: &StatusSnapshot, now: DateTime<Local>) -> Self {
        let noun = if snapshot.count == 1 { "note" } else { "notes" };
        Self {
            status_line: format!("{} {}", snapshot.count, noun),
            last_sync_line: format!("Last sync: {}", format_relative(snapshot.last_run, now)),
            recent: snapshot
                .recent
                .iter()
                .map(|path| RecentEntry {
                    label: display_name(path, MENU_NAME_CHARS),
                    path: path.clone(),
                })
                .collect(),
        }
    }
}

/// One published state: the snapshot, the view rendered from it and the
/// number of snapshots published before it.
#[derive(Debug, Clone)]
pub struct BoardState {
    pub snapshot: Arc<StatusSnapshot>,
    pub view: StatusView,
    pub revision: u64,
}

/// Shared holder of the current snapshot and its rendered view.
///
/// Both live in one `watch` channel, so job tasks publishing and the status
/// tick re-rendering serialize on the same lock and a view is never paired
/// with a snapshot it was not rendered from.
#[derive(Clone)]
pub struct StatusBoard {
    state: Arc<watch::Sender<BoardState>>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        let snapshot = Arc::new(StatusSnapshot::default());
        let view = StatusView::render(&snapshot, Local::now());
        let (state, _) = watch::channel(BoardState {
            snapshot,
            view,
            revision: 0,
        });
        Self {
            state: Arc::new(state),
        }
    }

    /// Replace the current snapshot and re-render the view.
    pub fn publish(&self, snapshot: StatusSnapshot) -> Arc<StatusSnapshot> {
        let snapshot = Arc::new(snapshot);
        self.state.send_modify(|state| {
            state.view = StatusView::render(&snapshot, Local::now());
            state.snapshot = snapshot.clone();
            state.revision += 1;
        });
        snapshot
    }

    /// Re-render the view from the stored snapshot. Called on the status tick.
    pub fn refresh_view(&self, now: DateTime<Local>) {
        self.state.send_if_modified(|state| {
            let fresh = StatusView::render(&state.snapshot, now);
            if state.view == fresh {
                false
            } else {
                state.view = fresh;
                true
            }
        });
    }

    /// Snapshot, view and revision from the same publication.
    pub fn read(&self) -> BoardState {
        self.state.borrow().clone()
    }

    pub fn current(&self) -> Arc<StatusSnapshot> {
        self.state.borrow().snapshot.clone()
    }

    pub fn view(&self) -> StatusView {
        self.state.borrow().view.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<BoardState> {
        self.state.subscribe()
    }

    /// Number of snapshots published so far.
    pub fn revision(&self) -> u64 {
        self.state.borrow().revision
    }
}
