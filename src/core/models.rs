use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::error::JobFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Sync,
    Import,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Import => "import",
        }
    }

    /// Title used for every notification about this kind of job.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Sync => "Granola Sync",
            Self::Import => "Obsidian Import",
        }
    }

    /// Summary used when the tool output does not carry one.
    pub fn fallback_summary(&self) -> &'static str {
        match self {
            Self::Sync => "Sync completed",
            Self::Import => "Import finished",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerOrigin {
    Manual,
    Automatic,
}

/// One attempt to run an external job.
/// Window of the weekly catch-up sync.
pub const WEEK_DAYS: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub kind: JobKind,
    pub args: Vec<String>,
    pub origin: TriggerOrigin,
}

impl JobRequest {
    pub fn sync(days: Option<u32>, force: bool, origin: TriggerOrigin) -> Self {
        let mut args = Vec::new();
        if let Some(days) = days {
            args.push("--days".to_string());
            args.push(days.to_string());
        }
        if force {
            args.push("--force".to_string());
        }
        Self {
            kind: JobKind::Sync,
            args,
            origin,
        }
    }

    /// Refetch the last week, replacing notes already on disk.
    pub fn weekly_sync(origin: TriggerOrigin) -> Self {
        Self::sync(Some(WEEK_DAYS), true, origin)
    }

    pub fn import(force: bool, origin: TriggerOrigin) -> Self {
        let args = if force {
            vec!["--force".to_string()]
        } else {
            Vec::new()
        };
        Self {
            kind: JobKind::Import,
            args,
            origin,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.origin == TriggerOrigin::Manual
    }
}

/// Result of one external job execution.
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub run_id: String,
    pub kind: JobKind,
    /// `None` when the tool exited successfully.
    pub failure: Option<JobFailure>,
    /// Combined stdout and stderr.
    pub output: String,
    pub summary: String,
    pub elapsed: Duration,
    pub finished_at: DateTime<Local>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Events that can start a job without a user command.
#[derive(Debug, Clone)]
pub enum Trigger {
    StateFileChanged { at: DateTime<Local> },
}
