use std::path::PathBuf;

use thiserror::Error;

use super::models::JobKind;

/// Maximum length of failure text carried into notifications.
pub const MAX_ERROR_CHARS: usize = 100;

/// Why an external job did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobFailure {
    #[error("timed out")]
    Timeout,

    #[error("{detail}")]
    ProcessFailure { code: Option<i32>, detail: String },

    #[error("{0}")]
    Infrastructure(String),
}

impl JobFailure {
    pub fn process(code: Option<i32>, detail: &str) -> Self {
        let detail = if detail.trim().is_empty() {
            "Unknown error".to_string()
        } else {
            truncate_chars(detail.trim(), MAX_ERROR_CHARS)
        };
        Self::ProcessFailure { code, detail }
    }

    pub fn infrastructure(err: impl ToString) -> Self {
        Self::Infrastructure(truncate_chars(&err.to_string(), MAX_ERROR_CHARS))
    }
}

/// Errors returned by orchestrator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{0} already running")]
    AlreadyRunning(JobKind),

    #[error("import is disabled in the configuration")]
    ImportDisabled,

    #[error("cannot watch {path}: {reason}")]
    WatcherUnavailable { path: PathBuf, reason: String },

    #[error("failed to launch reimport agent: {0}")]
    Agent(String),

    #[error("failed to open {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("{0} is not a note in the output directory")]
    NotAnArtifact(PathBuf),
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
    }

    #[test]
    fn process_failure_falls_back_on_empty_stderr() {
        assert_eq!(
            JobFailure::process(Some(1), "  \n").to_string(),
            "Unknown error"
        );
        let long = "x".repeat(250);
        match JobFailure::process(Some(2), &long) {
            JobFailure::ProcessFailure { code, detail } => {
                assert_eq!(code, Some(2));
                assert_eq!(detail.len(), MAX_ERROR_CHARS);
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }
}
