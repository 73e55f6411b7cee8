use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::error::CoordinatorError;

/// Platform command that opens a file or folder with its default application.
pub fn default_opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

/// Hands paths to the desktop opener without waiting for it.
#[derive(Debug, Clone)]
pub struct Opener {
    program: String,
}

impl Opener {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn open(&self, path: &Path) -> Result<(), CoordinatorError> {
        let fail = |reason: String| CoordinatorError::Open {
            path: path.to_path_buf(),
            reason,
        };

        if !path.exists() {
            return Err(fail("no such file or directory".to_string()));
        }

        Command::new(&self.program)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| fail(e.to_string()))?;

        debug!(program = %self.program, path = %path.display(), "Opened path");
        Ok(())
    }
}
