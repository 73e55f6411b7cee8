//! Out-of-band full reimport.
//!
//! A forced reimport is handed to an external automation agent as one
//! natural-language task. It does not go through the import runner or its
//! guard: the agent is an independent process and is only launched here.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{info, warn};

use crate::config::AppConfig;

use super::error::CoordinatorError;

/// Build the task text for a full reimport.
pub fn compose_task(source_dir: &Path, vault: &Path, instructions: &str, extension: &str) -> String {
    format!(
        "{instructions}

FULL REIMPORT OF MEETING NOTES:
Source folder: {source}
Vault: {vault}

Process every .{extension} note in the source folder according to the instructions above, \
replacing anything created by earlier imports. Create or update files in the vault as needed. \
Report what you did.",
        instructions = instructions.trim(),
        source = source_dir.display(),
        vault = vault.display(),
        extension = extension,
    )
}

pub struct ReimportAgent {
    program: String,
    args: Vec<String>,
    source_dir: PathBuf,
    vault: PathBuf,
    instructions: String,
    extension: String,
}

impl ReimportAgent {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            program: config.agent.program.clone(),
            args: config.agent.args.clone(),
            source_dir: config.output_dir.clone(),
            vault: config.import.vault_path.clone(),
            instructions: config.import.instructions.clone(),
            extension: config.artifact_extension.clone(),
        }
    }

    pub fn task(&self) -> String {
        compose_task(&self.source_dir, &self.vault, &self.instructions, &self.extension)
    }

    /// Start the agent in the vault and return once it is running.
    ///
    /// Must be called from within a tokio runtime; a background task reaps
    /// the process and logs how it ended.
    pub fn launch(&self) -> Result<(), CoordinatorError> {
        if !self.vault.is_dir() {
            return Err(CoordinatorError::Agent(format!(
                "vault not found: {}",
                self.vault.display()
            )));
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(self.task())
            .current_dir(&self.vault)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| CoordinatorError::Agent(e.to_string()))?;

        info!(program = %self.program, pid = ?child.id(), "Reimport agent launched");

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => info!("Reimport agent finished"),
                Ok(status) => warn!(%status, "Reimport agent exited with failure"),
                Err(e) => warn!(error = %e, "Lost track of reimport agent"),
            }
        });

        Ok(())
    }
}
