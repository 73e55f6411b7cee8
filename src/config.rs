//! Layered configuration.
//!
//! Built-in defaults, then the TOML file, then `BREAKFASTD_*` environment
//! variables (nested keys separated by `__`), then command line overrides.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::core::opener::default_opener;

/// Environment variable through which the tools learn the output directory.
pub const OUTPUT_DIR_ENV: &str = "GRANOLA_OUTPUT_DIR";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "BREAKFASTD_CONFIG";

const ENV_PREFIX: &str = "BREAKFASTD_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory the sync tool writes notes into.
    pub output_dir: PathBuf,
    pub artifact_extension: String,
    /// Upstream application state file whose changes trigger a sync.
    pub state_file: PathBuf,
    pub rpc_bind: SocketAddr,
    pub watch_cooldown_secs: u64,
    pub status_tick_secs: u64,
    pub opener: String,
    pub verbose: bool,
    pub json_logs: bool,
    pub sync: SyncConfig,
    pub import: ImportConfig,
    pub agent: AgentConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    /// Written by the sync tool itself; only opened by `open.log`.
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub enabled: bool,
    pub auto_import_on_sync: bool,
    pub vault_path: PathBuf,
    /// Free text handed to the agent on a full reimport.
    pub instructions: String,
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelType {
    None,
    Desktop,
    Slack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub channel: NotificationChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_webhook: Option<String>,
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for AppConfig {
    fn default() -> Self {
        let home = home();
        Self {
            output_dir: home.join("Documents/Granola Notes"),
            artifact_extension: "md".to_string(),
            state_file: home.join("Library/Application Support/Granola/cache-v3.json"),
            rpc_bind: SocketAddr::from(([127, 0, 0, 1], 7423)),
            watch_cooldown_secs: 30,
            status_tick_secs: 60,
            opener: default_opener().to_string(),
            verbose: false,
            json_logs: false,
            sync: SyncConfig {
                program: "node".to_string(),
                args: vec!["index.js".to_string()],
                timeout_secs: 300,
                log_file: home.join("Library/Logs/granola-sync.log"),
            },
            import: ImportConfig {
                enabled: false,
                auto_import_on_sync: false,
                vault_path: home.join("Obsidian"),
                instructions: String::new(),
                program: "node".to_string(),
                args: vec!["obsidian-import.js".to_string()],
                timeout_secs: 300,
                log_file: home.join("Library/Logs/breakfast-import.log"),
            },
            agent: AgentConfig {
                program: "claude".to_string(),
                args: vec![
                    "--print".to_string(),
                    "--dangerously-skip-permissions".to_string(),
                ],
            },
            notifications: NotificationConfig {
                channel: NotificationChannelType::Desktop,
                slack_webhook: None,
            },
        }
    }
}

impl AppConfig {
    /// Load the configuration, applying `overrides` (typically CLI args) last.
    pub fn new<T: Serialize>(overrides: Option<&T>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(config_path()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        if let Some(overrides) = overrides {
            figment = figment.merge(Serialized::defaults(overrides));
        }

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: AppConfig = figment
            .extract()
            .context("Failed to load configuration")?;
        Ok(config.expand_paths())
    }

    /// Resolve a leading `~` in every configured path.
    fn expand_paths(mut self) -> Self {
        self.output_dir = expand_home(&self.output_dir);
        self.state_file = expand_home(&self.state_file);
        self.sync.log_file = expand_home(&self.sync.log_file);
        self.import.vault_path = expand_home(&self.import.vault_path);
        self.import.log_file = expand_home(&self.import.log_file);
        self
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

/// Location of the TOML config file.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| home().join(".config"))
        .join("breakfastd/config.toml")
}

pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home().join(rest),
        Err(_) => path.to_path_buf(),
    }
}
