use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::commands::MountOptions;
use crate::journal::{self, OperationLog};
use crate::runner;

/// Settings directory name under `$HOME`.
pub const SETTINGS_DIR_NAME: &str = ".ios_mount_gui";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Holds `config.toml` and `operation_log.json`
    pub settings_dir: PathBuf,
    /// Used when a request names no mount point
    pub default_mount_point: PathBuf,
    /// Parent of per-app document mounts
    pub apps_mount_root: PathBuf,
    /// Per-command timeout
    pub command_timeout_secs: u64,
    /// Entries kept in the operation log
    pub log_capacity: usize,
    /// REST server listen address
    pub listen: String,
    /// Mount the media partition read-only
    pub read_only: bool,
    /// Pass `-o allow_other` to ifuse
    pub allow_other: bool,
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

impl Default for Config {
    fn default() -> Self {
        let home = home_dir();
        Self {
            settings_dir: home.join(SETTINGS_DIR_NAME),
            default_mount_point: home.join("iPhone"),
            apps_mount_root: home.join("iPhone_Apps"),
            command_timeout_secs: runner::DEFAULT_TIMEOUT_SECS,
            log_capacity: journal::DEFAULT_CAPACITY,
            listen: "127.0.0.1:5000".to_string(),
            read_only: false,
            allow_other: true,
        }
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        home_dir().join(SETTINGS_DIR_NAME).join("config.toml")
    }

    /// Load configuration from file, falling back to defaults when absent.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            Config::default()
        };
        config.expand_paths();
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save(&self, path: Option<PathBuf>) -> Result<PathBuf> {
        let config_path = path.unwrap_or_else(|| self.settings_dir.join("config.toml"));

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        Ok(config_path)
    }

    /// Resolve `~` in every path field.
    pub fn expand_paths(&mut self) {
        self.settings_dir = expand_path(&self.settings_dir);
        self.default_mount_point = expand_path(&self.default_mount_point);
        self.apps_mount_root = expand_path(&self.apps_mount_root);
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }

    pub fn mount_options(&self) -> MountOptions {
        MountOptions {
            read_only: self.read_only,
            allow_other: self.allow_other,
        }
    }

    pub fn operation_log(&self) -> OperationLog {
        OperationLog::in_dir(&self.settings_dir, self.log_capacity)
    }
}

/// Expand a leading `~` using the current user's home directory.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}
