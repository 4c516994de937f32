use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Args};

use crate::config::{Config, expand_path};
use crate::runner::{DryRunExecutor, Executor, SystemExecutor};
use crate::service::MountService;

// Global flags shared by both binaries and every subcommand.
//
//   -c / --config      Path to a config.toml file
//   --settings-dir     Directory holding config.toml and the operation log
//   --timeout          Per-command timeout in seconds
//   --no-color         Disable coloured terminal output
//   --dry-run          Print commands instead of running them
#[derive(Debug, Clone, Default, Args)]
pub struct CommonArgs {
    /// Path to a config.toml file
    #[arg(
        short = 'c',
        long,
        value_name = "PATH",
        env = "IMOUNT_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Settings directory (default: ~/.ios_mount_gui)
    #[arg(long, value_name = "DIR", env = "IMOUNT_SETTINGS_DIR", global = true)]
    pub settings_dir: Option<PathBuf>,

    /// Per-command timeout in seconds
    #[arg(long, value_name = "SECS", env = "IMOUNT_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Disable coloured terminal output
    #[arg(long = "no-color", action = ArgAction::SetTrue, env = "NO_COLOR", global = true)]
    pub no_color: bool,

    /// Print each command instead of running it
    #[arg(long = "dry-run", action = ArgAction::SetTrue, env = "IMOUNT_DRY_RUN", global = true)]
    pub dry_run: bool,
}

impl CommonArgs {
    pub fn config_path(&self) -> Option<PathBuf> {
        if let Some(config) = &self.config {
            return Some(expand_path(config));
        }

        self.settings_dir
            .as_ref()
            .map(|dir| expand_path(dir).join("config.toml"))
    }

    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(settings_dir) = &self.settings_dir {
            config.settings_dir = expand_path(settings_dir);
        }

        if let Some(timeout) = self.timeout {
            config.command_timeout_secs = timeout;
        }
    }

    /// Load the config file these flags point at, then apply the overrides.
    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config_path())?;
        self.apply_overrides(&mut config);
        Ok(config)
    }

    /// System executor, or the printing one under `--dry-run`.
    pub fn executor(&self, config: &Config) -> Arc<dyn Executor> {
        if self.dry_run {
            Arc::new(DryRunExecutor)
        } else {
            Arc::new(SystemExecutor::new(config.timeout()))
        }
    }

    pub fn service(&self, config: &Config) -> MountService {
        MountService::with_executor(config, self.executor(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn settings_dir_implies_config_path() {
        let args = CommonArgs {
            settings_dir: Some(PathBuf::from("/tmp/imount-settings")),
            ..CommonArgs::default()
        };
        assert_eq!(
            args.config_path(),
            Some(PathBuf::from("/tmp/imount-settings/config.toml"))
        );

        let args = CommonArgs {
            config: Some(PathBuf::from("/etc/imount.toml")),
            ..args
        };
        assert_eq!(args.config_path(), Some(PathBuf::from("/etc/imount.toml")));
        assert_eq!(CommonArgs::default().config_path(), None);
    }

    #[test]
    fn flags_override_file_values() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "command_timeout_secs = 10\nlog_capacity = 5\n",
        )
        .unwrap();

        let cli = Cli::try_parse_from([
            "imount",
            "--settings-dir",
            dir.path().to_str().unwrap(),
            "--timeout",
            "3",
        ])
        .unwrap();
        let config = cli.common.load_config().unwrap();
        assert_eq!(config.command_timeout_secs, 3);
        assert_eq!(config.log_capacity, 5);
        assert_eq!(config.settings_dir, dir.path());
    }

    #[test]
    fn boolean_flags() {
        let cli = Cli::try_parse_from(["imount", "--no-color", "--dry-run"]).unwrap();
        assert!(cli.common.no_color);
        assert!(cli.common.dry_run);
    }

    #[tokio::test]
    async fn dry_run_service_runs_nothing() {
        let dir = TempDir::new().unwrap();
        let args = CommonArgs {
            dry_run: true,
            ..CommonArgs::default()
        };
        let config = Config {
            settings_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let result = args.service(&config).pair_device().await;
        assert!(result.success);
        assert_eq!(result.stdout, "[dry-run] idevicepair pair\n");
    }
}
