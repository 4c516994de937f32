mod render;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use imount_core::args::CommonArgs;
use imount_core::config::Config;
use imount_core::doctor;
use imount_core::logging::{self, LogConfig};
use imount_core::service::{MountAppRequest, MountRequest, MountService};
use imount_core::theme::Theme;
use imount_core::worker;
use serde_json::json;

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "imount",
    version,
    about = "Mount an iOS device's filesystem over FUSE"
)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Check that the connected device is paired
    Check,
    /// Pair with the connected device
    Pair,
    /// Mount the device's media partition
    Mount {
        /// Mount point (default: ~/iPhone)
        path: Option<String>,
        /// Mount read-only
        #[arg(long)]
        read_only: bool,
    },
    /// Unmount the device
    Unmount {
        /// Mount point (default: ~/iPhone)
        path: Option<String>,
    },
    /// Validate pairing, pair if needed, then mount
    Connect {
        /// Mount point (default: ~/iPhone)
        path: Option<String>,
        /// Mount read-only
        #[arg(long)]
        read_only: bool,
    },
    /// Show device name, model, iOS version and storage
    Info {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Open the mount point in the file manager
    Open {
        /// Mount point (default: ~/iPhone)
        path: Option<String>,
    },
    /// Report whether the mount point is mounted (exit 1 if not)
    Status {
        /// Mount point (default: ~/iPhone)
        path: Option<String>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// List installed apps that share documents
    Apps {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Mount one app's Documents folder
    MountApp {
        /// Bundle identifier (com.example.app) or a name listed by `imount apps`
        app: String,
        /// Display name used for the default folder
        #[arg(long)]
        name: Option<String>,
        /// Mount point (default: ~/iPhone_Apps/<name>)
        path: Option<String>,
    },
    /// List a directory on the mounted device
    Browse {
        /// Directory (default: ~/iPhone)
        path: Option<String>,
        /// Include dotfiles
        #[arg(long, short)]
        all: bool,
    },
    /// Show the operation log
    Logs {
        /// Newest entries to show
        #[arg(long, short = 'n', default_value_t = 20)]
        limit: usize,
        /// Output JSON
        #[arg(long)]
        json: bool,
        /// Delete the log instead
        #[arg(long, conflicts_with_all = ["json"])]
        clear: bool,
    },
    /// Check that the required tools are installed
    Doctor {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or write the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn mount_request(path: Option<String>, read_only: bool) -> MountRequest {
    MountRequest {
        mount_point: path,
        read_only: read_only.then_some(true),
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(LogConfig::cli());
    let theme = Theme::new(cli.common.no_color);

    let config = cli.common.load_config()?;
    let service = cli.common.service(&config);
    tracing::debug!(?config, dry_run = cli.common.dry_run, "loaded configuration");

    let ok = run(cli, &config, &service, &theme).await?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

async fn run(cli: Cli, config: &Config, service: &MountService, theme: &Theme) -> Result<bool> {
    let ok = match cli.command {
        Commands::Check => {
            let service = service.clone();
            let task = worker::dispatch(async move { service.check_device().await });
            render::drive(theme, "Checking device pairing", task).await.0
        }
        Commands::Pair => {
            let service = service.clone();
            let task = worker::dispatch(async move { service.pair_device().await });
            render::drive(theme, "Pairing device (confirm on the device)", task)
                .await
                .0
        }
        Commands::Mount { path, read_only } => {
            let request = mount_request(path, read_only);
            let title = format!(
                "Mounting at {}",
                service.resolve_mount_point(request.mount_point.as_deref()).display()
            );
            let service = service.clone();
            let task = worker::dispatch(async move { service.mount(&request).await });
            render::drive(theme, &title, task).await.0
        }
        Commands::Unmount { path } => {
            let request = mount_request(path, false);
            let service = service.clone();
            let task = worker::dispatch(async move { service.unmount(&request).await });
            render::drive(theme, "Unmounting", task).await.0
        }
        Commands::Connect { path, read_only } => {
            let request = mount_request(path, read_only);
            let service = service.clone();
            let task = worker::dispatch(async move { service.one_click_mount(&request).await });
            render::drive(theme, "One-click mount", task).await.0
        }
        Commands::Info { json } => {
            if json {
                let value = match service.device_info().await {
                    Ok(info) => serde_json::to_value(info)?,
                    Err(e) => json!({ "error": e.to_string() }),
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
                value.get("error").is_none()
            } else {
                let service = service.clone();
                let task = worker::dispatch(async move { service.device_info().await });
                render::drive(theme, "Reading device info", task).await.0
            }
        }
        Commands::Open { path } => {
            let request = mount_request(path, false);
            let service = service.clone();
            let task = worker::dispatch(async move { service.open_folder(&request).await });
            render::drive(theme, "Opening folder", task).await.0
        }
        Commands::Status { path, json } => {
            let request = mount_request(path, false);
            let mount_point = service.resolve_mount_point(request.mount_point.as_deref());
            let mounted = service.is_mounted(&request);
            if json {
                println!(
                    "{}",
                    json!({ "mounted": mounted, "mount_point": mount_point })
                );
            } else if mounted {
                println!("{}", theme.icon_ok(&format!("Mounted at {}", mount_point.display())));
            } else {
                println!(
                    "{}",
                    theme.icon_warn(&format!("Not mounted: {}", mount_point.display()))
                );
            }
            mounted
        }
        Commands::Apps { json } => {
            if json {
                let outcome = service.list_apps().await;
                let value = if outcome.result.success {
                    json!({
                        "success": true,
                        "apps": outcome.raw_lines(),
                        "entries": outcome.listing.entries,
                    })
                } else {
                    json!({ "success": false, "error": outcome.result.output() })
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
                outcome.result.success
            } else {
                let service = service.clone();
                let task = worker::dispatch(async move { service.list_apps().await });
                render::drive(theme, "Listing apps", task).await.0
            }
        }
        Commands::MountApp { app, name, path } => {
            let resolved = match service.resolve_app(&app).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    eprintln!("{}", theme.icon_fail(&e.to_string()));
                    return Ok(false);
                }
            };
            let bundle_id = resolved.bundle_id.clone().unwrap_or(app);
            let request = MountAppRequest {
                bundle_id: Some(bundle_id.clone()),
                name: name.or(resolved.name),
                mount_point: path,
            };
            let title = format!(
                "Mounting {} at {}",
                bundle_id,
                service.app_mount_point(&request, &bundle_id).display()
            );
            let service = service.clone();
            let task = worker::dispatch(async move { service.mount_app(&request).await });
            render::drive(theme, &title, task).await.0
        }
        Commands::Browse { path, all } => match service.browse(path.as_deref(), all).await {
            Ok(entries) => {
                for entry in &entries {
                    if entry.is_dir {
                        println!("{}", theme.info(&entry.label()));
                    } else {
                        println!("{}", entry.label());
                    }
                }
                if entries.is_empty() {
                    println!("{}", theme.muted("(empty)"));
                }
                true
            }
            Err(e) => {
                eprintln!("{}", theme.icon_fail(&e.to_string()));
                false
            }
        },
        Commands::Logs { limit, json, clear } => {
            if clear {
                service.clear_logs().await?;
                println!("{}", theme.icon_ok("Operation log cleared"));
            } else {
                let entries = service
                    .recent_logs(limit)
                    .await
                    .context("Failed to read the operation log")?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&entries)?);
                } else if entries.is_empty() {
                    println!("{}", theme.muted("No operations logged yet"));
                } else {
                    for entry in &entries {
                        println!("{}", render::log_line(theme, entry));
                    }
                }
            }
            true
        }
        Commands::Doctor { json } => {
            let statuses = doctor::check_tools();
            if json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            } else {
                println!("{}", theme.heading("Required tools"));
                for status in &statuses {
                    let label = status.tool.to_string();
                    let line = match &status.path {
                        Some(path) => theme.icon_ok(&format!("{:<12} {}", label, path.display())),
                        None if status.tool.optional() => theme.icon_warn(&format!(
                            "{:<12} not found (optional, install {})",
                            label,
                            status.tool.package()
                        )),
                        None => theme.icon_fail(&format!(
                            "{:<12} not found (install {})",
                            label,
                            status.tool.package()
                        )),
                    };
                    println!("  {}", line);
                }
            }
            doctor::all_required_found(&statuses)
        }
        Commands::Config { action } => match action {
            ConfigCommands::Show => {
                print!("{}", toml::to_string_pretty(config)?);
                true
            }
            ConfigCommands::Init { force } => {
                let path = cli
                    .common
                    .config_path()
                    .unwrap_or_else(|| config.settings_dir.join("config.toml"));
                if path.exists() && !force {
                    println!(
                        "{}",
                        theme.icon_warn(&format!(
                            "{} already exists (use --force to overwrite)",
                            path.display()
                        ))
                    );
                    false
                } else {
                    let written = config.save(Some(path))?;
                    println!("{}", theme.icon_ok(&format!("Wrote {}", written.display())));
                    true
                }
            }
        },
    };
    Ok(ok)
}
