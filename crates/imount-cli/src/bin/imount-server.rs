use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use imount_core::args::CommonArgs;
use imount_core::logging::{self, LogConfig};
use imount_core::server::run_server;
use imount_core::theme::Theme;
use tokio_util::sync::CancellationToken;

// ── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "imount-server",
    version,
    about = "imount REST backend: the mount operations as a local JSON API"
)]
struct ServerCli {
    #[command(flatten)]
    common: CommonArgs,

    /// Listen address (default from config: 127.0.0.1:5000)
    #[arg(long, value_name = "ADDR", env = "IMOUNT_LISTEN")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();
    logging::init(LogConfig::from_env());
    let theme = Theme::new(cli.common.no_color);

    let mut config = cli.common.load_config()?;
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    let addr: SocketAddr = config
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen))?;

    let service = cli.common.service(&config);

    println!(
        "{}",
        theme.icon_ok(&format!(
            "imount-server listening on {}",
            theme.info(&format!("http://{}", addr))
        ))
    );
    println!(
        "{}",
        theme.label_value("Operation log", &config.operation_log().path().display().to_string())
    );
    if cli.common.dry_run {
        println!("{}", theme.icon_warn("Dry run: commands are printed, not executed"));
    }

    // Graceful shutdown on Ctrl+C (all platforms).
    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_for_signal.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_for_term = cancel.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                cancel_for_term.cancel();
            }
        });
    }

    run_server(service, addr, cancel).await?;
    println!("{}", theme.muted("Server stopped"));
    Ok(())
}
