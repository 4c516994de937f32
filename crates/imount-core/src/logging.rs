//! Diagnostic logging for both binaries.
//!
//! This is separate from the operation log in [`journal`](crate::journal):
//! tracing output goes to stderr and never to the settings directory.
//!
//! ## Environment Variables
//!
//! - `IMOUNT_LOG` or `RUST_LOG`: filter directive (e.g. `imount=debug,warn`)
//! - `IMOUNT_LOG_FORMAT`: output format (`pretty`, `compact`, `json`)
//!
//! ```bash
//! # See every spawned command
//! IMOUNT_LOG=imount=debug imount mount
//!
//! # JSON lines for the server
//! IMOUNT_LOG_FORMAT=json imount-server
//! ```

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Filter used when nothing is configured.
pub const DEFAULT_FILTER: &str = "imount=info,imount_core=info,warn";

/// Quieter default for the interactive CLI, whose output is the terminal UI.
pub const CLI_FILTER: &str = "warn";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line
    #[default]
    Pretty,
    /// Single line per event
    Compact,
    /// JSON lines
    Json,
}

impl LogFormat {
    /// Parse case-insensitively; anything unknown is `Pretty`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive
    pub filter: String,
    pub format: LogFormat,
    /// Emit span open/close events
    pub with_spans: bool,
    /// Include file and line
    pub with_file: bool,
    /// Include the module path
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::Pretty,
            with_spans: false,
            with_file: false,
            with_target: true,
        }
    }
}

impl LogConfig {
    /// Read `IMOUNT_LOG` / `RUST_LOG` / `IMOUNT_LOG_FORMAT`, falling back to
    /// `default_filter`.
    pub fn from_env_or(default_filter: &str) -> Self {
        Self::from_lookup(default_filter, |key| std::env::var(key).ok())
    }

    pub fn from_env() -> Self {
        Self::from_env_or(DEFAULT_FILTER)
    }

    fn from_lookup(default_filter: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lookup("IMOUNT_LOG")
            .or_else(|| lookup("RUST_LOG"))
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| default_filter.to_string());

        let format = lookup("IMOUNT_LOG_FORMAT")
            .map(|s| LogFormat::parse(&s))
            .unwrap_or_default();

        Self {
            filter,
            format,
            ..Default::default()
        }
    }

    /// Compact lines without targets, for terminal use.
    pub fn cli() -> Self {
        Self {
            format: LogFormat::Compact,
            with_target: false,
            ..Self::from_env_or(CLI_FILTER)
        }
    }
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: LogConfig) {
    let env_filter =
        EnvFilter::try_new(&config.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let span_events = if config.with_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_span_events(span_events)
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_target(config.with_target);

    let registry = tracing_subscriber::registry().with(env_filter);
    let _ = match config.format {
        LogFormat::Json => tracing::subscriber::set_global_default(registry.with(layer.json())),
        LogFormat::Compact => {
            tracing::subscriber::set_global_default(registry.with(layer.compact()))
        }
        LogFormat::Pretty => tracing::subscriber::set_global_default(registry.with(layer.pretty())),
    };
}
