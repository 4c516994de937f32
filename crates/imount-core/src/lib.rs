// ── imount Core Library ──────────────────────────────────────────────────────
//
// Everything both front ends share: building and running the external
// tools, parsing their output, the operation log, mount-point state, the
// REST API, configuration, logging and terminal styling.

pub mod args;
pub mod commands;
pub mod config;
pub mod device;
pub mod doctor;
pub mod error;
pub mod journal;
pub mod logging;
pub mod mount;
pub mod parser;
pub mod runner;
pub mod server;
pub mod service;
pub mod testing;
pub mod theme;
pub mod worker;

// Re-export the types front ends touch most at crate root for convenience
pub use commands::CommandLine;
pub use config::Config;
pub use error::ServiceError;
pub use runner::{CommandResult, DryRunExecutor, Executor, SystemExecutor};
pub use service::{MountAppRequest, MountRequest, MountService};
