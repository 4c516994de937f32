//! The operations both front ends expose.
//!
//! Each operation that runs a tool writes exactly one entry to the
//! operation log and hands back what the tool produced.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::commands::{self, CommandLine, MountOptions};
use crate::config::{Config, expand_path};
use crate::device::{self, DeviceInfo};
use crate::error::{Result, ServiceError};
use crate::journal::{LogEntry, OperationLog, Status};
use crate::mount::{self, DirEntry};
use crate::parser::{self, AppListing};
use crate::runner::{CommandResult, Executor, SystemExecutor};
use crate::worker::CANCELLED;

/// Names written to the operation log.
pub mod ops {
    pub const CHECK_DEVICE: &str = "Check Device";
    pub const PAIR_DEVICE: &str = "Pair Device";
    pub const MOUNT_DEVICE: &str = "Mount Device";
    pub const UNMOUNT_DEVICE: &str = "Unmount Device";
    pub const ONE_CLICK_MOUNT: &str = "One-Click Mount";
    pub const DEVICE_INFO: &str = "Get Device Info";
    pub const OPEN_FOLDER: &str = "Open Folder";
    pub const LIST_APPS: &str = "List Apps";

    pub fn mount_app(bundle_id: &str) -> String {
        format!("Mount App {}", bundle_id)
    }
}

// ── Requests ────────────────────────────────────────────────────────────────

/// Body of the mount-point routes. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MountRequest {
    pub mount_point: Option<String>,
    pub read_only: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MountAppRequest {
    pub bundle_id: Option<String>,
    /// Display name, used for the default folder name.
    pub name: Option<String>,
    pub mount_point: Option<String>,
}

// ── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StepKind {
    Validate,
    Pair,
    Mount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step: StepKind,
    pub result: CommandResult,
}

/// Result of validate → (pair) → mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneClickOutcome {
    pub success: bool,
    pub steps: Vec<Step>,
}

/// `ifuse --list-apps` output, raw and parsed.
#[derive(Debug, Clone)]
pub struct AppsOutcome {
    pub result: CommandResult,
    pub listing: AppListing,
}

impl AppsOutcome {
    pub fn raw_lines(&self) -> Vec<String> {
        parser::raw_lines(&self.result.stdout)
    }
}

// ── Service ─────────────────────────────────────────────────────────────────

/// Paths and flags the operations fall back on.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub default_mount_point: PathBuf,
    pub apps_mount_root: PathBuf,
    pub mount_options: MountOptions,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_mount_point: config.default_mount_point.clone(),
            apps_mount_root: config.apps_mount_root.clone(),
            mount_options: config.mount_options(),
        }
    }
}

/// Cheap to clone; clones share the executor and the log lock.
#[derive(Clone)]
pub struct MountService {
    executor: Arc<dyn Executor>,
    log: OperationLog,
    settings: ServiceSettings,
}

impl MountService {
    pub fn new(executor: Arc<dyn Executor>, log: OperationLog, settings: ServiceSettings) -> Self {
        Self {
            executor,
            log,
            settings,
        }
    }

    /// Service running real commands with the configured timeout.
    pub fn from_config(config: &Config) -> Self {
        Self::with_executor(config, Arc::new(SystemExecutor::new(config.timeout())))
    }

    pub fn with_executor(config: &Config, executor: Arc<dyn Executor>) -> Self {
        Self::new(
            executor,
            config.operation_log(),
            ServiceSettings::from(config),
        )
    }

    pub fn log(&self) -> &OperationLog {
        &self.log
    }

    /// Requested mount point, or the default one. `~` is expanded.
    pub fn resolve_mount_point(&self, requested: Option<&str>) -> PathBuf {
        match requested.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => expand_path(Path::new(p)),
            None => self.settings.default_mount_point.clone(),
        }
    }

    fn mount_options(&self, read_only: Option<bool>) -> MountOptions {
        let mut options = self.settings.mount_options;
        if let Some(ro) = read_only {
            options.read_only = ro;
        }
        options
    }

    async fn record(&self, operation: &str, result: &CommandResult) {
        let status = Status::from(result.success);
        tracing::info!(operation, %status, code = result.exit_code, "operation finished");
        self.log.append(operation, status, result.output()).await;
    }

    /// Await `work` and log its result under `operation`.
    async fn logged(
        &self,
        operation: &str,
        work: impl Future<Output = CommandResult>,
    ) -> CommandResult {
        let in_flight = InFlight::start(&self.log, operation);
        let result = work.await;
        in_flight.finish();
        self.record(operation, &result).await;
        result
    }

    async fn run_logged(&self, operation: &str, command: CommandLine) -> CommandResult {
        self.logged(operation, self.executor.run(&command)).await
    }

    /// Create the mount directory, then run `command`. A directory that
    /// cannot be created fails the step without running anything. Dry runs
    /// create nothing.
    async fn run_in_mount_point(&self, mount_point: &Path, command: CommandLine) -> CommandResult {
        if !self.executor.is_dry_run() {
            if let Err(e) = mount::ensure_mount_point(mount_point).await {
                return CommandResult::failure(format!(
                    "Failed to create mount point {}: {}",
                    mount_point.display(),
                    e
                ));
            }
        }
        self.executor.run(&command).await
    }

    // ── Operations ──────────────────────────────────────────────────────

    /// `idevicepair validate`
    pub async fn check_device(&self) -> CommandResult {
        self.run_logged(ops::CHECK_DEVICE, commands::validate_pairing())
            .await
    }

    /// `idevicepair pair`
    pub async fn pair_device(&self) -> CommandResult {
        self.run_logged(ops::PAIR_DEVICE, commands::pair()).await
    }

    pub async fn mount(&self, request: &MountRequest) -> CommandResult {
        let mount_point = self.resolve_mount_point(request.mount_point.as_deref());
        let command = commands::mount(&mount_point, self.mount_options(request.read_only));
        self.logged(
            ops::MOUNT_DEVICE,
            self.run_in_mount_point(&mount_point, command),
        )
        .await
    }

    pub async fn unmount(&self, request: &MountRequest) -> CommandResult {
        let mount_point = self.resolve_mount_point(request.mount_point.as_deref());
        self.run_logged(ops::UNMOUNT_DEVICE, commands::unmount(&mount_point))
            .await
    }

    /// Validate pairing, pair only if validation failed, then mount.
    ///
    /// The mount is attempted even when pairing fails; its result decides
    /// the overall outcome.
    pub async fn one_click_mount(&self, request: &MountRequest) -> OneClickOutcome {
        let in_flight = InFlight::start(&self.log, ops::ONE_CLICK_MOUNT);
        let outcome = self.one_click_steps(request).await;
        in_flight.finish();
        if let Some(last) = outcome.steps.last() {
            self.record(ops::ONE_CLICK_MOUNT, &last.result).await;
        }
        outcome
    }

    async fn one_click_steps(&self, request: &MountRequest) -> OneClickOutcome {
        let mount_point = self.resolve_mount_point(request.mount_point.as_deref());
        let mut steps = Vec::with_capacity(3);

        let validate = self.executor.run(&commands::validate_pairing()).await;
        let paired = validate.success;
        steps.push(Step {
            step: StepKind::Validate,
            result: validate,
        });

        if !paired {
            let pair = self.executor.run(&commands::pair()).await;
            steps.push(Step {
                step: StepKind::Pair,
                result: pair,
            });
        }

        let command = commands::mount(&mount_point, self.mount_options(request.read_only));
        let mount = self.run_in_mount_point(&mount_point, command).await;
        let success = mount.success;
        steps.push(Step {
            step: StepKind::Mount,
            result: mount,
        });
        OneClickOutcome { success, steps }
    }

    pub async fn device_info(&self) -> Result<DeviceInfo> {
        let in_flight = InFlight::start(&self.log, ops::DEVICE_INFO);
        let outcome = device::fetch(self.executor.as_ref()).await;
        in_flight.finish();
        match &outcome {
            Ok(info) => {
                self.log
                    .append(ops::DEVICE_INFO, Status::Success, &info.udid)
                    .await
            }
            Err(e) => {
                self.log
                    .append(ops::DEVICE_INFO, Status::Failed, &e.to_string())
                    .await
            }
        }
        outcome
    }

    /// `xdg-open` the mount point, only if something is mounted there.
    pub async fn open_folder(&self, request: &MountRequest) -> Result<CommandResult> {
        let mount_point = self.resolve_mount_point(request.mount_point.as_deref());
        if !mount::is_mounted(&mount_point) {
            let err = ServiceError::NotMounted(mount_point);
            self.log
                .append(ops::OPEN_FOLDER, Status::Failed, &err.to_string())
                .await;
            return Err(err);
        }
        Ok(self
            .run_logged(ops::OPEN_FOLDER, commands::open(&mount_point))
            .await)
    }

    /// Asks the OS; never runs a command.
    pub fn is_mounted(&self, request: &MountRequest) -> bool {
        mount::is_mounted(&self.resolve_mount_point(request.mount_point.as_deref()))
    }

    pub async fn list_apps(&self) -> AppsOutcome {
        let result = self.run_logged(ops::LIST_APPS, commands::list_apps()).await;
        let listing = if result.success {
            AppListing::parse(&result.stdout)
        } else {
            AppListing::default()
        };
        AppsOutcome { result, listing }
    }

    /// Mount one app's Documents folder.
    ///
    /// Without an explicit mount point the folder is
    /// `<apps_mount_root>/<name or bundle id, sanitized>`.
    pub async fn mount_app(&self, request: &MountAppRequest) -> Result<CommandResult> {
        let bundle_id = request
            .bundle_id
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .ok_or(ServiceError::MissingBundleId)?;
        if bundle_id.starts_with('-') {
            return Err(ServiceError::InvalidBundleId(bundle_id.to_string()));
        }

        let mount_point = self.app_mount_point(request, bundle_id);
        let command = commands::mount_app_documents(bundle_id, &mount_point);
        let operation = ops::mount_app(bundle_id);
        Ok(self
            .logged(&operation, self.run_in_mount_point(&mount_point, command))
            .await)
    }

    /// Turn `app` into a mount-app request.
    ///
    /// Anything shaped like a bundle id is used as is. Otherwise `app` is
    /// looked up by name in `ifuse --list-apps`, which is logged like any
    /// other listing.
    pub async fn resolve_app(&self, app: &str) -> Result<MountAppRequest> {
        let app = app.trim();
        if looks_like_bundle_id(app) {
            return Ok(MountAppRequest {
                bundle_id: Some(app.to_string()),
                ..MountAppRequest::default()
            });
        }

        let outcome = self.list_apps().await;
        if !outcome.result.success {
            return Err(ServiceError::AppListing(
                outcome.result.output().trim().to_string(),
            ));
        }
        let entry = outcome
            .listing
            .find(app)
            .ok_or_else(|| ServiceError::UnknownApp(app.to_string()))?;
        Ok(MountAppRequest {
            bundle_id: Some(entry.bundle_id.clone()),
            name: Some(entry.short_name().to_string()),
            mount_point: None,
        })
    }

    /// Where [`mount_app`](Self::mount_app) mounts for this request.
    pub fn app_mount_point(&self, request: &MountAppRequest, bundle_id: &str) -> PathBuf {
        match request.mount_point.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => expand_path(Path::new(p)),
            None => {
                let name = request
                    .name
                    .as_deref()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or(bundle_id);
                mount::app_mount_point(&self.settings.apps_mount_root, name)
            }
        }
    }

    /// Directory listing under a mount point (or any path).
    pub async fn browse(&self, path: Option<&str>, show_hidden: bool) -> Result<Vec<DirEntry>> {
        let path = self.resolve_mount_point(path);
        let dir = path.clone();
        tokio::task::spawn_blocking(move || mount::list_directory(&dir, show_hidden))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)))
            .map_err(|source| ServiceError::Browse { path, source })
    }

    pub async fn logs(&self) -> Result<Vec<LogEntry>> {
        self.log.load().await.map_err(ServiceError::Log)
    }

    /// The newest `limit` entries, oldest first.
    pub async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.log.load_recent(limit).await.map_err(ServiceError::Log)
    }

    pub async fn clear_logs(&self) -> Result<()> {
        self.log.remove().await.map_err(ServiceError::Log)
    }
}

fn looks_like_bundle_id(app: &str) -> bool {
    app.contains('.')
        && !app.starts_with('-')
        && !app.contains(|c: char| c.is_whitespace() || c == '(' || c == ')')
}

/// Logs a FAILED [`CANCELLED`] entry if dropped before [`finish`](Self::finish),
/// so an operation abandoned mid-command still leaves its one log entry.
/// The write happens synchronously on the dropping thread.
struct InFlight<'a> {
    log: &'a OperationLog,
    operation: &'a str,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn start(log: &'a OperationLog, operation: &'a str) -> Self {
        Self {
            log,
            operation,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(operation = self.operation, "operation cancelled");
            self.log
                .append_blocking(self.operation, Status::Failed, CANCELLED);
        }
    }
}

impl std::fmt::Debug for MountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountService")
            .field("log", &self.log)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
