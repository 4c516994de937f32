//! Errors that stop an operation before (or instead of) running a command.
//!
//! Command failures themselves are not errors; they travel inside
//! [`CommandResult`](crate::runner::CommandResult).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The mount point has no filesystem attached.
    #[error("Device not mounted")]
    NotMounted(PathBuf),

    /// `mount-app` was called without a bundle identifier.
    #[error("Missing required field: bundle_id")]
    MissingBundleId,

    /// A bundle identifier the tools would read as an option.
    #[error("Invalid bundle_id: {0}")]
    InvalidBundleId(String),

    /// No listed app has this name or bundle identifier.
    #[error("No installed app matches '{0}'")]
    UnknownApp(String),

    /// `ifuse --list-apps` failed while looking an app up by name.
    #[error("Failed to list apps: {0}")]
    AppListing(String),

    /// `idevice_id -l` listed nothing.
    #[error("No device found")]
    NoDevice,

    /// A request body could not be decoded.
    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    /// The operation log could not be read or removed.
    #[error("{0:#}")]
    Log(anyhow::Error),

    /// Directory listing failed.
    #[error("Cannot read {}: {source}", path.display())]
    Browse {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    /// Whether the caller sent something wrong (as opposed to device state).
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::MissingBundleId
                | Self::InvalidBundleId(_)
                | Self::UnknownApp(_)
                | Self::InvalidRequest(_)
                | Self::NotMounted(_)
        )
    }
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
