//! Checks that the external tools are installed.

use std::path::PathBuf;

use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};

/// Every external program an operation may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    Idevicepair,
    Ifuse,
    #[strum(serialize = "idevice_id")]
    #[serde(rename = "idevice_id")]
    IdeviceId,
    Ideviceinfo,
    Idevicename,
    Fusermount,
    #[strum(serialize = "xdg-open")]
    #[serde(rename = "xdg-open")]
    XdgOpen,
}

impl Tool {
    /// Package that usually provides the tool.
    pub fn package(self) -> &'static str {
        match self {
            Self::Idevicepair | Self::IdeviceId | Self::Ideviceinfo | Self::Idevicename => {
                "libimobiledevice-utils"
            }
            Self::Ifuse => "ifuse",
            Self::Fusermount => "fuse",
            Self::XdgOpen => "xdg-utils",
        }
    }

    /// Missing optional tools disable a single feature (open folder, device name).
    pub fn optional(self) -> bool {
        matches!(self, Self::XdgOpen | Self::Idevicename)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    pub tool: Tool,
    pub path: Option<PathBuf>,
}

impl ToolStatus {
    pub fn found(&self) -> bool {
        self.path.is_some()
    }
}

/// Look every tool up on `$PATH`.
pub fn check_tools() -> Vec<ToolStatus> {
    Tool::iter()
        .map(|tool| {
            let path = which::which(tool.to_string()).ok();
            tracing::debug!(%tool, found = path.is_some(), "tool lookup");
            ToolStatus { tool, path }
        })
        .collect()
}

/// Whether every required (non-optional) tool was found.
pub fn all_required_found(statuses: &[ToolStatus]) -> bool {
    statuses
        .iter()
        .all(|status| status.found() || status.tool.optional())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_match_binaries() {
        let names: Vec<String> = Tool::iter().map(|t| t.to_string()).collect();
        assert_eq!(
            names,
            [
                "idevicepair",
                "ifuse",
                "idevice_id",
                "ideviceinfo",
                "idevicename",
                "fusermount",
                "xdg-open"
            ]
        );
        assert_eq!(serde_json::to_value(Tool::XdgOpen).unwrap(), "xdg-open");
    }

    #[test]
    fn optional_tools_do_not_fail_the_check() {
        let statuses = vec![
            ToolStatus {
                tool: Tool::Ifuse,
                path: Some(PathBuf::from("/usr/bin/ifuse")),
            },
            ToolStatus {
                tool: Tool::XdgOpen,
                path: None,
            },
        ];
        assert!(all_required_found(&statuses));

        let missing = vec![ToolStatus {
            tool: Tool::Fusermount,
            path: None,
        }];
        assert!(!all_required_found(&missing));
    }

    #[test]
    fn check_covers_every_tool() {
        assert_eq!(check_tools().len(), Tool::iter().count());
    }
}
