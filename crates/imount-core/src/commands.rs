//! Command builder: the fixed table of tool invocations.
//!
//! Every parameter (mount path, UDID, bundle identifier) becomes exactly one
//! argv element. No shell is involved at any point; [`CommandLine`]'s
//! `Display` impl quotes for humans only.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// A program plus its argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add a path. A relative path that starts with `-` is written as
    /// `./-...` so the tool cannot take it for an option.
    pub fn path_arg(self, path: &Path) -> Self {
        let text = path.to_string_lossy();
        if text.starts_with('-') {
            self.arg(format!("./{}", text))
        } else {
            self.arg(text)
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_escape(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_escape(arg))?;
        }
        Ok(())
    }
}

/// Escape a single word for POSIX sh.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@,+".contains(c))
    {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    }
}

/// Flags for `ifuse` when mounting the media partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountOptions {
    pub read_only: bool,
    pub allow_other: bool,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            allow_other: true,
        }
    }
}

// ── Command table ───────────────────────────────────────────────────────────

pub fn validate_pairing() -> CommandLine {
    CommandLine::new("idevicepair").arg("validate")
}

pub fn pair() -> CommandLine {
    CommandLine::new("idevicepair").arg("pair")
}

/// `ifuse <mount_point> [-o ro] [-o allow_other]`
pub fn mount(mount_point: &Path, options: MountOptions) -> CommandLine {
    let mut cmd = CommandLine::new("ifuse").path_arg(mount_point);
    if options.read_only {
        cmd = cmd.arg("-o").arg("ro");
    }
    if options.allow_other {
        cmd = cmd.arg("-o").arg("allow_other");
    }
    cmd
}

pub fn unmount(mount_point: &Path) -> CommandLine {
    CommandLine::new("fusermount").arg("-u").path_arg(mount_point)
}

pub fn device_id() -> CommandLine {
    CommandLine::new("idevice_id").arg("-l")
}

pub fn device_name(udid: &str) -> CommandLine {
    CommandLine::new("idevicename").arg("-u").arg(udid)
}

pub fn device_info_key(udid: &str, key: &str) -> CommandLine {
    CommandLine::new("ideviceinfo")
        .arg("-u")
        .arg(udid)
        .arg("-k")
        .arg(key)
}

pub fn list_apps() -> CommandLine {
    CommandLine::new("ifuse").arg("--list-apps")
}

/// `ifuse --documents <bundle_id> <mount_point>`
pub fn mount_app_documents(bundle_id: &str, mount_point: &Path) -> CommandLine {
    CommandLine::new("ifuse")
        .arg("--documents")
        .arg(bundle_id)
        .path_arg(mount_point)
}

pub fn open(path: &Path) -> CommandLine {
    CommandLine::new("xdg-open").path_arg(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn mount_flags_follow_options() {
        let p = PathBuf::from("/home/me/iPhone");
        assert_eq!(
            mount(&p, MountOptions::default()).to_string(),
            "ifuse /home/me/iPhone -o allow_other"
        );
        let ro = MountOptions {
            read_only: true,
            allow_other: true,
        };
        assert_eq!(
            mount(&p, ro).args(),
            ["/home/me/iPhone", "-o", "ro", "-o", "allow_other"]
        );
        let bare = MountOptions {
            read_only: false,
            allow_other: false,
        };
        assert_eq!(mount(&p, bare).args(), ["/home/me/iPhone"]);
    }

    #[test]
    fn parameters_stay_single_arguments() {
        let p = PathBuf::from("/tmp/my phone; rm -rf ~");
        let cmd = mount_app_documents("com.example.\"app\"", &p);
        assert_eq!(cmd.program(), "ifuse");
        assert_eq!(
            cmd.args(),
            ["--documents", "com.example.\"app\"", "/tmp/my phone; rm -rf ~"]
        );
    }

    #[test]
    fn dash_paths_are_not_options() {
        let p = PathBuf::from("-o");
        assert_eq!(mount(&p, MountOptions::default()).args()[0], "./-o");
        assert_eq!(unmount(Path::new("-u")).args(), ["-u", "./-u"]);
        assert_eq!(
            mount_app_documents("com.a", Path::new("--help")).args(),
            ["--documents", "com.a", "./--help"]
        );
        assert_eq!(open(Path::new("/tmp/-x")).args(), ["/tmp/-x"]);
    }

    #[test]
    fn display_quotes_metacharacters() {
        let p = PathBuf::from("/tmp/it's here");
        assert_eq!(unmount(&p).to_string(), "fusermount -u '/tmp/it'\"'\"'s here'");
        assert_eq!(
            device_info_key("abc123", "ProductType").to_string(),
            "ideviceinfo -u abc123 -k ProductType"
        );
    }

    #[test]
    fn fixed_commands() {
        assert_eq!(validate_pairing().to_string(), "idevicepair validate");
        assert_eq!(pair().to_string(), "idevicepair pair");
        assert_eq!(device_id().to_string(), "idevice_id -l");
        assert_eq!(list_apps().to_string(), "ifuse --list-apps");
        assert_eq!(device_name("u1").to_string(), "idevicename -u u1");
        assert_eq!(open(Path::new("/mnt/x")).to_string(), "xdg-open /mnt/x");
    }

    #[test]
    fn empty_argument_is_visible() {
        assert_eq!(shell_escape(""), "''");
    }
}
