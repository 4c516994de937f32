//! Output parsing for `idevice_id`, `ideviceinfo` and `ifuse --list-apps`.
//!
//! All parsers are total: malformed input degrades, it never errors.

use serde::{Deserialize, Serialize};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// First non-empty line of `idevice_id -l`.
pub fn first_udid(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Single-key `ideviceinfo` output, trimmed.
pub fn info_value(stdout: &str) -> String {
    stdout.trim().to_string()
}

/// Byte count → `"<n>.<nn> GB"`; `None` when the output is not an integer.
pub fn storage_gb(stdout: &str) -> Option<String> {
    let bytes: u64 = stdout.trim().parse().ok()?;
    Some(format!("{:.2} GB", bytes as f64 / GIB))
}

// ── App listing ─────────────────────────────────────────────────────────────

/// One installed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    /// Label shown to the user, also the lookup key.
    pub name: String,
    pub bundle_id: String,
}

impl AppEntry {
    /// `name` without its ` (bundle.id)` suffix.
    pub fn short_name(&self) -> &str {
        self.name
            .strip_suffix(')')
            .and_then(|rest| rest.strip_suffix(self.bundle_id.as_str()))
            .and_then(|rest| rest.strip_suffix(" ("))
            .unwrap_or(&self.name)
    }
}

/// How a listing line was understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineShape {
    /// `"bundle","version","Name"`, the format `ifuse --list-apps` prints.
    QuotedCsv,
    /// `Name (bundle)`
    Parenthesized,
    /// Anything else: the whole line is taken as the identifier.
    Bare,
}

/// Classify one line. Blank lines and the CSV header yield `None`.
pub fn parse_app_line(line: &str) -> Option<(AppEntry, LineShape)> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('"') && trimmed.contains("\",\"") {
        let fields: Vec<&str> = trimmed
            .split("\",\"")
            .map(|f| f.trim_matches('"').trim())
            .collect();
        if fields[0] == "CFBundleIdentifier" {
            return None;
        }
        if !fields[0].is_empty() {
            let bundle_id = fields[0].to_string();
            let name = match fields.get(2) {
                Some(app_name) => format!("{} ({})", app_name, bundle_id),
                None => trimmed.to_string(),
            };
            return Some((AppEntry { name, bundle_id }, LineShape::QuotedCsv));
        }
    }

    if let Some(open) = trimmed.find('(') {
        if let Some(len) = trimmed[open + 1..].find(')') {
            let inner = trimmed[open + 1..open + 1 + len].trim();
            if !inner.is_empty() {
                let entry = AppEntry {
                    name: trimmed.to_string(),
                    bundle_id: inner.to_string(),
                };
                return Some((entry, LineShape::Parenthesized));
            }
        }
    }

    let entry = AppEntry {
        name: trimmed.to_string(),
        bundle_id: trimmed.to_string(),
    };
    Some((entry, LineShape::Bare))
}

/// Entries in output order with a lookup by display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppListing {
    pub entries: Vec<AppEntry>,
}

impl AppListing {
    pub fn parse(stdout: &str) -> Self {
        let entries = stdout
            .lines()
            .filter_map(parse_app_line)
            .map(|(entry, shape)| {
                if shape != LineShape::QuotedCsv {
                    tracing::debug!(line = %entry.name, ?shape, "non-canonical app line");
                }
                entry
            })
            .collect();
        Self { entries }
    }

    /// Entry whose full label, short name or bundle id is `query`. With
    /// duplicates the last one wins.
    pub fn find(&self, query: &str) -> Option<&AppEntry> {
        let query = query.trim();
        self.entries
            .iter()
            .rev()
            .find(|e| e.name == query || e.short_name() == query || e.bundle_id == query)
    }

    /// Bundle id for a display name.
    pub fn bundle_for(&self, name: &str) -> Option<&str> {
        self.find(name).map(|e| e.bundle_id.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Raw, trimmed, non-empty lines. This is what the REST `apps` field carries.
pub fn raw_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
