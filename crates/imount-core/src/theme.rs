//! Terminal theme & spinner helpers.
//!
//! A [`Theme`] is built once from the CLI flags and passed to whatever
//! renders output. Respects the `NO_COLOR` env-var and `--no-color`.
//!
//! # Palette
//!
//! | Token    | Hex       | Usage                          |
//! |----------|-----------|--------------------------------|
//! | primary  | `#3B82F6` | headings, command names        |
//! | info     | `#60A5FA` | informational values           |
//! | success  | `#10B981` | success states                 |
//! | warn     | `#F59E0B` | warnings                       |
//! | error    | `#EF4444` | errors, failures               |
//! | muted    | `#94A3B8` | timestamps, metadata           |

use std::time::Duration;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

pub mod palette {
    pub const PRIMARY: (u8, u8, u8) = (0x3B, 0x82, 0xF6);
    pub const INFO: (u8, u8, u8) = (0x60, 0xA5, 0xFA);
    pub const SUCCESS: (u8, u8, u8) = (0x10, 0xB9, 0x81);
    pub const WARN: (u8, u8, u8) = (0xF5, 0x9E, 0x0B);
    pub const ERROR: (u8, u8, u8) = (0xEF, 0x44, 0x44);
    pub const MUTED: (u8, u8, u8) = (0x94, 0xA3, 0xB8);
}

const SPINNER_CHARS: &[&str] = &["◒", "◐", "◓", "◑"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    color: bool,
}

impl Default for Theme {
    fn default() -> Self {
        Self { color: true }
    }
}

impl Theme {
    /// Colour is on unless `--no-color` was given or `NO_COLOR` is set.
    pub fn new(no_color_flag: bool) -> Self {
        let env_off = std::env::var("NO_COLOR")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
        Self {
            color: !(no_color_flag || env_off),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn is_color(&self) -> bool {
        self.color
    }

    fn apply(&self, text: &str, rgb: (u8, u8, u8)) -> String {
        if self.color {
            text.truecolor(rgb.0, rgb.1, rgb.2).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn primary(&self, text: &str) -> String {
        self.apply(text, palette::PRIMARY)
    }

    pub fn info(&self, text: &str) -> String {
        self.apply(text, palette::INFO)
    }

    pub fn success(&self, text: &str) -> String {
        self.apply(text, palette::SUCCESS)
    }

    pub fn warn(&self, text: &str) -> String {
        self.apply(text, palette::WARN)
    }

    pub fn error(&self, text: &str) -> String {
        self.apply(text, palette::ERROR)
    }

    pub fn muted(&self, text: &str) -> String {
        self.apply(text, palette::MUTED)
    }

    /// Bold heading in the primary colour.
    pub fn heading(&self, text: &str) -> String {
        if self.color {
            let (r, g, b) = palette::PRIMARY;
            text.truecolor(r, g, b).bold().to_string()
        } else {
            text.to_string()
        }
    }

    // ── Composite icons ─────────────────────────────────────────────────

    pub fn icon_ok(&self, label: &str) -> String {
        format!("{} {}", self.success("✓"), label)
    }

    pub fn icon_fail(&self, label: &str) -> String {
        format!("{} {}", self.error("✗"), label)
    }

    pub fn icon_warn(&self, label: &str) -> String {
        format!("{} {}", self.warn("⚠"), label)
    }

    /// `icon_ok` or `icon_fail` depending on `success`.
    pub fn status(&self, success: bool, label: &str) -> String {
        if success {
            self.icon_ok(label)
        } else {
            self.icon_fail(label)
        }
    }

    /// "  Label : value" with the label muted.
    pub fn label_value(&self, label: &str, value: &str) -> String {
        format!("  {} : {}", self.muted(label), self.info(value))
    }

    // ── Spinner ─────────────────────────────────────────────────────────

    /// Indeterminate spinner on stderr. The caller finishes it.
    pub fn spinner(&self, message: &str) -> ProgressBar {
        let template = if self.color {
            "{spinner:.blue}  {msg}"
        } else {
            "{spinner}  {msg}"
        };
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER_CHARS);

        let pb = ProgressBar::new_spinner();
        pb.set_style(style);
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }
}
