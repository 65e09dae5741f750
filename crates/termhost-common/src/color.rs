//! Terminal color helpers.
//!
//! [`Colors`] honours `--no-color`, `NO_COLOR` and non-terminal stdout and is
//! meant for text the CLI prints itself. [`tint`] always emits escapes; it is
//! used for payloads that a terminal front-end renders verbatim (prompts,
//! server request logs).

use std::io::IsTerminal;
use std::sync::OnceLock;

static NO_COLOR: OnceLock<bool> = OnceLock::new();

pub fn init(no_color_flag: bool) {
    let _ = NO_COLOR.set(
        no_color_flag || std::env::var("NO_COLOR").is_ok() || !std::io::stdout().is_terminal(),
    );
}

pub fn is_disabled() -> bool {
    *NO_COLOR.get().unwrap_or(&false)
}

mod codes {
    pub const RESET: &str = "\x1b[0m";
    pub const GREEN: &str = "\x1b[32m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
    pub const DIM: &str = "\x1b[90m";
    pub const BOLD: &str = "\x1b[1m";
    pub const BOLD_GREEN: &str = "\x1b[1;32m";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tint {
    Green,
    Red,
    Yellow,
    Cyan,
    Dim,
    Bold,
    BoldGreen,
}

impl Tint {
    fn code(self) -> &'static str {
        match self {
            Tint::Green => codes::GREEN,
            Tint::Red => codes::RED,
            Tint::Yellow => codes::YELLOW,
            Tint::Cyan => codes::CYAN,
            Tint::Dim => codes::DIM,
            Tint::Bold => codes::BOLD,
            Tint::BoldGreen => codes::BOLD_GREEN,
        }
    }
}

fn wrap_with_ansi(text: &str, prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + text.len() + codes::RESET.len());
    out.push_str(prefix);
    out.push_str(text);
    out.push_str(codes::RESET);
    out
}

/// Wraps `text` in the escape sequence for `color`, regardless of the
/// process-wide color setting.
pub fn tint(text: &str, color: Tint) -> String {
    wrap_with_ansi(text, color.code())
}

pub struct Colors;

impl Colors {
    fn paint(text: &str, color: Tint) -> String {
        if is_disabled() {
            text.to_string()
        } else {
            tint(text, color)
        }
    }

    pub fn success(text: &str) -> String {
        Self::paint(text, Tint::Green)
    }

    pub fn error(text: &str) -> String {
        Self::paint(text, Tint::Red)
    }

    pub fn info(text: &str) -> String {
        Self::paint(text, Tint::Cyan)
    }

    pub fn warning(text: &str) -> String {
        Self::paint(text, Tint::Yellow)
    }

    pub fn dim(text: &str) -> String {
        Self::paint(text, Tint::Dim)
    }

    pub fn bold(text: &str) -> String {
        Self::paint(text, Tint::Bold)
    }
}
