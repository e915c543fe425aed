//! Shared CLI output helpers: global flag checks and styled symbols.
//!
//! The binary sets `MERCHWATCH_*` environment variables from its global
//! flags so any module can check them without threading state around.

/// True when `--json` was passed.
pub fn is_json() -> bool {
    std::env::var("MERCHWATCH_JSON").is_ok()
}

/// True when `--quiet` was passed.
pub fn is_quiet() -> bool {
    std::env::var("MERCHWATCH_QUIET").is_ok()
}

/// True when `--verbose` was passed.
pub fn is_verbose() -> bool {
    std::env::var("MERCHWATCH_VERBOSE").is_ok()
}

fn color_enabled() -> bool {
    std::env::var("MERCHWATCH_NO_COLOR").is_err() && std::env::var("NO_COLOR").is_err()
}

/// Print a machine-readable value to stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

/// Terminal symbols, degraded to plain ASCII when color is off.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self {
            color: color_enabled(),
        }
    }

    pub fn ok_sym(&self) -> &'static str {
        if self.color {
            "\x1b[32m✓\x1b[0m"
        } else {
            "✓"
        }
    }

    pub fn warn_sym(&self) -> &'static str {
        if self.color {
            "\x1b[33m!\x1b[0m"
        } else {
            "!"
        }
    }

    pub fn fail_sym(&self) -> &'static str {
        if self.color {
            "\x1b[31m✗\x1b[0m"
        } else {
            "✗"
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}
