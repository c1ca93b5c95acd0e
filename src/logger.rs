//! Terminal logging with colored module prefixes.
//!
//! Every pipeline stage reports through the `log!` macro:
//!
//! ```ignore
//! log!("copy"; "{}", from);
//! log!("save"; "{} {}", dest, src.dimmed());
//! ```
//!
//! Output goes to stdout. Single-line messages are truncated to the terminal
//! width; multi-line ones (error lists, script stderr) are printed in full.
//! [`set_quiet`] silences everything (used by `--quiet` and tests).

use colored::{ColoredString, Colorize};
use crossterm::{
    execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::{
        OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Global quiet switch
static QUIET: AtomicBool = AtomicBool::new(false);

/// `[` + `]` + trailing space around the module name
const PREFIX_OVERHEAD: usize = 3;

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Enable or disable all log output.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

/// Whether log output is currently suppressed.
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

fn terminal_width() -> usize {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120)) as usize
}

/// Write a prefixed message.
pub fn log(module: &str, message: &str) {
    if is_quiet() {
        return;
    }

    let prefix = colorize_prefix(module);
    let message = fit_message(message, module.len(), terminal_width());

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Truncate a single-line message to what fits after the prefix.
/// Multi-line messages are never cut.
fn fit_message(message: &str, module_len: usize, width: usize) -> &str {
    if message.contains('\n') {
        return message;
    }
    truncate_str(message, width.saturating_sub(module_len + PREFIX_OVERHEAD))
}

fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" => prefix.bright_blue().bold(),
        "watch" => prefix.bright_green().bold(),
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.bright_magenta().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Cut `s` to at most `max_len` bytes on a char boundary.
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_fits() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_str_cuts() {
        assert_eq!(truncate_str("hello world", 5), "hello");
        assert_eq!(truncate_str("hello", 0), "");
    }

    #[test]
    fn test_truncate_str_unicode_boundary() {
        // "你好" is 6 bytes, 3 per char
        assert_eq!(truncate_str("你好", 4), "你");
        assert_eq!(truncate_str("a你b", 3), "a");
    }

    #[test]
    fn test_fit_message_truncates_single_line() {
        // "[build] " takes 8 columns
        assert_eq!(fit_message("0123456789", 5, 12), "0123");
        assert_eq!(fit_message("short", 5, 80), "short");
    }

    #[test]
    fn test_fit_message_keeps_multiline() {
        let failures = "render failed for 2 page(s):\n  /a.html: a very long reason\n  /b.html: bang";
        assert_eq!(fit_message(failures, 5, 12), failures);
    }

    #[test]
    fn test_quiet_switch() {
        set_quiet(true);
        assert!(is_quiet());
        // Must not panic or write while quiet
        log("build", "hidden");
        set_quiet(false);
        assert!(!is_quiet());
    }
}
