//! Opt-in diagnostic logging with colored module prefixes.
//!
//! Logging is purely diagnostic and disabled by default; the host enables it
//! through the `enable_logging` setting. Nothing in the pipeline depends on a
//! log line being emitted.
//!
//! # Example
//!
//! ```ignore
//! log!("store"; "regenerated {} ({} bytes)", name, len);
//! ```

use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Global logging flag (driven by the `enable_logging` setting).
static ENABLED: AtomicBool = AtomicBool::new(false);

/// Enable or disable diagnostic logging globally.
pub fn set_enabled(v: bool) {
    ENABLED.store(v, Ordering::SeqCst);
}

/// Check if diagnostic logging is enabled.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_enabled() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

/// Log a message with a colored module prefix (no-op unless enabled).
#[inline]
pub fn log(module: &str, message: &str) {
    let prefix = colorize_prefix(module);
    eprintln!("{prefix} {message}");
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str) -> String {
    let prefix = format!("[{module}]");
    match module {
        "error" => prefix.bright_red().bold().to_string(),
        "store" => prefix.bright_blue().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}
