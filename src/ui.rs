//! Progress output for CI logs
//!
//! Everything here goes to stderr. Stdout is reserved for results that
//! later pipeline steps consume. Section headers use the `--- ` prefix that
//! Buildkite renders as collapsible groups.

use console::style;

/// Start a new collapsible log section
pub fn section(title: &str) {
    eprintln!("--- {}", style(title).bold().for_stderr());
}

/// Expand the current section so a failure is visible without clicking
pub fn expand_section() {
    eprintln!("^^^ +++");
}

/// Display a success step
pub fn step_ok(message: &str) {
    eprintln!("  {} {}", style("[OK]").green().for_stderr(), message);
}

/// Display a warning step
pub fn step_warn(message: &str) {
    eprintln!("  {} {}", style("[WARN]").yellow().for_stderr(), message);
}

/// Display a key-value pair
pub fn key_value(key: &str, value: &str) {
    eprintln!("  {}: {}", style(key).dim().for_stderr(), value);
}
