//! Terminal color policy.
//!
//! `NO_COLOR` (any value) always wins, then `CLICOLOR_FORCE` (non-zero),
//! then `CLICOLOR=0`. Otherwise colors follow whether stdout is a terminal.
use colored::control;
use std::io::IsTerminal;

fn colors_enabled(var: impl Fn(&str) -> Option<String>, is_tty: bool) -> bool {
    if var("NO_COLOR").is_some() {
        return false;
    }
    if var("CLICOLOR_FORCE").is_some_and(|v| v != "0") {
        return true;
    }
    if var("CLICOLOR").is_some_and(|v| v == "0") {
        return false;
    }
    is_tty
}

/// Apply the color policy for this process; call once at startup
pub fn init_colors() {
    let enabled = colors_enabled(
        |key| std::env::var(key).ok(),
        std::io::stdout().is_terminal(),
    );
    control::set_override(enabled);
}
