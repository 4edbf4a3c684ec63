//! Terminal output utilities
//!
//! Status lines for the user. Diagnostics go through `tracing` instead.

use andromach_core::error::Error;
use owo_colors::OwoColorize;

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    /// Print a follow-up hint, e.g. the next command to run
    pub fn hint(message: &str) {
        println!("{} {}", "→".cyan(), message.dimmed());
    }

    /// Print a multi-line block verbatim
    pub fn notice(message: &str) {
        println!("{message}");
    }

    /// Print a failed operation with its context and suggestion
    pub fn report(err: &Error) {
        Self::error(&format!("{} {}", err.message, format!("({})", err.code).dimmed()));
        if let Some(ctx) = &err.context {
            eprintln!("  {} {}", "context:".dimmed(), ctx);
        }
        if let Some(suggestion) = &err.suggestion {
            eprintln!("  {} {}", "hint:".cyan(), suggestion);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use andromach_core::error::ErrorCode;

    #[test]
    fn test_report_does_not_panic() {
        Status::report(&Error::missing_config("build.java").with_context("gradle"));
        Status::report(&Error::new(ErrorCode::HttpStatus, "secret lookup failed"));
    }
}
