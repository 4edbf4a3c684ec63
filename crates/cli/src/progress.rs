//! Progress indicators
//!
//! Spinners and byte counters for the long waits: AVD downloads and the
//! emulator readiness poll. Hidden when stderr is not a terminal.

use console::Term;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

fn draw_target() -> ProgressDrawTarget {
    if Term::stderr().is_term() {
        ProgressDrawTarget::stderr()
    } else {
        ProgressDrawTarget::hidden()
    }
}

/// Create a spinner for indeterminate progress
#[must_use]
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, draw_target());
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Create a byte counter for a download; `total` is the content length if known
#[must_use]
pub fn download(total: Option<u64>, message: &str) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(total, draw_target());
    let style = if total.is_some() {
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .map(|s| s.progress_chars("█▓░"))
    } else {
        ProgressStyle::default_spinner().template("{spinner:.blue} {msg} {bytes}")
    };
    if let Ok(style) = style {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb
}

/// Finish a progress bar with a success message
pub fn finish_success(pb: &ProgressBar, message: &str) {
    pb.finish_with_message(format!("✓ {message}"));
}

/// Finish a progress bar with an error message
pub fn finish_error(pb: &ProgressBar, message: &str) {
    pb.abandon_with_message(format!("✗ {message}"));
}
