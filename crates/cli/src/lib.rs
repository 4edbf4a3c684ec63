//! Terminal helpers for andromach
//!
//! Provides shared CLI functionality:
//! - Status lines and error reports
//! - Progress indicators for long waits

#![warn(missing_docs)]

pub mod output;
pub mod progress;
