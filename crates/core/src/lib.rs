//! Core utilities for the andromach command-line tool
//!
//! This crate provides the shared plumbing every command relies on:
//!
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Process execution**: the launcher that runs build tools, adb and git
//! - **Configuration**: TOML-based configuration with environment overrides
//! - **Git operations**: clone, stage, commit and push through command-line git
//!
//! # Example
//!
//! ```rust,no_run
//! use andromach_core::process::{launch, EnvOverlay, LaunchSpec};
//!
//! let env = EnvOverlay::new().with("JAVA_TOOL_OPTIONS", "-Dfile.encoding=utf-8");
//! let spec = LaunchSpec::new("./gradlew")
//!     .arg("tasks")
//!     .append_env(&env)
//!     .fail_on_nonzero_exit(false);
//! let code = launch(&spec).expect("gradle could not be started");
//! println!("gradle exited with {code}");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod git;
pub mod process;

pub use error::{Error, ErrorCode, Result, ResultExt};
