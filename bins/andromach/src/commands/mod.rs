//! CLI command implementations

pub mod android;
pub mod emulator;
pub mod gradle;
pub mod install;
pub mod run;

use andromach_core::config::Config;
use std::collections::HashMap;

/// Everything a handler reads from its surroundings
///
/// Handlers never consult or modify the process environment themselves.
#[derive(Debug, Clone)]
pub struct Context {
    pub config: Config,
    /// Snapshot of the environment at startup
    pub env: HashMap<String, String>,
    pub verbose: bool,
}

impl Context {
    pub fn new(config: Config, verbose: bool) -> Self {
        Self {
            config,
            env: std::env::vars().collect(),
            verbose,
        }
    }

    /// Whether an Android build is configured
    pub fn has_build(&self) -> bool {
        self.config.schema.build.topobjdir.is_some()
    }
}
