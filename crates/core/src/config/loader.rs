//! Configuration file loading

use super::schema::ConfigSchema;
use crate::error::{Error, ErrorCode, Result, ResultExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variables that override file values
pub mod env_keys {
    /// Java executable, `build.java`
    pub const JAVA: &str = "ANDROMACH_JAVA";
    /// `build.android_sdk_root`
    pub const ANDROID_SDK_ROOT: &str = "ANDROID_SDK_ROOT";
    /// Set in automation, `build.automation`
    pub const AUTOMATION: &str = "MOZ_AUTOMATION";
    /// Fallback for `gradle.flags`
    pub const GRADLE_FLAGS: &str = "GRADLE_FLAGS";
    /// `device.serial`
    pub const DEVICE_SERIAL: &str = "DEVICE_SERIAL";
}

/// Configuration wrapper
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed values, overrides applied
    pub schema: ConfigSchema,
    /// File the values came from, if any
    pub path: Option<String>,
}

impl Config {
    /// Load configuration from a file path or use defaults, then apply
    /// overrides from the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_with_env(path, &env)
    }

    /// Like [`Config::load`] with an explicit environment
    pub fn load_with_env(path: Option<&Path>, env: &HashMap<String, String>) -> Result<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => return Err(Error::config_not_found(p)),
            Some(p) => Some(p.to_path_buf()),
            None => find_config_file(),
        };

        let mut schema = if let Some(ref p) = config_path {
            load_config_file(p)?
        } else {
            ConfigSchema::default()
        };

        apply_env_overrides(&mut schema, env);
        expand_paths(&mut schema)?;
        validate(&schema)?;

        Ok(Self {
            schema,
            path: config_path.map(|p| p.display().to_string()),
        })
    }
}

/// Find configuration file in standard locations
fn find_config_file() -> Option<PathBuf> {
    let candidates = [
        ".andromach.toml",
        "andromach.toml",
        ".config/andromach.toml",
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|candidate| candidate.exists())
}

/// Load and parse a TOML configuration file
fn load_config_file(path: &Path) -> Result<ConfigSchema> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .context(format!("Failed to read config file {}", path.display()))?;

    toml::from_str(&content)
        .map_err(Error::from)
        .context(format!("Failed to parse config file {}", path.display()))
}

fn non_empty<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn apply_env_overrides(schema: &mut ConfigSchema, env: &HashMap<String, String>) {
    if let Some(java) = non_empty(env, env_keys::JAVA) {
        schema.build.java = Some(PathBuf::from(java));
    }
    if let Some(sdk) = non_empty(env, env_keys::ANDROID_SDK_ROOT) {
        schema.build.android_sdk_root = Some(PathBuf::from(sdk));
    }
    if non_empty(env, env_keys::AUTOMATION).is_some_and(|v| v != "0") {
        schema.build.automation = true;
    }
    if schema.gradle.flags.as_deref().map_or(true, str::is_empty) {
        if let Some(flags) = non_empty(env, env_keys::GRADLE_FLAGS) {
            schema.gradle.flags = Some(flags.to_string());
        }
    }
    if let Some(serial) = non_empty(env, env_keys::DEVICE_SERIAL) {
        schema.device.serial = Some(serial.to_string());
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    shellexpand::full(&raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| {
            Error::new(
                ErrorCode::InvalidPath,
                format!("Cannot expand path {raw}: {e}"),
            )
        })
}

fn expand_opt(path: &mut Option<PathBuf>) -> Result<()> {
    if let Some(p) = path.as_mut() {
        *p = expand(p)?;
    }
    Ok(())
}

fn expand_paths(schema: &mut ConfigSchema) -> Result<()> {
    schema.build.topsrcdir = expand(&schema.build.topsrcdir)?;
    expand_opt(&mut schema.build.topobjdir)?;
    expand_opt(&mut schema.build.java)?;
    expand_opt(&mut schema.build.android_sdk_root)?;
    expand_opt(&mut schema.emulator.binary)?;
    expand_opt(&mut schema.emulator.avd_home)?;
    expand_opt(&mut schema.docs.javadoc_jar)?;
    Ok(())
}

fn validate(schema: &ConfigSchema) -> Result<()> {
    let emulator = &schema.emulator;
    if emulator.launch_timeout_secs == 0 || emulator.poll_interval_secs == 0 {
        return Err(Error::new(
            ErrorCode::ConfigValidationError,
            "emulator.launch_timeout_secs and emulator.poll_interval_secs must be positive",
        ));
    }
    if emulator.poll_interval_secs > emulator.launch_timeout_secs {
        return Err(Error::new(
            ErrorCode::ConfigValidationError,
            "emulator.poll_interval_secs must not exceed emulator.launch_timeout_secs",
        ));
    }
    if schema.docs.http_timeout_secs == 0 {
        return Err(Error::new(
            ErrorCode::ConfigValidationError,
            "docs.http_timeout_secs must be positive",
        ));
    }
    Ok(())
}
