//! Device bridge
//!
//! Thin wrapper over `adb`: list devices, manage files, and start or stop
//! applications. Handlers talk to the [`DeviceBridge`] trait so they can be
//! exercised without hardware.

use andromach_core::config::DeviceConfig;
use andromach_core::error::{Error, Result};
use andromach_core::process::{launch, run_command, CommandResult, LaunchSpec};
use std::collections::BTreeMap;
use std::path::Path;

/// Connection state reported by `adb devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    /// Ready for commands (`device`)
    Online,
    /// Known to adb but not responding
    Offline,
    /// Waiting for the USB debugging prompt
    Unauthorized,
    /// Any other state, verbatim
    Other(String),
}

impl DeviceState {
    fn parse(raw: &str) -> Self {
        match raw {
            "device" => Self::Online,
            "offline" => Self::Offline,
            "unauthorized" => Self::Unauthorized,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One line of `adb devices`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// Device serial, e.g. `emulator-5554`
    pub serial: String,
    /// Connection state
    pub state: DeviceState,
}

/// Parse `adb devices` output
pub fn parse_devices(output: &str) -> Vec<DeviceEntry> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of devices") && !l.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(DeviceEntry {
                serial: serial.to_string(),
                state: DeviceState::parse(state),
            })
        })
        .collect()
}

/// A value passed with `am start`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraValue {
    /// `--es`
    Str(String),
    /// `--ez`
    Bool(bool),
}

/// Key-value parameters handed to an application at start time
pub type LaunchExtras = BTreeMap<String, ExtraValue>;

/// Everything `am start` needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Package name
    pub app: String,
    /// Fully qualified activity class
    pub activity: String,
    /// Intent action
    pub intent: String,
    /// Extras handed to the activity
    pub extras: LaunchExtras,
    /// Data URI (`-d`)
    pub url: Option<String>,
    /// Block until the activity has launched
    pub wait: bool,
}

impl LaunchRequest {
    /// Arguments for `adb shell`
    pub fn am_start_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["am".into(), "start".into()];
        if self.wait {
            args.push("-W".into());
        }
        args.push("-a".into());
        args.push(self.intent.clone());
        args.push("-n".into());
        args.push(format!("{}/{}", self.app, self.activity));
        for (key, value) in &self.extras {
            match value {
                ExtraValue::Str(s) => {
                    args.push("--es".into());
                    args.push(key.clone());
                    args.push(quote(s));
                }
                ExtraValue::Bool(b) => {
                    args.push("--ez".into());
                    args.push(key.clone());
                    args.push(b.to_string());
                }
            }
        }
        if let Some(url) = &self.url {
            args.push("-d".into());
            args.push(quote(url));
        }
        args
    }
}

/// Quote for the device shell; `adb shell` joins its arguments with spaces
fn quote(value: &str) -> String {
    shlex::try_quote(value).map_or_else(|_| value.to_string(), |q| q.into_owned())
}

/// Operations on one connected device
pub trait DeviceBridge {
    /// Serial of the device this bridge talks to
    fn serial(&self) -> &str;

    /// Remove a path on the device
    fn rm(&self, path: &str, recursive: bool, force: bool) -> Result<()>;

    /// Copy a local file or directory to the device
    fn push(&self, local: &Path, remote: &str) -> Result<()>;

    /// Whether a package is installed
    fn is_app_installed(&self, app: &str) -> Result<bool>;

    /// Whether a package has a live process
    fn is_app_running(&self, app: &str) -> Result<bool>;

    /// Force-stop an application
    fn stop_application(&self, app: &str) -> Result<()>;

    /// Start an activity
    fn launch_application(&self, request: &LaunchRequest) -> Result<()>;
}

/// Pick the device to use: the configured serial, else the first online device
pub fn resolve_serial(configured: Option<&str>, devices: &[DeviceEntry]) -> Option<String> {
    match configured {
        Some(serial) => devices
            .iter()
            .any(|d| d.serial == serial && d.state == DeviceState::Online)
            .then(|| serial.to_string()),
        None => devices
            .iter()
            .find(|d| d.state == DeviceState::Online)
            .map(|d| d.serial.clone()),
    }
}

/// `adb`-backed [`DeviceBridge`]
#[derive(Debug, Clone)]
pub struct Adb {
    program: String,
    serial: String,
}

impl Adb {
    /// Bridge to a specific device
    pub fn new(program: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            serial: serial.into(),
        }
    }

    /// List devices known to the adb server
    pub fn devices(program: &str) -> Result<Vec<DeviceEntry>> {
        let result = run_command(program, &["devices"])?;
        if !result.success {
            return Err(Error::device(format!(
                "adb devices failed: {}",
                result.stderr.trim()
            )));
        }
        Ok(parse_devices(&result.stdout))
    }

    /// Connect to the configured device, or the first online one
    ///
    /// Returns `Ok(None)` when nothing usable is connected.
    pub fn connect(config: &DeviceConfig) -> Result<Option<Self>> {
        let devices = Self::devices(&config.adb)?;
        tracing::debug!(count = devices.len(), "adb devices");
        Ok(resolve_serial(config.serial.as_deref(), &devices)
            .map(|serial| Self::new(config.adb.clone(), serial)))
    }

    fn adb(&self) -> LaunchSpec {
        LaunchSpec::new(&self.program)
            .args(["-s", self.serial.as_str()])
            .stream_output(false)
    }

    /// Run a shell command and capture its output
    pub fn shell(&self, args: &[&str]) -> Result<CommandResult> {
        let mut full = vec!["-s", self.serial.as_str(), "shell"];
        full.extend_from_slice(args);
        run_command(&self.program, &full)
    }

    /// Read a system property
    pub fn getprop(&self, name: &str) -> Result<String> {
        Ok(self.shell(&["getprop", name])?.stdout.trim().to_string())
    }
}

impl DeviceBridge for Adb {
    fn serial(&self) -> &str {
        &self.serial
    }

    fn rm(&self, path: &str, recursive: bool, force: bool) -> Result<()> {
        let mut args = vec!["shell".to_string(), "rm".to_string()];
        if recursive {
            args.push("-r".into());
        }
        if force {
            args.push("-f".into());
        }
        args.push(quote(path));
        // rm -f of a missing path still exits 0; anything else is a real failure
        launch(&self.adb().args(args))?;
        Ok(())
    }

    fn push(&self, local: &Path, remote: &str) -> Result<()> {
        if !local.exists() {
            return Err(Error::file_not_found(local));
        }
        launch(&self.adb().args([
            "push".to_string(),
            local.to_string_lossy().into_owned(),
            remote.to_string(),
        ]))?;
        Ok(())
    }

    fn is_app_installed(&self, app: &str) -> Result<bool> {
        let result = self.shell(&["pm", "list", "packages", app])?;
        let wanted = format!("package:{app}");
        Ok(result.stdout.lines().any(|l| l.trim() == wanted))
    }

    fn is_app_running(&self, app: &str) -> Result<bool> {
        let result = self.shell(&["pidof", app])?;
        Ok(result.success && !result.stdout.trim().is_empty())
    }

    fn stop_application(&self, app: &str) -> Result<()> {
        launch(&self.adb().args(["shell", "am", "force-stop", app]))?;
        Ok(())
    }

    fn launch_application(&self, request: &LaunchRequest) -> Result<()> {
        let mut args = vec!["shell".to_string()];
        args.extend(request.am_start_args());
        let spec = self.adb().args(args).fail_on_nonzero_exit(false);
        tracing::debug!(command = %spec.display(), "am start");
        let code = launch(&spec)?;
        if code != 0 {
            return Err(Error::command_failed("adb shell am start", code));
        }
        Ok(())
    }
}
