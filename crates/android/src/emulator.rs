//! Android Emulator management
//!
//! Starts the emulator with an AVD from test automation, fetching the AVD
//! first when it is missing, and waits for the device to finish booting.

use crate::avd::{avd_for_version, AvdInfo, AvdStore};
use crate::device::{Adb, DeviceState};
use andromach_cli::output::Status;
use andromach_cli::progress;
use andromach_core::config::{ConfigSchema, EmulatorConfig};
use andromach_core::error::{Error, ErrorCode, Result};
use andromach_core::process::{spawn, which_command, EnvOverlay, LaunchSpec};
use std::path::{Path, PathBuf};
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

/// Serial of the emulator started by this tool
pub const EMULATOR_SERIAL: &str = "emulator-5554";

/// Console port matching [`EMULATOR_SERIAL`]
pub const EMULATOR_PORT: u16 = 5554;

/// Lifecycle of one emulator instance
pub trait EmulatorControl {
    /// Whether an emulator already answers on [`EMULATOR_SERIAL`]
    fn is_running(&mut self) -> Result<bool>;

    /// Whether the emulator binary can be found
    fn is_available(&self) -> bool;

    /// Whether the AVD is installed and no update is forced
    fn check_avd(&self, force_update: bool) -> bool;

    /// Fetch and install the AVD
    fn update_avd(&mut self, force_update: bool) -> Result<()>;

    /// Human readable AVD description
    fn avd_description(&self) -> &str;

    /// Start the emulator process in the background
    fn start(&mut self) -> Result<()>;

    /// Poll until the device has booted; false on timeout or early exit
    fn wait_for_start(&mut self) -> Result<bool>;

    /// Block until the emulator exits and return its exit code if known
    fn wait(&mut self) -> Result<Option<i32>>;
}

/// Flags of the `android-emulator` command
#[derive(Debug, Clone)]
pub struct EmulatorOptions {
    /// Catalogue version, see [`crate::avd::AVDS`]
    pub version: String,
    /// Block until the emulator exits
    pub wait: bool,
    /// Fetch the AVD even when it is installed
    pub force_update: bool,
    /// Log the emulator command line at info level
    pub verbose: bool,
}

impl Default for EmulatorOptions {
    fn default() -> Self {
        Self {
            version: crate::avd::DEFAULT_VERSION.to_string(),
            wait: false,
            force_update: false,
            verbose: false,
        }
    }
}

/// Start an emulator, enforcing one instance at a time
///
/// Returns 1 if an emulator is already running, 2 if the binary is missing,
/// and 0 once the emulator has been started (and closed, with `wait`).
pub fn run_emulator<E: EmulatorControl>(
    emulator: &mut E,
    opts: &EmulatorOptions,
    has_build: bool,
) -> Result<i32> {
    if emulator.is_running()? {
        tracing::error!(serial = EMULATOR_SERIAL, "emulator already running");
        Status::error("An Android emulator is already running.");
        Status::hint("Close the existing emulator and re-run this command.");
        return Ok(1);
    }

    if !emulator.is_available() {
        Status::warning("Emulator binary not found.");
        Status::hint("Install the Android SDK and make sure 'emulator' is in your PATH.");
        return Ok(ErrorCode::EmulatorNotFound.exit_code());
    }

    if !emulator.check_avd(opts.force_update) {
        Status::info("Fetching and installing AVD. This may take a few minutes...");
        emulator.update_avd(opts.force_update)?;
    }

    Status::info(&format!(
        "Starting Android emulator running {}...",
        emulator.avd_description()
    ));
    emulator.start()?;
    if emulator.wait_for_start()? {
        Status::success("Android emulator is running.");
    } else {
        // the emulator may still come up later
        Status::warning("Unable to verify that emulator is running.");
    }

    if has_build {
        Status::hint("Use 'andromach install' to install or update Firefox on your emulator.");
    } else {
        Status::warning("No Firefox for Android build detected.");
        Status::hint("Configure build.topobjdir to point at an Android build.");
    }

    if opts.wait {
        Status::info("Waiting for Android emulator to close...");
        match emulator.wait()? {
            Some(code) => {
                tracing::info!(code, "emulator exited");
                Status::info(&format!("Android emulator completed with return code {code}."));
            }
            None => Status::warning("Unable to retrieve Android emulator return code."),
        }
    }
    Ok(0)
}

/// Locate the emulator binary: configured path, then the SDK, then `PATH`
pub fn find_emulator_binary(config: &EmulatorConfig, sdk_root: Option<&Path>) -> Option<PathBuf> {
    if let Some(binary) = &config.binary {
        return binary.is_file().then(|| binary.clone());
    }
    sdk_root
        .map(|root| root.join("emulator").join("emulator"))
        .filter(|p| p.is_file())
        .or_else(|| which_command("emulator"))
}

/// Poll `ready` every `interval` until it holds, `exited` reports the
/// process gone, or `timeout` elapses
pub fn poll_until(
    timeout: Duration,
    interval: Duration,
    mut exited: impl FnMut() -> bool,
    mut ready: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if exited() {
            return false;
        }
        if ready() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(interval);
    }
}

/// Emulator from the Android SDK
#[derive(Debug)]
pub struct AndroidEmulator {
    avd: &'static AvdInfo,
    store: AvdStore,
    binary: Option<PathBuf>,
    adb: String,
    launch_timeout: Duration,
    poll_interval: Duration,
    verbose: bool,
    child: Option<Child>,
}

impl AndroidEmulator {
    /// Emulator for the AVD selected by `opts`
    pub fn new(schema: &ConfigSchema, opts: &EmulatorOptions) -> Result<Self> {
        let avd = avd_for_version(&opts.version)?;
        Ok(Self {
            avd,
            store: AvdStore::from_config(&schema.emulator),
            binary: find_emulator_binary(&schema.emulator, schema.build.android_sdk_root.as_deref()),
            adb: schema.device.adb.clone(),
            launch_timeout: Duration::from_secs(schema.emulator.launch_timeout_secs),
            poll_interval: Duration::from_secs(schema.emulator.poll_interval_secs),
            verbose: opts.verbose,
            child: None,
        })
    }

    fn is_booted(&self) -> bool {
        let online = match Adb::devices(&self.adb) {
            Ok(devices) => devices
                .iter()
                .any(|d| d.serial == EMULATOR_SERIAL && d.state == DeviceState::Online),
            Err(e) => {
                tracing::debug!(error = %e, "adb devices failed while polling");
                false
            }
        };
        online
            && Adb::new(self.adb.clone(), EMULATOR_SERIAL)
                .getprop("sys.boot_completed")
                .is_ok_and(|v| v == "1")
    }
}

impl EmulatorControl for AndroidEmulator {
    fn is_running(&mut self) -> Result<bool> {
        match Adb::devices(&self.adb) {
            Ok(devices) => Ok(devices.iter().any(|d| d.serial == EMULATOR_SERIAL)),
            // no adb means nothing we could talk to is running
            Err(e) if e.code == ErrorCode::CommandNotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn check_avd(&self, force_update: bool) -> bool {
        !force_update && self.store.is_installed(self.avd)
    }

    fn update_avd(&mut self, _force_update: bool) -> Result<()> {
        self.store.fetch_and_install(self.avd)
    }

    fn avd_description(&self) -> &str {
        self.avd.description
    }

    fn start(&mut self) -> Result<()> {
        let Some(binary) = &self.binary else {
            return Err(Error::new(
                ErrorCode::EmulatorNotFound,
                "Emulator binary not found",
            ));
        };
        let spec = LaunchSpec::new(binary.to_string_lossy())
            .args(["-avd", self.avd.name, "-port"])
            .arg(EMULATOR_PORT.to_string())
            .args(self.avd.extra_args.iter().copied())
            .append_env(&EnvOverlay::new().with(
                "ANDROID_AVD_HOME",
                self.store.home().to_string_lossy(),
            ))
            .stream_output(self.verbose);
        let child = spawn(&spec)?;
        tracing::info!(avd = self.avd.name, pid = child.id(), "emulator started");
        self.child = Some(child);
        Ok(())
    }

    fn wait_for_start(&mut self) -> Result<bool> {
        let pb = progress::spinner("Waiting for emulator to boot...");
        let timeout = self.launch_timeout;
        let interval = self.poll_interval;

        let mut child = self.child.take();
        let booted = poll_until(
            timeout,
            interval,
            || match child.as_mut().map(Child::try_wait) {
                Some(Ok(Some(status))) => {
                    tracing::warn!(code = ?status.code(), "emulator exited during boot");
                    true
                }
                _ => false,
            },
            || self.is_booted(),
        );
        self.child = child;

        if booted {
            progress::finish_success(&pb, "Emulator booted");
        } else {
            progress::finish_error(&pb, "Emulator did not report boot completion");
        }
        Ok(booted)
    }

    fn wait(&mut self) -> Result<Option<i32>> {
        match self.child.as_mut() {
            Some(child) => Ok(child.wait()?.code()),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeEmulator {
        running: bool,
        available: bool,
        installed: bool,
        booted: bool,
        exit_code: Option<i32>,
        starts: usize,
        updates: usize,
        waits: usize,
    }

    impl FakeEmulator {
        fn ready() -> Self {
            Self {
                available: true,
                installed: true,
                booted: true,
                ..Self::default()
            }
        }
    }

    impl EmulatorControl for FakeEmulator {
        fn is_running(&mut self) -> Result<bool> {
            Ok(self.running)
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn check_avd(&self, force_update: bool) -> bool {
            !force_update && self.installed
        }

        fn update_avd(&mut self, _force_update: bool) -> Result<()> {
            self.updates += 1;
            self.installed = true;
            Ok(())
        }

        fn avd_description(&self) -> &str {
            "Android 7.0 x86/x86_64"
        }

        fn start(&mut self) -> Result<()> {
            self.starts += 1;
            self.running = true;
            Ok(())
        }

        fn wait_for_start(&mut self) -> Result<bool> {
            Ok(self.booted)
        }

        fn wait(&mut self) -> Result<Option<i32>> {
            self.waits += 1;
            Ok(self.exit_code)
        }
    }

    #[test]
    fn test_second_start_short_circuits() {
        let mut emulator = FakeEmulator::ready();
        let opts = EmulatorOptions::default();
        assert_eq!(run_emulator(&mut emulator, &opts, true).unwrap(), 0);
        assert_eq!(run_emulator(&mut emulator, &opts, true).unwrap(), 1);
        assert_eq!(emulator.starts, 1);
    }

    #[test]
    fn test_missing_binary_returns_two() {
        let mut emulator = FakeEmulator {
            available: false,
            ..FakeEmulator::ready()
        };
        assert_eq!(
            run_emulator(&mut emulator, &EmulatorOptions::default(), true).unwrap(),
            2
        );
        assert_eq!(emulator.starts, 0);
    }

    #[test]
    fn test_missing_avd_is_fetched_before_start() {
        let mut emulator = FakeEmulator {
            installed: false,
            ..FakeEmulator::ready()
        };
        run_emulator(&mut emulator, &EmulatorOptions::default(), false).unwrap();
        assert_eq!(emulator.updates, 1);
        assert_eq!(emulator.starts, 1);
    }

    #[test]
    fn test_installed_avd_starts_directly() {
        let mut emulator = FakeEmulator::ready();
        run_emulator(&mut emulator, &EmulatorOptions::default(), true).unwrap();
        assert_eq!(emulator.updates, 0);
        assert_eq!(emulator.starts, 1);
    }

    #[test]
    fn test_force_update_fetches_installed_avd() {
        let mut emulator = FakeEmulator::ready();
        let opts = EmulatorOptions {
            force_update: true,
            ..EmulatorOptions::default()
        };
        run_emulator(&mut emulator, &opts, true).unwrap();
        assert_eq!(emulator.updates, 1);
    }

    #[test]
    fn test_unverified_boot_still_succeeds() {
        let mut emulator = FakeEmulator {
            booted: false,
            ..FakeEmulator::ready()
        };
        assert_eq!(
            run_emulator(&mut emulator, &EmulatorOptions::default(), true).unwrap(),
            0
        );
    }

    #[test]
    fn test_wait_blocks_on_process() {
        let mut emulator = FakeEmulator {
            exit_code: Some(0),
            ..FakeEmulator::ready()
        };
        let opts = EmulatorOptions {
            wait: true,
            ..EmulatorOptions::default()
        };
        assert_eq!(run_emulator(&mut emulator, &opts, true).unwrap(), 0);
        assert_eq!(emulator.waits, 1);
    }

    #[test]
    fn test_wait_without_return_code_still_succeeds() {
        let mut emulator = FakeEmulator::ready();
        let opts = EmulatorOptions {
            wait: true,
            ..EmulatorOptions::default()
        };
        assert_eq!(run_emulator(&mut emulator, &opts, false).unwrap(), 0);
        assert_eq!(emulator.waits, 1);
        assert_eq!(emulator.starts, 1);
    }

    #[test]
    fn test_no_wait_never_blocks() {
        let mut emulator = FakeEmulator {
            exit_code: Some(3),
            ..FakeEmulator::ready()
        };
        assert_eq!(
            run_emulator(&mut emulator, &EmulatorOptions::default(), true).unwrap(),
            0
        );
        assert_eq!(emulator.waits, 0);
    }

    #[test]
    fn test_poll_until_ready() {
        let mut calls = 0;
        let ready = poll_until(
            Duration::from_secs(5),
            Duration::ZERO,
            || false,
            || {
                calls += 1;
                calls == 3
            },
        );
        assert!(ready);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_poll_until_stops_when_process_exits() {
        assert!(!poll_until(Duration::from_secs(5), Duration::ZERO, || true, || true));
    }

    #[test]
    fn test_poll_until_times_out() {
        assert!(!poll_until(Duration::ZERO, Duration::ZERO, || false, || false));
    }

    #[test]
    fn test_find_binary_prefers_config() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("my-emulator");
        std::fs::write(&binary, "").unwrap();
        let config = EmulatorConfig {
            binary: Some(binary.clone()),
            ..EmulatorConfig::default()
        };
        assert_eq!(find_emulator_binary(&config, None), Some(binary));
    }

    #[test]
    fn test_find_binary_in_sdk() {
        let sdk = tempfile::tempdir().unwrap();
        let binary = sdk.path().join("emulator").join("emulator");
        std::fs::create_dir_all(binary.parent().unwrap()).unwrap();
        std::fs::write(&binary, "").unwrap();
        assert_eq!(
            find_emulator_binary(&EmulatorConfig::default(), Some(sdk.path())),
            Some(binary)
        );
    }

    #[test]
    fn test_configured_binary_missing() {
        let config = EmulatorConfig {
            binary: Some(PathBuf::from("/nonexistent/emulator")),
            ..EmulatorConfig::default()
        };
        assert_eq!(find_emulator_binary(&config, None), None);
    }
}
