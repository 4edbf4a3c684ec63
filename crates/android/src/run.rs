//! `run`: start an application on a connected device
//!
//! Resolves the launch activity for a package, optionally pushes a host
//! profile, and starts the activity with launch extras.

use crate::device::{DeviceBridge, ExtraValue, LaunchExtras, LaunchRequest};
use andromach_cli::output::Status;
use andromach_core::error::{exit_codes, Error, ErrorCode, Result};
use std::path::Path;

/// Package launched when `--app` is not given
pub const DEFAULT_APP: &str = "org.mozilla.geckoview_example";

/// Intent used when `--intent` is not given
pub const DEFAULT_INTENT: &str = "android.intent.action.VIEW";

/// Activity started for `app`
///
/// Only three application families are known; anything else is rejected
/// before touching a device.
pub fn activity_for(app: &str) -> Result<&'static str> {
    match app {
        "org.mozilla.geckoview_example" => Ok("org.mozilla.geckoview_example.GeckoViewActivity"),
        "org.mozilla.geckoview.test" => Ok("org.mozilla.geckoview.test.TestRunnerActivity"),
        _ if app.contains("fennec") || app.contains("firefox") => {
            Ok("org.mozilla.gecko.BrowserApp")
        }
        _ => Err(Error::unrecognized_application(app)),
    }
}

/// On-device location of a pushed profile
///
/// Always under `/data/local/tmp`, where GeckoView reads its configuration.
pub fn target_profile_path(app: &str) -> String {
    format!("/data/local/tmp/{app}-profile")
}

/// Flags of the `run` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Package to start
    pub app: String,
    /// Intent action
    pub intent: String,
    /// `FOO=BAR` assignments for the target process
    pub env: Vec<String>,
    /// Host directory, or a path already on the device
    pub profile: Option<String>,
    /// URL to open
    pub url: Option<String>,
    /// Skip the installed-package check
    pub no_install: bool,
    /// Return without waiting for the activity
    pub no_wait: bool,
    /// Refuse to start an application that is already running
    pub fail_if_running: bool,
    /// Stop the application first
    pub restart: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            app: DEFAULT_APP.to_string(),
            intent: DEFAULT_INTENT.to_string(),
            env: Vec::new(),
            profile: None,
            url: None,
            no_install: false,
            no_wait: false,
            fail_if_running: false,
            restart: false,
        }
    }
}

/// Run the application described by `opts`
///
/// `connect` is only called once the activity is known. It returns `None` when
/// no device is connected, which yields exit code 1.
pub fn run<B, F>(opts: &RunOptions, connect: F) -> Result<i32>
where
    B: DeviceBridge,
    F: FnOnce() -> Result<Option<B>>,
{
    let activity = activity_for(&opts.app)?;

    let Some(device) = connect()? else {
        Status::error("No ADB devices connected.");
        return Ok(exit_codes::FAILURE);
    };
    tracing::debug!(serial = device.serial(), "using device");

    if !opts.no_install && !device.is_app_installed(&opts.app)? {
        return Err(Error::new(
            ErrorCode::ApplicationNotInstalled,
            format!("{} is not installed on {}", opts.app, device.serial()),
        )
        .with_suggestion("Run `andromach install`, or pass --no-install"));
    }

    let mut args = Vec::new();
    if let Some(profile) = &opts.profile {
        let target = prepare_profile(&device, &opts.app, profile)?;
        args.push("--profile".to_string());
        args.push(shlex::try_quote(&target).map_or(target.clone(), |q| q.into_owned()));
    }

    let mut extras = LaunchExtras::new();
    for (i, assignment) in opts.env.iter().enumerate() {
        extras.insert(format!("env{i}"), ExtraValue::Str(assignment.clone()));
    }
    if !args.is_empty() {
        extras.insert("args".to_string(), ExtraValue::Str(args.join(" ")));
    }
    // Only GeckoViewActivity and TestRunnerActivity read this extra.
    extras.insert("use_multiprocess".to_string(), ExtraValue::Bool(true));

    let restart = opts.restart || !opts.env.is_empty() || !args.is_empty();
    if restart {
        tracing::info!(app = %opts.app, "Stopping {} to ensure clean restart.", opts.app);
        device.stop_application(&opts.app)?;
    } else if opts.fail_if_running && device.is_app_running(&opts.app)? {
        return Err(Error::new(
            ErrorCode::ApplicationRunning,
            format!("{} is already running", opts.app),
        )
        .with_suggestion("Pass --restart to stop it first"));
    }

    tracing::info!(app = %opts.app, activity, "Starting {}/{}.", opts.app, activity);
    device.launch_application(&LaunchRequest {
        app: opts.app.clone(),
        activity: activity.to_string(),
        intent: opts.intent.clone(),
        extras,
        url: opts.url.clone(),
        wait: !opts.no_wait,
    })?;

    Ok(exit_codes::SUCCESS)
}

/// Push a host profile directory to the device, replacing what was there
///
/// Returns the on-device profile path. A value that is not a local directory
/// is taken to be a path on the device already.
fn prepare_profile<B: DeviceBridge>(device: &B, app: &str, profile: &str) -> Result<String> {
    let host = Path::new(profile);
    if host.is_dir() {
        let target = target_profile_path(app);
        device.rm(&target, true, true)?;
        device.push(host, &target)?;
        tracing::info!(
            host_profile = %profile,
            target_profile = %target,
            "Pushed profile from host \"{}\" to target \"{}\"",
            profile,
            target
        );
        Ok(target)
    } else {
        tracing::info!(target_profile = %profile, "Using profile from target \"{}\"", profile);
        Ok(profile.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::PathBuf;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Rm(String, bool, bool),
        Push(PathBuf, String),
        Stop(String),
        Launch(LaunchRequest),
    }

    #[derive(Default)]
    struct FakeDevice {
        installed: bool,
        running: bool,
        calls: RefCell<Vec<Call>>,
    }

    impl FakeDevice {
        fn installed() -> Self {
            Self {
                installed: true,
                ..Self::default()
            }
        }

        fn launched(&self) -> LaunchRequest {
            self.calls
                .borrow()
                .iter()
                .find_map(|c| match c {
                    Call::Launch(r) => Some(r.clone()),
                    _ => None,
                })
                .expect("no launch recorded")
        }
    }

    impl DeviceBridge for &FakeDevice {
        fn serial(&self) -> &str {
            "emulator-5554"
        }

        fn rm(&self, path: &str, recursive: bool, force: bool) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(Call::Rm(path.to_string(), recursive, force));
            Ok(())
        }

        fn push(&self, local: &Path, remote: &str) -> Result<()> {
            self.calls
                .borrow_mut()
                .push(Call::Push(local.to_path_buf(), remote.to_string()));
            Ok(())
        }

        fn is_app_installed(&self, _app: &str) -> Result<bool> {
            Ok(self.installed)
        }

        fn is_app_running(&self, _app: &str) -> Result<bool> {
            Ok(self.running)
        }

        fn stop_application(&self, app: &str) -> Result<()> {
            self.calls.borrow_mut().push(Call::Stop(app.to_string()));
            Ok(())
        }

        fn launch_application(&self, request: &LaunchRequest) -> Result<()> {
            self.calls.borrow_mut().push(Call::Launch(request.clone()));
            Ok(())
        }
    }

    fn opts(app: &str) -> RunOptions {
        RunOptions {
            app: app.to_string(),
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_activity_lookup() {
        assert_eq!(
            activity_for("org.mozilla.geckoview_example").unwrap(),
            "org.mozilla.geckoview_example.GeckoViewActivity"
        );
        assert_eq!(
            activity_for("org.mozilla.geckoview.test").unwrap(),
            "org.mozilla.geckoview.test.TestRunnerActivity"
        );
        assert_eq!(
            activity_for("org.mozilla.fennec_aurora").unwrap(),
            "org.mozilla.gecko.BrowserApp"
        );
        assert_eq!(
            activity_for("org.mozilla.firefox").unwrap(),
            "org.mozilla.gecko.BrowserApp"
        );
    }

    #[test]
    fn test_unknown_app_fails_before_device() {
        let mut connected = false;
        let result = run(&opts("com.example.browser"), || {
            connected = true;
            Ok(None::<&FakeDevice>)
        });
        let err = result.unwrap_err();
        assert_eq!(err.code, ErrorCode::UnrecognizedApplication);
        assert!(!connected);
    }

    #[test]
    fn test_no_device_returns_failure() {
        let code = run(&opts(DEFAULT_APP), || Ok(None::<&FakeDevice>)).unwrap();
        assert_eq!(code, exit_codes::FAILURE);
    }

    #[test]
    fn test_not_installed_is_an_error() {
        let device = FakeDevice::default();
        let err = run(&opts(DEFAULT_APP), || Ok(Some(&device))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ApplicationNotInstalled);
    }

    #[test]
    fn test_no_install_skips_check() {
        let device = FakeDevice::default();
        let options = RunOptions {
            no_install: true,
            ..opts(DEFAULT_APP)
        };
        assert_eq!(run(&options, || Ok(Some(&device))).unwrap(), 0);
    }

    #[test]
    fn test_plain_launch() {
        let device = FakeDevice::installed();
        let options = RunOptions {
            url: Some("https://example.com".to_string()),
            fail_if_running: true,
            ..opts(DEFAULT_APP)
        };
        assert_eq!(run(&options, || Ok(Some(&device))).unwrap(), 0);

        let calls = device.calls.borrow();
        assert_eq!(calls.len(), 1, "no stop without restart");
        drop(calls);

        let request = device.launched();
        assert_eq!(request.activity, "org.mozilla.geckoview_example.GeckoViewActivity");
        assert_eq!(request.intent, DEFAULT_INTENT);
        assert_eq!(request.url.as_deref(), Some("https://example.com"));
        assert!(request.wait);
        assert_eq!(
            request.extras.get("use_multiprocess"),
            Some(&ExtraValue::Bool(true))
        );
        assert!(!request.extras.contains_key("args"));
    }

    #[test]
    fn test_local_profile_is_replaced_and_pushed() {
        let device = FakeDevice::installed();
        let profile = tempfile::tempdir().unwrap();
        let options = RunOptions {
            profile: Some(profile.path().to_string_lossy().into_owned()),
            ..opts(DEFAULT_APP)
        };
        run(&options, || Ok(Some(&device))).unwrap();

        let target = "/data/local/tmp/org.mozilla.geckoview_example-profile".to_string();
        let calls = device.calls.borrow();
        assert_eq!(calls[0], Call::Rm(target.clone(), true, true));
        assert_eq!(calls[1], Call::Push(profile.path().to_path_buf(), target.clone()));
        assert_eq!(calls[2], Call::Stop(DEFAULT_APP.to_string()));
        drop(calls);

        assert_eq!(
            device.launched().extras.get("args"),
            Some(&ExtraValue::Str(format!("--profile {target}")))
        );
    }

    #[test]
    fn test_device_profile_is_used_as_is() {
        let device = FakeDevice::installed();
        let options = RunOptions {
            profile: Some("/sdcard/my profile".to_string()),
            ..opts(DEFAULT_APP)
        };
        run(&options, || Ok(Some(&device))).unwrap();

        let calls = device.calls.borrow();
        assert!(!calls.iter().any(|c| matches!(c, Call::Push(..) | Call::Rm(..))));
        drop(calls);
        assert_eq!(
            device.launched().extras.get("args"),
            Some(&ExtraValue::Str("--profile '/sdcard/my profile'".to_string()))
        );
    }

    #[test]
    fn test_env_forces_restart() {
        let device = FakeDevice::installed();
        let options = RunOptions {
            env: vec!["MOZ_LOG=all:5".to_string(), "FOO=BAR".to_string()],
            fail_if_running: true,
            ..opts("org.mozilla.geckoview.test")
        };
        run(&options, || Ok(Some(&device))).unwrap();

        assert_eq!(
            device.calls.borrow()[0],
            Call::Stop("org.mozilla.geckoview.test".to_string())
        );
        let request = device.launched();
        assert_eq!(
            request.extras.get("env0"),
            Some(&ExtraValue::Str("MOZ_LOG=all:5".to_string()))
        );
        assert_eq!(
            request.extras.get("env1"),
            Some(&ExtraValue::Str("FOO=BAR".to_string()))
        );
    }

    #[test]
    fn test_restart_flag_stops_first() {
        let device = FakeDevice::installed();
        let options = RunOptions {
            restart: true,
            no_wait: true,
            ..opts("org.mozilla.fennec")
        };
        run(&options, || Ok(Some(&device))).unwrap();
        assert_eq!(
            device.calls.borrow()[0],
            Call::Stop("org.mozilla.fennec".to_string())
        );
        assert!(!device.launched().wait);
    }

    #[test]
    fn test_fail_if_running_refuses_live_app() {
        let device = FakeDevice {
            running: true,
            ..FakeDevice::installed()
        };
        let options = RunOptions {
            fail_if_running: true,
            ..opts(DEFAULT_APP)
        };
        let err = run(&options, || Ok(Some(&device))).unwrap_err();
        assert_eq!(err.code, ErrorCode::ApplicationRunning);
        assert!(device.calls.borrow().is_empty());
    }

    #[test]
    fn test_running_app_is_launched_without_fail_flag() {
        let device = FakeDevice {
            running: true,
            ..FakeDevice::installed()
        };
        assert_eq!(run(&opts(DEFAULT_APP), || Ok(Some(&device))).unwrap(), 0);
        device.launched();
    }

    #[test]
    fn test_restart_overrides_fail_if_running() {
        let device = FakeDevice {
            running: true,
            ..FakeDevice::installed()
        };
        let options = RunOptions {
            restart: true,
            fail_if_running: true,
            ..opts(DEFAULT_APP)
        };
        assert_eq!(run(&options, || Ok(Some(&device))).unwrap(), 0);
        assert_eq!(device.calls.borrow()[0], Call::Stop(DEFAULT_APP.to_string()));
        device.launched();
    }
}
