//! Configuration schema definitions
//!
//! Every value the handlers need is declared here so nothing reads ambient
//! state behind their backs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    /// `[build]` section
    #[serde(default)]
    pub build: BuildConfig,

    /// `[gradle]` section
    #[serde(default)]
    pub gradle: GradleConfig,

    /// `[device]` section
    #[serde(default)]
    pub device: DeviceConfig,

    /// `[emulator]` section
    #[serde(default)]
    pub emulator: EmulatorConfig,

    /// `[docs]` section
    #[serde(default)]
    pub docs: DocsConfig,
}

/// Build tree and toolchain locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Top of the source tree; gradle runs here
    #[serde(default = "default_topsrcdir")]
    pub topsrcdir: PathBuf,

    /// Object directory of an Android build, if one is configured
    #[serde(default)]
    pub topobjdir: Option<PathBuf>,

    /// Path to the `java` executable, e.g. `$JAVA_HOME/bin/java`
    #[serde(default)]
    pub java: Option<PathBuf>,

    /// Gradle executable
    #[serde(default = "default_gradle")]
    pub gradle: String,

    /// Make executable used by `install`
    #[serde(default = "default_make")]
    pub make: String,

    /// Exported to gradle as `ANDROID_SDK_ROOT` when set
    #[serde(default)]
    pub android_sdk_root: Option<PathBuf>,

    /// Running under automation (plain console output)
    #[serde(default)]
    pub automation: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            topsrcdir: default_topsrcdir(),
            topobjdir: None,
            java: None,
            gradle: default_gradle(),
            make: default_make(),
            android_sdk_root: None,
            automation: false,
        }
    }
}

fn default_topsrcdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_gradle() -> String {
    "./gradlew".to_string()
}

fn default_make() -> String {
    "make".to_string()
}

/// Gradle flags and per-subcommand task lists
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GradleConfig {
    /// Extra flags, shell-split before use. Falls back to `GRADLE_FLAGS`.
    #[serde(default)]
    pub flags: Option<String>,

    /// Task lists per subcommand
    #[serde(default)]
    pub tasks: GradleTasks,
}

/// Task lists for each `android` subcommand
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GradleTasks {
    /// `android assemble-app`
    pub assemble_app: Vec<String>,
    /// `android generate-sdk-bindings`
    pub generate_sdk_bindings: Vec<String>,
    /// `android generate-generated-jni-wrappers`
    pub generate_generated_jni_wrappers: Vec<String>,
    /// `android generate-fennec-jni-wrappers`
    pub generate_fennec_jni_wrappers: Vec<String>,
    /// `android gradle-dependencies`
    pub dependencies: Vec<String>,
    /// `android archive-geckoview`
    pub archive_geckoview: Vec<String>,
    /// `android build-geckoview_example`
    pub build_geckoview_example: Vec<String>,
    /// `android install-geckoview_example`
    pub install_geckoview_example: Vec<String>,
    /// `android geckoview-docs`
    pub geckoview_docs: Vec<String>,
    /// `android geckoview-docs --archive` and `--upload`
    pub geckoview_docs_archive: Vec<String>,
}

impl Default for GradleTasks {
    fn default() -> Self {
        fn tasks(list: &[&str]) -> Vec<String> {
            list.iter().map(|t| (*t).to_string()).collect()
        }

        Self {
            assemble_app: tasks(&["app:assembleWithGeckoBinariesDebug"]),
            generate_sdk_bindings: tasks(&["geckoview:generateSDKBindings"]),
            generate_generated_jni_wrappers: tasks(&[
                "geckoview:generateJNIWrappersForGeneratedWithGeckoBinariesDebug",
            ]),
            generate_fennec_jni_wrappers: tasks(&[
                "app:generateJNIWrappersForFennecWithGeckoBinariesDebug",
            ]),
            dependencies: tasks(&[
                "app:dependencies",
                "geckoview:dependencies",
                "geckoview_example:dependencies",
            ]),
            archive_geckoview: tasks(&[
                "geckoview:assembleWithGeckoBinaries",
                "geckoview:uploadArchives",
            ]),
            build_geckoview_example: tasks(&[
                "geckoview_example:assembleWithGeckoBinaries",
                "geckoview_example:assembleWithGeckoBinariesAndroidTest",
            ]),
            install_geckoview_example: tasks(&[
                "geckoview_example:installWithGeckoBinariesDebug",
            ]),
            geckoview_docs: tasks(&["geckoview:javadocWithGeckoBinariesDebug"]),
            geckoview_docs_archive: tasks(&["geckoview:javadocJarWithGeckoBinariesDebug"]),
        }
    }
}

/// Device bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// adb executable
    #[serde(default = "default_adb")]
    pub adb: String,

    /// Serial of the device to use; overridden by `DEVICE_SERIAL`
    #[serde(default)]
    pub serial: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb: default_adb(),
            serial: None,
        }
    }
}

fn default_adb() -> String {
    "adb".to_string()
}

/// Emulator and AVD configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Explicit emulator binary
    #[serde(default)]
    pub binary: Option<PathBuf>,

    /// Where AVD definitions are installed
    #[serde(default)]
    pub avd_home: Option<PathBuf>,

    /// Base URL serving `<avd-name>.zip` archives
    #[serde(default)]
    pub avd_archive_url: Option<String>,

    /// Upper bound on the readiness poll
    #[serde(default = "default_launch_timeout")]
    pub launch_timeout_secs: u64,

    /// Delay between readiness checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            binary: None,
            avd_home: None,
            avd_archive_url: None,
            launch_timeout_secs: default_launch_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

fn default_launch_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    5
}

/// Documentation publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsConfig {
    /// Secrets endpoint; the secret name is appended as a path segment
    #[serde(default = "default_secrets_url")]
    pub secrets_url: String,

    /// SSH host prefix for the upload repository
    #[serde(default = "default_git_host")]
    pub git_host: String,

    /// Javadoc archive to publish; defaults to the gradle output in `topobjdir`
    #[serde(default)]
    pub javadoc_jar: Option<PathBuf>,

    /// HTTP timeout for the secrets request
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            secrets_url: default_secrets_url(),
            git_host: default_git_host(),
            javadoc_jar: None,
            http_timeout_secs: default_http_timeout(),
        }
    }
}

fn default_secrets_url() -> String {
    "http://taskcluster/secrets/v1/secret".to_string()
}

fn default_git_host() -> String {
    "git@github.com".to_string()
}

fn default_http_timeout() -> u64 {
    30
}
