//! Gradle build system integration
//!
//! Builds the gradle command line and its environment: the JDK derived from
//! the configured `java`, UTF-8 forced for gradle and every JVM it spawns, and
//! the Android SDK root when one is configured.

use andromach_core::config::ConfigSchema;
use andromach_core::error::{Error, ErrorCode, Result};
use andromach_core::process::{launch, EnvOverlay, LaunchSpec};
use std::path::{Path, PathBuf};

/// JVM flag forcing UTF-8 source and resource encoding
pub const UTF8_JVM_FLAG: &str = "-Dfile.encoding=utf-8";

/// Resolved gradle invocation settings
#[derive(Debug, Clone)]
pub struct Gradle {
    program: String,
    topsrcdir: PathBuf,
    java_home: PathBuf,
    flags: Vec<String>,
    android_sdk_root: Option<PathBuf>,
}

impl Gradle {
    /// Resolve gradle settings from configuration
    pub fn from_config(schema: &ConfigSchema) -> Result<Self> {
        let java = schema
            .build
            .java
            .as_deref()
            .ok_or_else(|| Error::missing_config("build.java"))?;
        let java_home = java_home(java)?;

        let mut flags = match schema.gradle.flags.as_deref() {
            Some(raw) => split_flags(raw)?,
            None => Vec::new(),
        };
        if schema.build.automation {
            flags.push("--console=plain".to_string());
        }

        Ok(Self {
            program: schema.build.gradle.clone(),
            topsrcdir: schema.build.topsrcdir.clone(),
            java_home,
            flags,
            android_sdk_root: schema
                .build
                .android_sdk_root
                .clone()
                .filter(|p| !p.as_os_str().is_empty()),
        })
    }

    /// `JAVA_HOME` handed to gradle
    pub fn java_home(&self) -> &Path {
        &self.java_home
    }

    /// Flags placed before the task list
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// Overrides applied on top of the ambient environment
    pub fn env_overrides(&self) -> EnvOverlay {
        let mut env = EnvOverlay::new()
            .with("GRADLE_OPTS", UTF8_JVM_FLAG)
            .with("JAVA_TOOL_OPTIONS", UTF8_JVM_FLAG)
            .with("JAVA_HOME", self.java_home.to_string_lossy());
        if let Some(sdk) = &self.android_sdk_root {
            env.set("ANDROID_SDK_ROOT", sdk.to_string_lossy());
        }
        env
    }

    /// Launch spec for `gradle <flags> <args>`; streams output and never
    /// treats gradle's exit code as an error
    pub fn command<S: AsRef<str>>(&self, args: &[S]) -> LaunchSpec {
        let mut env = EnvOverlay::from_ambient();
        env.extend(&self.env_overrides());

        LaunchSpec::new(&self.program)
            .args(self.flags.iter().cloned())
            .args(args.iter().map(|a| a.as_ref().to_string()))
            .current_dir(&self.topsrcdir)
            .explicit_env(env)
            .stream_output(true)
            .fail_on_nonzero_exit(false)
    }

    /// Run gradle and return its exit code verbatim
    pub fn run<S: AsRef<str>>(&self, args: &[S], verbose: bool) -> Result<i32> {
        let spec = self.command(args);
        if verbose {
            tracing::info!(command = %spec.display(), "running gradle");
        } else {
            tracing::debug!(command = %spec.display(), "running gradle");
        }
        let code = launch(&spec)?;
        tracing::debug!(exit_code = code, "gradle finished");
        Ok(code)
    }
}

/// Turn `$JAVA_HOME/bin/java` into `$JAVA_HOME`
pub fn java_home(java: &Path) -> Result<PathBuf> {
    java.parent()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            Error::new(
                ErrorCode::InvalidPath,
                format!("Cannot derive JAVA_HOME from {}", java.display()),
            )
            .with_suggestion("Point build.java at $JAVA_HOME/bin/java")
        })
}

/// Shell-split a flag string
pub fn split_flags(raw: &str) -> Result<Vec<String>> {
    shlex::split(raw).ok_or_else(|| {
        Error::new(
            ErrorCode::ConfigValidationError,
            format!("Cannot parse gradle flags: {raw}"),
        )
    })
}

/// `ClassName` for `/path/to/ClassName-classes.txt`
pub fn binding_stem(input: &str) -> &str {
    let base = input.rsplit('/').next().unwrap_or(input);
    match base.rfind("-classes.txt") {
        Some(idx) => &base[..idx],
        None => base,
    }
}

/// `-Pgenerate_sdk_bindings_args=<input>:<stem>:…` for the binding generator
pub fn sdk_bindings_arg<S: AsRef<str>>(inputs: &[S]) -> String {
    let pairs: Vec<&str> = inputs
        .iter()
        .flat_map(|input| {
            let input = input.as_ref();
            [input, binding_stem(input)]
        })
        .collect();
    format!("-Pgenerate_sdk_bindings_args={}", pairs.join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(java: &str) -> ConfigSchema {
        let mut schema = ConfigSchema::default();
        schema.build.java = Some(PathBuf::from(java));
        schema.build.topsrcdir = PathBuf::from("/src/gecko");
        schema
    }

    #[test]
    fn test_java_home_strips_two_segments() {
        assert_eq!(
            java_home(Path::new("/opt/jdk-17/bin/java")).unwrap(),
            PathBuf::from("/opt/jdk-17")
        );
    }

    #[test]
    fn test_java_home_rejects_short_path() {
        assert!(java_home(Path::new("java")).is_err());
    }

    #[test]
    fn test_missing_java_is_config_error() {
        let err = Gradle::from_config(&ConfigSchema::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingConfigValue);
    }

    #[test]
    fn test_env_forces_utf8() {
        let gradle = Gradle::from_config(&schema("/opt/jdk/bin/java")).unwrap();
        let env = gradle.env_overrides();
        assert_eq!(env.get("GRADLE_OPTS"), Some(UTF8_JVM_FLAG));
        assert_eq!(env.get("JAVA_TOOL_OPTIONS"), Some(UTF8_JVM_FLAG));
        assert_eq!(env.get("JAVA_HOME"), Some("/opt/jdk"));
        assert_eq!(env.get("ANDROID_SDK_ROOT"), None);
    }

    #[test]
    fn test_sdk_root_only_when_configured() {
        let mut s = schema("/opt/jdk/bin/java");
        s.build.android_sdk_root = Some(PathBuf::from("/opt/android-sdk"));
        let gradle = Gradle::from_config(&s).unwrap();
        assert_eq!(
            gradle.env_overrides().get("ANDROID_SDK_ROOT"),
            Some("/opt/android-sdk")
        );
    }

    #[test]
    fn test_flags_and_automation() {
        let mut s = schema("/opt/jdk/bin/java");
        s.gradle.flags = Some("--offline -Pfoo='a b'".to_string());
        s.build.automation = true;
        let gradle = Gradle::from_config(&s).unwrap();
        assert_eq!(gradle.flags(), ["--offline", "-Pfoo=a b", "--console=plain"]);
    }

    #[test]
    fn test_command_line() {
        let mut s = schema("/opt/jdk/bin/java");
        s.gradle.flags = Some("--offline".to_string());
        let gradle = Gradle::from_config(&s).unwrap();
        let spec = gradle.command(&["app:assemble", "-x", "lint"]);
        assert_eq!(spec.program, "./gradlew");
        assert_eq!(spec.args, ["--offline", "app:assemble", "-x", "lint"]);
        assert_eq!(spec.cwd, Some(PathBuf::from("/src/gecko")));
        assert!(spec.stream_output);
        assert!(!spec.fail_on_nonzero_exit);
        assert_eq!(spec.env.get("JAVA_HOME"), Some("/opt/jdk"));
    }

    #[test]
    fn test_run_passes_exit_code_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = schema("/opt/jdk/bin/java");
        s.build.gradle = "sh".to_string();
        s.build.topsrcdir = dir.path().to_path_buf();
        let gradle = Gradle::from_config(&s).unwrap();
        assert_eq!(gradle.run(&["-c", "exit 7"], false).unwrap(), 7);
    }

    #[test]
    fn test_binding_stem() {
        assert_eq!(binding_stem("/path/to/ClassName-classes.txt"), "ClassName");
        assert_eq!(binding_stem("MediaCodec-classes.txt"), "MediaCodec");
        assert_eq!(binding_stem("/path/other.txt"), "other.txt");
    }

    #[test]
    fn test_sdk_bindings_arg() {
        assert_eq!(
            sdk_bindings_arg(&["/a/AudioFormat-classes.txt", "/b/Surface-classes.txt"]),
            "-Pgenerate_sdk_bindings_args=/a/AudioFormat-classes.txt:AudioFormat:/b/Surface-classes.txt:Surface"
        );
    }
}
