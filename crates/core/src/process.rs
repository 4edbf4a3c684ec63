//! Process execution utilities
//!
//! Provides a unified interface for running external commands with:
//! - Output capture for query-style calls
//! - Live streaming for interactive tools
//! - Environment overlays, appended to or replacing the ambient environment
//! - Optional tolerance of non-zero exit codes

use crate::error::{Error, ErrorCode, Result};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};

/// Environment variables to set for a child process
///
/// Keys are unique; inserting an existing key replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    /// Create an empty overlay
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment
    #[must_use]
    pub fn from_ambient() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Set a variable, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`EnvOverlay::set`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Merge another overlay over this one
    pub fn extend(&mut self, other: &EnvOverlay) {
        for (key, value) in &other.vars {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    /// Look up a variable
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Iterate over the variables in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// How an [`EnvOverlay`] is applied to a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvMode {
    /// Inherit the ambient environment and add the overlay on top
    #[default]
    Append,
    /// Clear the ambient environment; the overlay is the whole environment
    Explicit,
}

/// Everything needed to start one external process
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Executable name or path
    pub program: String,
    /// Arguments after the program
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Variables set for the child
    pub env: EnvOverlay,
    /// How `env` combines with the parent environment
    pub env_mode: EnvMode,
    /// Forward the child's stdio to the terminal
    pub stream_output: bool,
    /// Surface a non-zero exit as [`ErrorCode::CommandFailed`]
    pub fail_on_nonzero_exit: bool,
}

impl LaunchSpec {
    /// Spec for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: EnvOverlay::new(),
            env_mode: EnvMode::Append,
            stream_output: true,
            fail_on_nonzero_exit: true,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in `dir`
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add variables on top of the ambient environment
    #[must_use]
    pub fn append_env(mut self, env: &EnvOverlay) -> Self {
        self.env.extend(env);
        self
    }

    /// Use `env` as the complete child environment
    #[must_use]
    pub fn explicit_env(mut self, env: EnvOverlay) -> Self {
        self.env = env;
        self.env_mode = EnvMode::Explicit;
        self
    }

    /// Inherit stdio instead of capturing output
    #[must_use]
    pub fn stream_output(mut self, stream: bool) -> Self {
        self.stream_output = stream;
        self
    }

    /// Treat a non-zero exit as [`crate::ErrorCode::CommandFailed`]
    #[must_use]
    pub fn fail_on_nonzero_exit(mut self, fail: bool) -> Self {
        self.fail_on_nonzero_exit = fail;
        self
    }

    /// Shell-like rendering of the command line for logs
    #[must_use]
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(|s| shlex::try_quote(s).map_or_else(|_| s.to_string(), |q| q.into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        if self.env_mode == EnvMode::Explicit {
            cmd.env_clear();
        }
        for (key, value) in self.env.iter() {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Start the process described by `spec` and wait for it
///
/// Returns the child's exit code. A child terminated by a signal reports -1.
pub fn launch(spec: &LaunchSpec) -> Result<i32> {
    if let Some(dir) = &spec.cwd {
        if !dir.is_dir() {
            return Err(Error::new(
                ErrorCode::InvalidPath,
                format!("Working directory does not exist: {}", dir.display()),
            ));
        }
    }

    tracing::debug!(command = %spec.display(), "launching");
    let mut cmd = spec.to_command();

    let exit_code = if spec.stream_output {
        let status = cmd
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| spawn_error(&spec.program, e))?;
        status.code().unwrap_or(-1)
    } else {
        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| spawn_error(&spec.program, e))?;
        let result = CommandResult::from_output(output);
        tracing::debug!(
            program = %spec.program,
            exit_code = result.exit_code,
            output = %result.combined_output().trim_end(),
            "process finished"
        );
        result.exit_code
    };

    if exit_code != 0 && spec.fail_on_nonzero_exit {
        return Err(Error::command_failed(&spec.program, exit_code)
            .with_context(spec.display()));
    }
    Ok(exit_code)
}

/// Start the process described by `spec` without waiting for it
///
/// Output is forwarded when `stream_output` is set and discarded otherwise.
pub fn spawn(spec: &LaunchSpec) -> Result<Child> {
    tracing::debug!(command = %spec.display(), "spawning");
    let (stdout, stderr) = if spec.stream_output {
        (Stdio::inherit(), Stdio::inherit())
    } else {
        (Stdio::null(), Stdio::null())
    };
    spec.to_command()
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .spawn()
        .map_err(|e| spawn_error(&spec.program, e))
}

fn spawn_error(program: &str, err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::command_not_found(program).with_source(err)
    } else {
        Error::process(format!("Failed to execute {program}: {err}")).with_source(err)
    }
}

/// Result of a captured command execution
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code of the command
    pub exit_code: i32,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

impl CommandResult {
    /// Create from `std::process::Output`
    #[must_use]
    pub fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    /// Get combined output (stdout + stderr)
    #[must_use]
    pub fn combined_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Run a command and capture output
pub fn run_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> Result<CommandResult> {
    capture(Command::new(program).args(args), program)
}

fn capture(cmd: &mut Command, program: &str) -> Result<CommandResult> {
    let output = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    Ok(CommandResult::from_output(output))
}

/// Get the path to a command
#[must_use]
pub fn which_command(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
