//! Structured error handling with context and recovery suggestions
//!
//! Every failure carries:
//! - An [`ErrorCode`] for programmatic handling
//! - A human-readable message
//! - Optional context and a recovery suggestion
//! - The underlying source error, when there is one

use std::fmt;
use thiserror::Error;

/// Error codes for programmatic error handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // General errors (1xxx)
    /// An operation ran out of time
    Timeout = 1003,

    // IO errors (2xxx)
    /// Other I/O failure
    IoError = 2000,
    /// A file is missing
    FileNotFound = 2001,
    /// Access refused
    PermissionDenied = 2002,
    /// A path is unusable or escapes its root
    InvalidPath = 2003,
    /// A zip archive could not be read
    ArchiveError = 2005,

    // Configuration errors (3xxx)
    /// Explicit config file is missing
    ConfigNotFound = 3001,
    /// Config file is not valid TOML
    ConfigParseError = 3002,
    /// Config values are inconsistent
    ConfigValidationError = 3003,
    /// A required value is unset
    MissingConfigValue = 3005,

    // Process errors (5xxx)
    /// A child process could not be run
    ProcessError = 5000,
    /// The executable does not exist
    CommandNotFound = 5001,
    /// The child exited non-zero
    CommandFailed = 5002,

    // Validation errors (6xxx)
    /// A command-line value is not accepted
    InvalidInput = 6001,
    /// `run` does not know the package
    UnrecognizedApplication = 6004,

    // Device errors (7xxx)
    /// adb reported a failure
    DeviceError = 7000,
    /// The package is missing on the device
    ApplicationNotInstalled = 7002,
    /// The package is already running
    ApplicationRunning = 7003,

    // Emulator errors (8xxx)
    /// No emulator binary
    EmulatorNotFound = 8001,
    /// The AVD is missing after install
    AvdNotFound = 8003,

    // Network errors (9xxx)
    /// Request did not complete
    NetworkError = 9000,
    /// Non-success HTTP status
    HttpStatus = 9001,
    /// Secret body is not the expected JSON
    SecretMalformed = 9002,
}

impl ErrorCode {
    /// Get the numeric code
    #[must_use]
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Get a human-readable category
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self.code() / 1000 {
            1 => "General",
            2 => "IO",
            3 => "Configuration",
            5 => "Process",
            6 => "Validation",
            7 => "Device",
            8 => "Emulator",
            9 => "Network",
            _ => "Unknown",
        }
    }

    /// Exit code the CLI reports for an error with this code
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCode::EmulatorNotFound => exit_codes::EMULATOR_NOT_FOUND,
            _ => exit_codes::FAILURE,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

/// Main error type with rich context
#[derive(Error, Debug)]
pub struct Error {
    /// Error code for programmatic handling
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Additional context
    pub context: Option<String>,
    /// Recovery suggestion
    pub suggestion: Option<String>,
    /// Exit code of the child process, for delegated failures
    pub exit_status: Option<i32>,
    /// Source error
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {ctx}")?;
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {suggestion}")?;
        }
        Ok(())
    }
}

impl Error {
    /// Create a new error
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            suggestion: None,
            exit_status: None,
            source: None,
        }
    }

    /// Add context to the error
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a recovery suggestion
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add a source error
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Exit code the CLI should report for this error
    ///
    /// A delegated failure reports the child's status, except for signal
    /// deaths (negative) and codes the CLI reserves, which report
    /// [`exit_codes::FAILURE`].
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.exit_status {
            Some(status) if exit_codes::is_passthrough(status) => status,
            Some(_) => exit_codes::FAILURE,
            None => self.code.exit_code(),
        }
    }

    // Convenience constructors

    /// `path` does not exist
    pub fn file_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::FileNotFound,
            format!("File not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Check that the file exists and you have read permissions")
    }

    /// Explicit config file `path` does not exist
    pub fn config_not_found(path: impl AsRef<std::path::Path>) -> Self {
        Self::new(
            ErrorCode::ConfigNotFound,
            format!("Configuration file not found: {}", path.as_ref().display()),
        )
        .with_suggestion("Create an .andromach.toml file or use --config to specify a path")
    }

    /// Required `key` is unset
    pub fn missing_config(key: &str) -> Self {
        Self::new(
            ErrorCode::MissingConfigValue,
            format!("Required configuration value is not set: {key}"),
        )
        .with_suggestion(format!("Set `{key}` in .andromach.toml"))
    }

    /// Generic process failure
    pub fn process(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ProcessError, message)
    }

    /// `cmd` could not be found
    pub fn command_not_found(cmd: &str) -> Self {
        Self::new(ErrorCode::CommandNotFound, format!("Command not found: {cmd}"))
            .with_suggestion(format!("Install {cmd} and ensure it's in your PATH"))
    }

    /// `cmd` exited with `exit_code`
    pub fn command_failed(cmd: &str, exit_code: i32) -> Self {
        let mut err = Self::new(
            ErrorCode::CommandFailed,
            format!("{cmd} exited with code {exit_code}"),
        );
        err.exit_status = Some(exit_code);
        err
    }

    /// `app` has no known launch activity
    pub fn unrecognized_application(app: &str) -> Self {
        Self::new(
            ErrorCode::UnrecognizedApplication,
            format!("Application not recognized: {app}"),
        )
    }

    /// adb failure
    pub fn device(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DeviceError, message)
    }

}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes for CLI commands
pub mod exit_codes {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// Generic failure, no device connected, deprecated or unknown command
    pub const FAILURE: i32 = 1;
    /// Emulator binary not found
    pub const EMULATOR_NOT_FOUND: i32 = 2;

    /// Whether a child's exit status can be reported unchanged
    #[must_use]
    pub fn is_passthrough(status: i32) -> bool {
        (1..=255).contains(&status) && status != EMULATOR_NOT_FOUND
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let code = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            _ => ErrorCode::IoError,
        };
        Error::new(code, err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorCode::SecretMalformed, format!("JSON parse error: {err}"))
            .with_source(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::new(ErrorCode::ConfigParseError, format!("TOML parse error: {err}"))
            .with_source(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_status() {
            ErrorCode::HttpStatus
        } else if err.is_timeout() {
            ErrorCode::Timeout
        } else {
            ErrorCode::NetworkError
        };
        Error::new(code, format!("HTTP request failed: {err}")).with_source(err)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::new(ErrorCode::ArchiveError, format!("Archive error: {err}")).with_source(err)
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Attach context to the error
    fn context(self, context: impl Into<String>) -> Result<T>;
    /// Attach a recovery suggestion to the error
    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_suggestion(self, suggestion: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_suggestion(suggestion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::FileNotFound.to_string(), "E2001");
        assert_eq!(ErrorCode::EmulatorNotFound.to_string(), "E8001");
    }

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::IoError.category(), "IO");
        assert_eq!(ErrorCode::ApplicationNotInstalled.category(), "Device");
        assert_eq!(ErrorCode::HttpStatus.category(), "Network");
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(Error::device("offline").exit_code(), exit_codes::FAILURE);
        assert_eq!(
            Error::new(ErrorCode::EmulatorNotFound, "missing").exit_code(),
            exit_codes::EMULATOR_NOT_FOUND
        );
        assert_eq!(Error::command_failed("git", 128).exit_code(), 128);
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::file_not_found("/path/to/file").with_context("While loading configuration");

        assert_eq!(err.code, ErrorCode::FileNotFound);
        assert!(err.context.is_some());
        assert!(err.suggestion.is_some());
    }

    #[test]
    fn test_signal_and_reserved_statuses_map_to_failure() {
        assert_eq!(Error::command_failed("gradle", -1).exit_code(), exit_codes::FAILURE);
        assert_eq!(Error::command_failed("gradle", 2).exit_code(), exit_codes::FAILURE);
        assert_eq!(Error::command_failed("gradle", 0).exit_code(), exit_codes::FAILURE);
        assert_eq!(Error::command_failed("gradle", 300).exit_code(), exit_codes::FAILURE);
        assert_eq!(Error::command_failed("gradle", 3).exit_code(), 3);
    }

    #[test]
    fn test_error_display() {
        let err = Error::unrecognized_application("org.example.app").with_context("run");
        let text = err.to_string();
        assert!(text.starts_with("[E6004] Application not recognized: org.example.app"));
        assert!(text.contains("Context: run"));
    }
}
