//! CLI-specific error types and exit code mapping

use scanpost_core::error::ScanpostError;
use scanpost_scanner::{ScannerError, SubmissionError};

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The camera could not be started. Carries the user-facing message.
    #[error("{0}")]
    CameraUnavailable(String),

    /// Logging or metrics exporter setup failed.
    #[error("setup error: {0:#}")]
    Setup(#[from] anyhow::Error),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                     |
    /// |------|-----------------------------|
    /// | 0    | Success                     |
    /// | 1    | General / command error     |
    /// | 2    | Configuration error         |
    /// | 5    | Camera unavailable          |
    /// | 10   | IO error                    |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::CameraUnavailable(_) => 5,
            Self::Io(_) => 10,
            Self::Command(_) | Self::Setup(_) | Self::JsonSerialize(_) => 1,
        }
    }
}

impl From<ScanpostError> for CliError {
    fn from(e: ScanpostError) -> Self {
        match e {
            ScanpostError::Config(inner) => Self::Config(inner.to_string()),
            ScanpostError::Io(inner) => Self::Io(inner),
            ScanpostError::Camera(msg) => Self::CameraUnavailable(msg),
            other => Self::Command(other.to_string()),
        }
    }
}

impl From<ScannerError> for CliError {
    fn from(e: ScannerError) -> Self {
        match e {
            ScannerError::Camera(camera) => Self::CameraUnavailable(camera.user_message()),
            ScannerError::Config { field, reason } => Self::Config(format!("{field}: {reason}")),
            other => Self::Command(other.to_string()),
        }
    }
}

impl From<SubmissionError> for CliError {
    fn from(e: SubmissionError) -> Self {
        Self::Command(format!("persistence client: {e}"))
    }
}
