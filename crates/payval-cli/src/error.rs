/// CLI error types with associated exit codes.
///
/// Every [`CliError`] variant maps to a stable exit code via
/// [`CliError::exit_code`]:
///
/// - Exit code **2**: the tool could not run. The input could not be read or
///   parsed, the configuration is broken, or a rule evaluation failed.
/// - Exit code **1**: the tool ran to completion and the subject was
///   rejected. The result has already been printed.
use std::fmt;
use std::path::PathBuf;

use payval_core::{ConfigError, ValidatorError};

#[derive(Debug)]
pub enum CliError {
    // --- Exit code 2: input and infrastructure failures ---
    /// A file argument could not be found on the filesystem.
    FileNotFound { path: PathBuf },

    /// An I/O error while reading a file or stdin.
    IoError { source: String, detail: String },

    /// An input exceeds the size limit. `actual` is known for disk files only.
    InputTooLarge {
        source: String,
        limit: u64,
        actual: Option<u64>,
    },

    /// The payment document is not valid JSON for a payment.
    ParseFailed { detail: String },

    /// The configuration file or a rule resource is unusable.
    Config { detail: String },

    /// A validator failed for reasons unrelated to the subject.
    Validator { detail: String },

    /// The chosen validator cannot handle the request.
    Unsupported { detail: String },

    // --- Exit code 1: business rejection ---
    /// The subject was rejected; the result was printed to stdout.
    Rejected,
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. }
            | Self::IoError { .. }
            | Self::InputTooLarge { .. }
            | Self::ParseFailed { .. }
            | Self::Config { .. }
            | Self::Validator { .. }
            | Self::Unsupported { .. } => 2,

            Self::Rejected => 1,
        }
    }

    /// Human-readable message for stderr.
    pub fn message(&self) -> String {
        match self {
            Self::FileNotFound { path } => {
                format!("error: file not found: {}", path.display())
            }
            Self::IoError { source, detail } => {
                format!("error: I/O error reading {source}: {detail}")
            }
            Self::InputTooLarge {
                source,
                limit,
                actual: Some(actual),
            } => format!("error: {source} is {actual} bytes, over the {limit} byte limit"),
            Self::InputTooLarge {
                source,
                limit,
                actual: None,
            } => format!("error: {source} exceeds the {limit} byte limit"),
            Self::ParseFailed { detail } => format!("error: invalid payment: {detail}"),
            Self::Config { detail } => format!("error: configuration: {detail}"),
            Self::Validator { detail } => format!("error: validation failed to run: {detail}"),
            Self::Unsupported { detail } => format!("error: {detail}"),
            Self::Rejected => "error: validation rejected the input".to_owned(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            detail: err.to_string(),
        }
    }
}

impl From<ValidatorError> for CliError {
    fn from(err: ValidatorError) -> Self {
        match err {
            ValidatorError::Config(inner) => inner.into(),
            ValidatorError::Evaluation(_) | ValidatorError::MissingBinding { .. } => {
                Self::Validator {
                    detail: err.to_string(),
                }
            }
        }
    }
}
