/// Command modules for the `payval` CLI.
///
/// Each submodule implements one or more subcommands. Every `run` function
/// takes the parsed arguments and returns `Ok(())` on success or a
/// [`crate::error::CliError`] on failure.
pub mod format;
pub mod validate;

use std::io::Write as _;
use std::path::Path;

use payval_core::{ValidationResult, ValidatorConfig};

use crate::cli::ValidatorKind;
use crate::error::CliError;

/// Settings shared by every validating subcommand.
#[derive(Debug, Clone)]
pub struct Settings {
    pub validator: ValidatorKind,
    pub config: ValidatorConfig,
    pub compact: bool,
}

impl Settings {
    /// Builds settings, reading `config` when given.
    pub fn load(
        config: Option<&Path>,
        validator: ValidatorKind,
        compact: bool,
    ) -> Result<Self, CliError> {
        let config = match config {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                ValidatorConfig::load(path)?
            }
            None => ValidatorConfig::default(),
        };
        Ok(Self {
            validator,
            config,
            compact,
        })
    }
}

/// Writes `result` as JSON to stdout.
///
/// Returns [`CliError::Rejected`] when the result is not valid.
pub fn emit(result: &ValidationResult, compact: bool) -> Result<(), CliError> {
    write_json(result, compact)?;
    if result.is_valid() {
        Ok(())
    } else {
        Err(CliError::Rejected)
    }
}

fn write_json(value: &ValidationResult, compact: bool) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let written = if compact {
        serde_json::to_writer(&mut out, value)
    } else {
        serde_json::to_writer_pretty(&mut out, value)
    };
    written.map_err(|e| CliError::IoError {
        source: "stdout".to_owned(),
        detail: e.to_string(),
    })?;
    writeln!(out).map_err(|e| CliError::IoError {
        source: "stdout".to_owned(),
        detail: e.to_string(),
    })
}
