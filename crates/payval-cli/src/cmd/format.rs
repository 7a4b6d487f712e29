//! Implementation of `payval format <iban>`.
//!
//! Prints the sanitized identifier in blocks of four. No validation is
//! performed; use `payval iban` for that.
use std::io::Write as _;

use payval_core::print_format;

use crate::error::CliError;

pub fn run(value: &str) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", print_format(value)).map_err(|e| CliError::IoError {
        source: "stdout".to_owned(),
        detail: e.to_string(),
    })
}
