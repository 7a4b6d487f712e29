/// Input reading for the `payval` binary.
///
/// `payval-core` never touches stdin; payment documents are read here and
/// every I/O failure becomes a [`CliError`] with exit code 2.
///
/// Every source is bounded by a byte limit:
/// - Disk files: size checked via `std::fs::metadata` before any read.
/// - Stdin: read through `Read::take`, so allocation is bounded.
use std::io::Read;
use std::path::Path;

use crate::cli::PaymentSource;
use crate::error::CliError;

/// Upper bound on a payment document: 1 MiB.
pub const MAX_PAYMENT_BYTES: u64 = 1024 * 1024;

/// Reads the payment document named by `source` into a `String`.
///
/// Fails with [`CliError::InputTooLarge`] when the document exceeds
/// `max_size` bytes.
pub fn read_payment(source: &PaymentSource, max_size: u64) -> Result<String, CliError> {
    match source {
        PaymentSource::Inline(json) => {
            if json.len() as u64 > max_size {
                return Err(CliError::InputTooLarge {
                    source: "inline payment".to_owned(),
                    limit: max_size,
                    actual: Some(json.len() as u64),
                });
            }
            Ok(json.clone())
        }
        PaymentSource::Path(path) => read_file(path, max_size),
        PaymentSource::Stdin => read_capped(std::io::stdin().lock(), max_size, "-"),
    }
}

fn read_file(path: &Path, max_size: u64) -> Result<String, CliError> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| io_error(&e, path))?
        .len();
    if file_size > max_size {
        return Err(CliError::InputTooLarge {
            source: path.display().to_string(),
            limit: max_size,
            actual: Some(file_size),
        });
    }
    std::fs::read_to_string(path).map_err(|e| io_error(&e, path))
}

fn io_error(e: &std::io::Error, path: &Path) -> CliError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CliError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else {
        CliError::IoError {
            source: path.display().to_string(),
            detail: e.to_string(),
        }
    }
}

/// Reads at most `max_size` bytes from `reader`.
///
/// One byte past the limit is requested so a stream of exactly `max_size`
/// bytes is told apart from a longer one.
fn read_capped<R: Read>(reader: R, max_size: u64, source: &str) -> Result<String, CliError> {
    let mut buf = String::new();
    reader
        .take(max_size.saturating_add(1))
        .read_to_string(&mut buf)
        .map_err(|e| CliError::IoError {
            source: source.to_owned(),
            detail: e.to_string(),
        })?;
    if buf.len() as u64 > max_size {
        return Err(CliError::InputTooLarge {
            source: source.to_owned(),
            limit: max_size,
            actual: None,
        });
    }
    Ok(buf)
}
