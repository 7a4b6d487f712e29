//! Clap CLI definition: root struct, subcommands, and shared argument types.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Where a payment document comes from.
///
/// `"-"` reads stdin, a value starting with `{` is inline JSON, anything
/// else is a file path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentSource {
    Stdin,
    Inline(String),
    Path(PathBuf),
}

impl std::str::FromStr for PaymentSource {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "-" {
            Ok(PaymentSource::Stdin)
        } else if s.trim_start().starts_with('{') {
            Ok(PaymentSource::Inline(s.to_owned()))
        } else {
            Ok(PaymentSource::Path(PathBuf::from(s)))
        }
    }
}

/// Which validator implementation answers IBAN and BIC requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ValidatorKind {
    /// The embedded rule documents on the native rule engine (default).
    Rules,
    /// Hard-coded format, country and checksum checks; no rule engine.
    Simple,
}

/// All top-level subcommands exposed by the `payval` binary.
#[derive(Subcommand)]
pub enum Command {
    /// Validate an IBAN. Spaces, hyphens and case are ignored.
    Iban {
        #[arg(value_name = "IBAN")]
        value: String,
    },
    /// Validate a BIC (8 or 11 characters).
    Bic {
        #[arg(value_name = "BIC")]
        value: String,
    },
    /// Validate a payment given as JSON: inline, a file path, or `-` for stdin.
    Payment {
        #[arg(value_name = "JSON")]
        source: PaymentSource,
    },
    /// Print an IBAN in groups of four.
    Format {
        #[arg(value_name = "IBAN")]
        value: String,
    },
    /// Print the payval-core library version.
    Version,
}

/// Top-level CLI struct parsed from `std::env::args`.
#[derive(Parser)]
#[command(
    name = "payval",
    version,
    about = "Validate IBANs, BICs and cross-currency payments"
)]
pub struct Cli {
    /// Active subcommand.
    #[command(subcommand)]
    pub command: Command,

    /// JSON validator configuration (engine limits, rule resources).
    #[arg(long, global = true, env = "PAYVAL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Validator implementation for IBANs and BICs.
    #[arg(long, global = true, default_value = "rules", value_enum)]
    pub validator: ValidatorKind,

    /// Emit minified JSON instead of pretty-printed output.
    #[arg(long, global = true)]
    pub compact: bool,
}

#[cfg(test)]
mod tests;
