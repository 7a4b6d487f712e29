mod cli;
mod cmd;
mod error;
mod io;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::cmd::Settings;
use crate::error::CliError;

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(err) = run(&cli) {
        // A rejection has already been reported on stdout.
        if !matches!(err, CliError::Rejected) {
            eprintln!("{}", err.message());
        }
        std::process::exit(err.exit_code());
    }
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` overrides
/// the default `warn` level.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    match &cli.command {
        Command::Version => {
            println!("{}", payval_core::version());
            Ok(())
        }
        Command::Format { value } => cmd::format::run(value),
        Command::Iban { value } => cmd::validate::run_iban(value, &settings(cli)?),
        Command::Bic { value } => cmd::validate::run_bic(value, &settings(cli)?),
        Command::Payment { source } => cmd::validate::run_payment(source, &settings(cli)?),
    }
}

fn settings(cli: &Cli) -> Result<Settings, CliError> {
    Settings::load(cli.config.as_deref(), cli.validator, cli.compact)
}
