#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use clap::CommandFactory;

use super::*;

/// The root help output must contain all top-level subcommand names.
#[test]
fn test_root_help_lists_all_subcommands() {
    let mut cmd = Cli::command();
    let help = format!("{}", cmd.render_help());
    for name in ["iban", "bic", "payment", "format", "version"] {
        assert!(
            help.contains(name),
            "root help should mention subcommand '{name}'"
        );
    }
}

#[test]
fn test_root_help_lists_global_flags() {
    let mut cmd = Cli::command();
    let help = format!("{}", cmd.render_help());
    for flag in ["--config", "--validator", "--compact", "--help", "--version"] {
        assert!(
            help.contains(flag),
            "root help should mention flag '{flag}'"
        );
    }
}

#[test]
fn test_cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn test_validator_defaults_to_rules() {
    let cli = Cli::try_parse_from(["payval", "iban", "GB29NWBK60161331926819"]).expect("parse");
    assert_eq!(cli.validator, ValidatorKind::Rules);
    assert!(!cli.compact);
    match cli.command {
        Command::Iban { value } => assert_eq!(value, "GB29NWBK60161331926819"),
        Command::Bic { .. } | Command::Payment { .. } | Command::Format { .. } | Command::Version => {
            panic!("expected iban subcommand")
        }
    }
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from(["payval", "bic", "HLFXESMM", "--validator", "simple", "--compact"])
        .expect("parse");
    assert_eq!(cli.validator, ValidatorKind::Simple);
    assert!(cli.compact);
}

#[test]
fn test_unknown_validator_is_rejected() {
    let result = Cli::try_parse_from(["payval", "--validator", "magic", "iban", "X"]);
    assert!(result.is_err());
}

#[test]
fn test_payment_source_parsing() {
    assert_eq!("-".parse::<PaymentSource>().expect("parse"), PaymentSource::Stdin);
    assert_eq!(
        r#" {"iban":"X"}"#.parse::<PaymentSource>().expect("parse"),
        PaymentSource::Inline(r#" {"iban":"X"}"#.to_owned())
    );
    assert_eq!(
        "payment.json".parse::<PaymentSource>().expect("parse"),
        PaymentSource::Path(PathBuf::from("payment.json"))
    );
}
