//! Implementation of `payval iban`, `payval bic` and `payval payment`.
//!
//! The result is printed to stdout as JSON in the outbound shape
//! `{ subject, isValid, mostSevere, annotations }`.
//!
//! Exit codes:
//! - 0 = valid (no REJECT annotation)
//! - 1 = rejected
//! - 2 = the input or configuration could not be used
use payval_core::{
    BicValidator, IbanValidator, Payment, PaymentValidator, RuleBasedBicValidator,
    RuleBasedIbanValidator, RuleBasedPaymentValidator, SimpleBicValidator, SimpleIbanValidator,
};

use super::{Settings, emit};
use crate::cli::{PaymentSource, ValidatorKind};
use crate::error::CliError;
use crate::io::{MAX_PAYMENT_BYTES, read_payment};

// ---------------------------------------------------------------------------
// IBAN
// ---------------------------------------------------------------------------

pub fn run_iban(value: &str, settings: &Settings) -> Result<(), CliError> {
    let validator: Box<dyn IbanValidator> = match settings.validator {
        ValidatorKind::Rules => Box::new(RuleBasedIbanValidator::with_config(&settings.config)?),
        ValidatorKind::Simple => Box::new(SimpleIbanValidator::default()),
    };
    let result = validator.validate_iban(value)?;
    tracing::debug!(iban = value, valid = result.is_valid(), "iban validated");
    emit(&result, settings.compact)
}

// ---------------------------------------------------------------------------
// BIC
// ---------------------------------------------------------------------------

pub fn run_bic(value: &str, settings: &Settings) -> Result<(), CliError> {
    let validator: Box<dyn BicValidator> = match settings.validator {
        ValidatorKind::Rules => Box::new(RuleBasedBicValidator::with_config(&settings.config)?),
        ValidatorKind::Simple => Box::new(SimpleBicValidator::default()),
    };
    let result = validator.validate_bic(value)?;
    tracing::debug!(bic = value, valid = result.is_valid(), "bic validated");
    emit(&result, settings.compact)
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// Parses the payment document and validates it with the payment rules.
///
/// Only the rule-based validator covers payments.
pub fn run_payment(source: &PaymentSource, settings: &Settings) -> Result<(), CliError> {
    if settings.validator == ValidatorKind::Simple {
        return Err(CliError::Unsupported {
            detail: "the simple validator does not validate payments; use --validator rules"
                .to_owned(),
        });
    }
    let content = read_payment(source, MAX_PAYMENT_BYTES)?;
    let payment = parse_payment(&content)?;
    let validator = RuleBasedPaymentValidator::with_config(&settings.config)?;
    let result = validator.validate_payment(&payment)?;
    tracing::debug!(payment = %payment, valid = result.is_valid(), "payment validated");
    emit(&result, settings.compact)
}

fn parse_payment(content: &str) -> Result<Payment, CliError> {
    serde_json::from_str(content).map_err(|e| CliError::ParseFailed {
        detail: format!("line {}, column {}: {e}", e.line(), e.column()),
    })
}
