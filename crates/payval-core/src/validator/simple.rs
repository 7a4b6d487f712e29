//! Validators that need no rule engine.
//!
//! They run the same core checks as the shipped rule content and report
//! them under the same rule names, so results are interchangeable. Table
//! driven checks (BBAN structure, test BICs) are rule-only.
use std::sync::LazyLock;

use regex::Regex;

use crate::annotation::{Annotation, Attribute, ValidationResult};
use crate::check_digits::is_valid_iban_checksum;
use crate::country::CountryList;
use crate::error::ValidatorError;
use crate::native::templates::{BIC_PATTERN, IBAN_PATTERN};
use crate::sanitize::sanitize;

use super::{BicValidator, IbanValidator};

pub const IBAN_STRUCTURE_RULE: &str = "IBAN doesn't follow ISO 13616 structure.";
pub const IBAN_COUNTRY_RULE: &str = "IBAN doesn't contain a valid country ISO code.";
pub const IBAN_CHECKSUM_RULE: &str = "IBAN failed the Mod-97 checksum test.";
pub const BIC_STRUCTURE_RULE: &str = "BIC doesn't follow ISO 9362 structure.";
pub const BIC_COUNTRY_RULE: &str = "BIC doesn't contain a valid country ISO code.";

static IBAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(IBAN_PATTERN).unwrap_or_else(|_| unreachable!("IBAN pattern is valid"))
});

static BIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(BIC_PATTERN).unwrap_or_else(|_| unreachable!("BIC pattern is valid"))
});

fn reject(rule: &str, attribute: Attribute) -> Annotation {
    Annotation::reject(rule, rule).for_attribute(attribute)
}

// ---------------------------------------------------------------------------
// IBAN
// ---------------------------------------------------------------------------

/// Shape, country code and MOD 97-10.
///
/// ```
/// use payval_core::validator::{IbanValidator, SimpleIbanValidator};
///
/// let validator = SimpleIbanValidator::default();
/// let result = validator.validate_iban("DE89 3704 0044 0532 0130 00").unwrap();
/// assert!(result.is_valid());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimpleIbanValidator {
    countries: CountryList,
}

impl SimpleIbanValidator {
    pub fn new(countries: CountryList) -> Self {
        Self { countries }
    }
}

impl IbanValidator for SimpleIbanValidator {
    fn validate_iban(&self, iban: &str) -> Result<ValidationResult, ValidatorError> {
        let clean = sanitize(iban);
        let mut result = ValidationResult::new(iban);
        if !IBAN_RE.is_match(&clean) {
            result.add(reject(IBAN_STRUCTURE_RULE, Attribute::Iban));
        }
        if !self.countries.contains(clean.get(..2).unwrap_or("")) {
            result.add(reject(IBAN_COUNTRY_RULE, Attribute::Iban));
        }
        if !is_valid_iban_checksum(&clean) {
            result.add(reject(IBAN_CHECKSUM_RULE, Attribute::Iban));
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// BIC
// ---------------------------------------------------------------------------

/// Length of 8 or 11, ISO 9362 shape and country code.
#[derive(Debug, Clone, Default)]
pub struct SimpleBicValidator {
    countries: CountryList,
}

impl SimpleBicValidator {
    pub fn new(countries: CountryList) -> Self {
        Self { countries }
    }
}

impl BicValidator for SimpleBicValidator {
    fn validate_bic(&self, bic: &str) -> Result<ValidationResult, ValidatorError> {
        let clean = sanitize(bic);
        let mut result = ValidationResult::new(bic);
        let length_ok = clean.len() == 8 || clean.len() == 11;
        if !length_ok || !BIC_RE.is_match(&clean) {
            result.add(reject(BIC_STRUCTURE_RULE, Attribute::Bic));
        }
        if let Some(country) = clean.get(4..6) {
            if !self.countries.contains(country) {
                result.add(reject(BIC_COUNTRY_RULE, Attribute::Bic));
            }
        }
        Ok(result)
    }
}
