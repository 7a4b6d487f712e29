//! Rule-driven validation of IBANs, BICs and cross-currency payments.
//!
//! The crate is layered bottom-up:
//!
//! - [`sanitize`] and [`check_digits`] hold the pure identifier algorithms.
//! - [`annotation`] is the outbound model: severity-graded findings folded
//!   into a [`ValidationResult`].
//! - [`backend`], [`fact`] and [`resource`] define the boundary a rule engine
//!   implements; [`native`] is the engine shipped with the crate.
//! - [`harness`] builds knowledge bases and drives sessions, with journals of
//!   fired rules and fact mutations for tests and diagnostics.
//! - [`validator`] exposes the IBAN, BIC and payment validators.
//!
//! ```
//! use payval_core::{IbanValidator, RuleBasedIbanValidator};
//!
//! let validator = RuleBasedIbanValidator::new().unwrap();
//! let result = validator.validate_iban("ES57 0217 0302 8621 0028 2783").unwrap();
//! assert!(result.is_valid());
//! ```
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod annotation;
pub mod backend;
pub mod check_digits;
pub mod config;
pub mod country;
pub mod error;
pub mod fact;
pub mod harness;
pub mod journal;
pub mod native;
pub mod payment;
pub mod request;
pub mod resource;
pub mod sanitize;
pub mod validator;

pub use annotation::{Annotation, Attribute, Severity, ValidationResult};
pub use backend::{Globals, QueryResults, RuleBackend, RulePackage, RuleSession};
pub use check_digits::{is_valid_iban_checksum, mod97_10};
pub use config::{EngineConfig, ValidatorConfig};
pub use country::CountryList;
pub use error::{ConfigError, EvaluationError, HarnessError, ValidatorError};
pub use fact::{Fact, FactHandle, FactValue, PropertyFilter};
pub use harness::{ExecutionResults, KnowledgeBase, StatefulHarness, StatelessHarness};
pub use journal::{Activation, EvaluationReport, FactEvent, FactEventKind};
pub use native::NativeBackend;
pub use payment::{Leg, Payment};
pub use request::{Subject, ValidationRequest};
pub use resource::{ResourceDescriptor, ResourceLoader};
pub use sanitize::{print_format, sanitize};
pub use validator::{
    BicValidator, IbanValidator, PaymentValidator, RuleBasedBicValidator, RuleBasedIbanValidator,
    RuleBasedPaymentValidator, SimpleBicValidator, SimpleIbanValidator,
};

/// Returns the version string of the `payval-core` library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
