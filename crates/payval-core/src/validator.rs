//! IBAN, BIC and payment validators.
//!
//! Every validator sanitizes its input, runs the checks and returns a
//! [`ValidationResult`]. A rejected identifier is a normal result with
//! `is_valid() == false`; `Err` is reserved for infrastructure faults.
//!
//! The rule-based validators ([`RuleBasedIbanValidator`],
//! [`RuleBasedBicValidator`], [`RuleBasedPaymentValidator`]) evaluate the
//! embedded rule documents on the [`NativeBackend`]. They hold only an
//! immutable knowledge base and open a fresh session per call, so one
//! instance can serve many threads. The `Simple*` validators hard-code the
//! core checks and need no rule engine at all.
pub mod bic;
pub mod iban;
pub mod payment;
pub mod simple;

pub use bic::RuleBasedBicValidator;
pub use iban::RuleBasedIbanValidator;
pub use payment::RuleBasedPaymentValidator;
pub use simple::{SimpleBicValidator, SimpleIbanValidator};

use crate::annotation::ValidationResult;
use crate::backend::Globals;
use crate::config::EngineConfig;
use crate::country::CountryList;
use crate::error::ValidatorError;
use crate::harness::{KnowledgeBase, StatelessHarness};
use crate::native::NativeBackend;
use crate::payment::Payment;
use crate::request::ValidationRequest;
use crate::resource::ResourceDescriptor;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

pub trait IbanValidator: Send + Sync {
    /// Validates a raw IBAN; spaces, hyphens and case are ignored.
    fn validate_iban(&self, iban: &str) -> Result<ValidationResult, ValidatorError>;
}

pub trait BicValidator: Send + Sync {
    /// Validates a raw BIC; separators and case are ignored.
    fn validate_bic(&self, bic: &str) -> Result<ValidationResult, ValidatorError>;
}

pub trait PaymentValidator: Send + Sync {
    /// Validates a payment, including its IBAN and BIC when present.
    ///
    /// Findings on the IBAN or BIC carry the matching attribute.
    fn validate_payment(&self, payment: &Payment) -> Result<ValidationResult, ValidatorError>;
}

// ---------------------------------------------------------------------------
// Embedded rule resources
// ---------------------------------------------------------------------------

pub const VALIDATION_RULES: &str = "rules/payments/validation/validation.json";
pub const IBAN_RULES: &str = "rules/payments/validation/iban.json";
pub const BIC_RULES: &str = "rules/payments/validation/bic.json";
pub const PAYMENT_RULES: &str = "rules/payments/validation/payment.json";

/// The query every rule-based validator reads its annotations from.
pub const ANNOTATIONS_QUERY: &str = "annotations";

pub fn default_iban_resources() -> Vec<ResourceDescriptor> {
    classpath(&[VALIDATION_RULES, IBAN_RULES])
}

pub fn default_bic_resources() -> Vec<ResourceDescriptor> {
    classpath(&[VALIDATION_RULES, BIC_RULES])
}

/// Payment rules plus the IBAN and BIC rules they delegate to.
pub fn default_payment_resources() -> Vec<ResourceDescriptor> {
    classpath(&[VALIDATION_RULES, IBAN_RULES, BIC_RULES, PAYMENT_RULES])
}

fn classpath(paths: &[&str]) -> Vec<ResourceDescriptor> {
    paths.iter().map(|p| ResourceDescriptor::classpath(*p)).collect()
}

/// Globals the shipped rules expect: the ISO 3166 country list.
pub fn default_globals() -> Globals {
    Globals::new().with(CountryList::GLOBAL, CountryList::iso3166())
}

// ---------------------------------------------------------------------------
// Shared runner
// ---------------------------------------------------------------------------

/// One-request-per-call evaluation shared by the rule-based validators.
#[derive(Debug, Clone)]
struct RuleRunner {
    harness: StatelessHarness,
}

impl RuleRunner {
    fn initialize(
        resources: &[ResourceDescriptor],
        config: &EngineConfig,
    ) -> Result<Self, ValidatorError> {
        let kb = KnowledgeBase::initialize(
            &NativeBackend::new(),
            resources,
            default_globals(),
            config.clone(),
        )?;
        Self::from_knowledge_base(kb)
    }

    fn from_knowledge_base(kb: KnowledgeBase) -> Result<Self, ValidatorError> {
        let harness = StatelessHarness::new(kb).with_query(ANNOTATIONS_QUERY, ANNOTATIONS_QUERY)?;
        Ok(Self { harness })
    }

    fn run(&self, subject: &str, request: ValidationRequest) -> Result<ValidationResult, ValidatorError> {
        let results = self.harness.execute(vec![Box::new(request)])?;
        let rows = results
            .query(ANNOTATIONS_QUERY)
            .ok_or_else(|| ValidatorError::MissingBinding {
                query: ANNOTATIONS_QUERY.to_owned(),
                binding: ANNOTATIONS_QUERY.to_owned(),
            })?;
        let result = ValidationResult::with_annotations(subject, rows.annotations("annotation")?);
        tracing::debug!(
            subject,
            valid = result.is_valid(),
            annotations = result.len(),
            fired = results.report.fired_count(),
            "validated"
        );
        Ok(result)
    }

    fn knowledge_base(&self) -> &KnowledgeBase {
        self.harness.knowledge_base()
    }
}
