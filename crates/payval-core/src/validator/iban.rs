//! Rule-based IBAN validation.
use crate::annotation::ValidationResult;
use crate::config::ValidatorConfig;
use crate::error::ValidatorError;
use crate::harness::KnowledgeBase;
use crate::request::ValidationRequest;

use super::{IbanValidator, RuleRunner, default_iban_resources};

/// Validates IBANs against the IBAN rule package.
///
/// ```
/// use payval_core::validator::{IbanValidator, RuleBasedIbanValidator};
///
/// let validator = RuleBasedIbanValidator::new().unwrap();
/// assert!(validator.validate_iban("GB29 NWBK 6016 1331 9268 19").unwrap().is_valid());
/// assert!(!validator.validate_iban("GB29 NWBK 6016 1331 9268 20").unwrap().is_valid());
/// ```
#[derive(Debug, Clone)]
pub struct RuleBasedIbanValidator {
    runner: RuleRunner,
}

impl RuleBasedIbanValidator {
    /// A validator over the embedded rules.
    pub fn new() -> Result<Self, ValidatorError> {
        Self::with_config(&ValidatorConfig::default())
    }

    pub fn with_config(config: &ValidatorConfig) -> Result<Self, ValidatorError> {
        let resources = config
            .iban_resources
            .clone()
            .unwrap_or_else(default_iban_resources);
        Ok(Self {
            runner: RuleRunner::initialize(&resources, &config.engine)?,
        })
    }

    /// A validator over a caller-built knowledge base, which must declare
    /// the `annotations` query.
    pub fn from_knowledge_base(kb: KnowledgeBase) -> Result<Self, ValidatorError> {
        Ok(Self {
            runner: RuleRunner::from_knowledge_base(kb)?,
        })
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        self.runner.knowledge_base()
    }
}

impl IbanValidator for RuleBasedIbanValidator {
    fn validate_iban(&self, iban: &str) -> Result<ValidationResult, ValidatorError> {
        self.runner.run(iban, ValidationRequest::iban(iban))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::annotation::{Attribute, Severity};
    use crate::error::ConfigError;
    use crate::resource::ResourceDescriptor;

    fn validator() -> RuleBasedIbanValidator {
        RuleBasedIbanValidator::new().expect("validator")
    }

    #[test]
    fn valid_iban_has_no_annotations() {
        let result = validator()
            .validate_iban("ES5702170302862100282783")
            .expect("validate");
        assert!(result.is_valid());
        assert!(result.is_empty());
        assert_eq!(result.most_severe(), None);
    }

    #[test]
    fn checksum_failure_is_rejected() {
        let result = validator().validate_iban("ES050 217009945").expect("validate");
        assert!(!result.is_valid());
        assert_eq!(result.subject(), "ES050 217009945");
        assert_eq!(
            result.by_rule("Mod-97 checksum test.").count(),
            1,
            "{result}"
        );
    }

    #[test]
    fn unknown_country_and_bad_shape() {
        let result = validator().validate_iban("XX29NWBK60161331926819").expect("validate");
        assert_eq!(
            result.by_rule("IBAN doesn't contain a valid country ISO code.").count(),
            1
        );
        let result = validator().validate_iban("not an iban").expect("validate");
        assert_eq!(result.by_rule("ISO 13616 structure.").count(), 1);
        assert!(result.annotations().iter().all(|a| a.attribute() == Some(Attribute::Iban)));
    }

    #[test]
    fn empty_input_is_rejected_not_an_error() {
        let result = validator().validate_iban("").expect("validate");
        assert_eq!(result.most_severe(), Some(Severity::Reject));
    }

    #[test]
    fn missing_resource_is_a_config_error() {
        let config = ValidatorConfig {
            iban_resources: Some(vec![ResourceDescriptor::classpath("rules/missing.json")]),
            ..ValidatorConfig::default()
        };
        let err = RuleBasedIbanValidator::with_config(&config).expect_err("should fail");
        assert!(matches!(err, ValidatorError::Config(ConfigError::ResourceLoad { .. })));
    }

    #[test]
    fn resources_without_annotations_query_are_rejected() {
        let config = ValidatorConfig {
            iban_resources: Some(vec![ResourceDescriptor::classpath(super::super::IBAN_RULES)]),
            ..ValidatorConfig::default()
        };
        let err = RuleBasedIbanValidator::with_config(&config).expect_err("should fail");
        assert_eq!(
            err,
            ValidatorError::Config(ConfigError::UnknownQuery {
                query: "annotations".to_owned()
            })
        );
    }
}
