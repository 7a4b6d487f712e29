//! Rule-based BIC validation.
use crate::annotation::ValidationResult;
use crate::config::ValidatorConfig;
use crate::error::ValidatorError;
use crate::harness::KnowledgeBase;
use crate::request::ValidationRequest;

use super::{BicValidator, RuleRunner, default_bic_resources};

/// Validates BICs against the ISO 9362 rule package.
#[derive(Debug, Clone)]
pub struct RuleBasedBicValidator {
    runner: RuleRunner,
}

impl RuleBasedBicValidator {
    pub fn new() -> Result<Self, ValidatorError> {
        Self::with_config(&ValidatorConfig::default())
    }

    pub fn with_config(config: &ValidatorConfig) -> Result<Self, ValidatorError> {
        let resources = config
            .bic_resources
            .clone()
            .unwrap_or_else(default_bic_resources);
        Ok(Self {
            runner: RuleRunner::initialize(&resources, &config.engine)?,
        })
    }

    pub fn from_knowledge_base(kb: KnowledgeBase) -> Result<Self, ValidatorError> {
        Ok(Self {
            runner: RuleRunner::from_knowledge_base(kb)?,
        })
    }
}

impl BicValidator for RuleBasedBicValidator {
    fn validate_bic(&self, bic: &str) -> Result<ValidationResult, ValidatorError> {
        self.runner.run(bic, ValidationRequest::bic(bic))
    }
}
