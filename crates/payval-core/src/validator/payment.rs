//! Rule-based payment validation.
//!
//! The payment rules derive an IBAN and a BIC request from the payment's
//! fields, so one evaluation covers the whole instruction. Findings on the
//! derived requests carry the `iban` or `bic` attribute.
use crate::annotation::ValidationResult;
use crate::config::ValidatorConfig;
use crate::error::ValidatorError;
use crate::harness::KnowledgeBase;
use crate::payment::Payment;
use crate::request::ValidationRequest;

use super::{PaymentValidator, RuleRunner, default_payment_resources};

#[derive(Debug, Clone)]
pub struct RuleBasedPaymentValidator {
    runner: RuleRunner,
}

impl RuleBasedPaymentValidator {
    pub fn new() -> Result<Self, ValidatorError> {
        Self::with_config(&ValidatorConfig::default())
    }

    pub fn with_config(config: &ValidatorConfig) -> Result<Self, ValidatorError> {
        let resources = config
            .payment_resources
            .clone()
            .unwrap_or_else(default_payment_resources);
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

impl PaymentValidator for RuleBasedPaymentValidator {
    fn validate_payment(&self, payment: &Payment) -> Result<ValidationResult, ValidatorError> {
        self.runner
            .run(&payment.to_string(), ValidationRequest::payment(payment.clone()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::annotation::{Annotation, Attribute, Severity};
    use crate::payment::Leg;
    use rust_decimal_macros::dec;

    fn validate(payment: &Payment) -> ValidationResult {
        RuleBasedPaymentValidator::new()
            .expect("validator")
            .validate_payment(payment)
            .expect("validate")
    }

    #[test]
    fn iban_only_payment_is_valid() {
        let result = validate(&Payment::default().with_iban("LU36 0029 1524 6005 0000"));
        assert!(result.is_valid(), "{result}");
        assert!(result.is_empty());
    }

    #[test]
    fn bad_iban_is_scoped_to_iban() {
        let result = validate(&Payment::default().with_iban("ES95 0217 0100 17"));
        assert!(!result.is_valid());
        assert!(!result.is_attribute_valid(Attribute::Iban));
        assert!(result.is_attribute_valid(Attribute::Bic));
    }

    #[test]
    fn bad_bic_is_scoped_to_bic() {
        let result = validate(&Payment::default().with_bic("HLFXESM"));
        assert!(!result.is_valid());
        assert_eq!(result.for_attribute(Attribute::Bic).count(), 1);

        let result = validate(&Payment::default().with_bic("HLFXESMM"));
        assert!(result.is_valid());
    }

    #[test]
    fn well_formed_trade_passes() {
        let payment = Payment::new("EUR", "GBP")
            .with_amounts(dec!(100), dec!(85), Leg::Sell)
            .with_rate(dec!(0.85))
            .with_iban("GB29 NWBK 6016 1331 9268 19")
            .with_bic("HLFXESMM");
        let result = validate(&payment);
        assert!(result.is_empty(), "{result}");
        assert_eq!(result.subject(), payment.to_string());
    }

    #[test]
    fn trade_checks_flag_their_fields() {
        let mut payment = Payment::new("EUR", "eur").with_rate(dec!(-1));
        payment.fixed_leg = Some(Leg::Buy);
        payment.sell_amount = Some(dec!(0));
        let result = validate(&payment);

        assert!(!result.is_attribute_valid(Attribute::BuyCurrency));
        assert!(!result.is_attribute_valid(Attribute::SellAmount));
        assert!(!result.is_attribute_valid(Attribute::FixedLeg));
        assert!(!result.is_attribute_valid(Attribute::Rate));
        assert!(result.is_attribute_valid(Attribute::SellCurrency));
    }

    #[test]
    fn annotations_follow_firing_order_across_requests() {
        let payment = Payment::new("EUR", "eur").with_iban("not an iban");
        let result = validate(&payment);
        let rules: Vec<&str> = result.annotations().iter().map(Annotation::rule).collect();
        assert_eq!(
            rules,
            [
                "IBAN doesn't follow ISO 13616 structure.",
                "Buy currency isn't an ISO 4217 code.",
                "IBAN failed the Mod-97 checksum test.",
            ]
        );
    }

    #[test]
    fn rate_mismatch_only_warns() {
        let payment = Payment::new("EUR", "GBP")
            .with_amounts(dec!(100), dec!(90), Leg::Sell)
            .with_rate(dec!(0.85));
        let result = validate(&payment);
        assert!(result.is_valid());
        assert_eq!(result.most_severe(), Some(Severity::Warn));
        assert_eq!(result.for_attribute(Attribute::Rate).count(), 1);
    }
}
