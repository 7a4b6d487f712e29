//! Built-in rule templates.
//!
//! Each template is a stateless struct implementing [`Rule`] over one
//! [`ValidationRequest`]. Every finding is attached to the matched request
//! under the firing rule's name, so activations and annotations line up.
use regex::Regex;
use rust_decimal::Decimal;

use crate::annotation::{Annotation, Attribute, Severity};
use crate::check_digits::is_valid_iban_checksum;
use crate::country::CountryList;
use crate::error::EvaluationError;
use crate::fact::Fact;
use crate::payment::{Leg, Payment};
use crate::request::{Subject, ValidationRequest};
use crate::sanitize::sanitize;

use super::rule::{Consequence, Rule, RuleContext};
use super::{TemplateArgs, TemplateFactory};

/// ISO 13616 overall shape.
pub const IBAN_PATTERN: &str = "^[A-Z]{2}[0-9]{2}[A-Z0-9]{1,30}$";

/// ISO 9362: bank, country, location, optional branch.
pub const BIC_PATTERN: &str = "^[A-Z]{6}[A-Z0-9]{2}([A-Z0-9]{3})?$";

pub const CURRENCY_PATTERN: &str = "^[A-Z]{3}$";

/// Every built-in template, keyed by the name rule documents use.
pub fn builtins() -> Vec<(&'static str, TemplateFactory)> {
    vec![
        ("iban.format", factory(IbanFormat::build)),
        ("iban.country", factory(IbanCountry::build)),
        ("iban.mod97", factory(IbanChecksum::build)),
        ("iban.bban", factory(IbanBban::build)),
        ("bic.structure", factory(BicStructure::build)),
        ("bic.country", factory(BicCountry::build)),
        ("bic.test_code", factory(BicTestCode::build)),
        ("payment.derive_iban", factory(|_| Ok(DeriveRequest { attribute: Attribute::Iban }))),
        ("payment.derive_bic", factory(|_| Ok(DeriveRequest { attribute: Attribute::Bic }))),
        ("payment.currency", factory(CurrencyCode::build)),
        ("payment.same_currency", factory(SameCurrency::build)),
        ("payment.positive_amount", factory(PositiveAmount::build)),
        ("payment.fixed_leg_amount", factory(FixedLegAmount::build)),
        ("payment.rate_positive", factory(RatePositive::build)),
        ("payment.rate_consistency", factory(RateConsistency::build)),
    ]
}

fn factory<R, F>(build: F) -> TemplateFactory
where
    R: Rule + 'static,
    F: Fn(&TemplateArgs<'_>) -> Result<R, String> + Send + Sync + 'static,
{
    std::sync::Arc::new(move |args: &TemplateArgs<'_>| {
        build(args).map(|rule| Box::new(rule) as Box<dyn Rule>)
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn request(fact: &dyn Fact) -> Option<&ValidationRequest> {
    fact.downcast_ref::<ValidationRequest>()
}

fn iban_of(fact: &dyn Fact) -> Option<&str> {
    request(fact).and_then(ValidationRequest::as_iban)
}

fn bic_of(fact: &dyn Fact) -> Option<&str> {
    request(fact).and_then(ValidationRequest::as_bic)
}

fn payment_of(fact: &dyn Fact) -> Option<&Payment> {
    request(fact).and_then(ValidationRequest::as_payment)
}

/// The annotation a template attaches when its condition holds.
#[derive(Debug, Clone)]
struct Finding {
    severity: Severity,
    message: String,
    attribute: Option<Attribute>,
}

impl Finding {
    fn from_args(
        args: &TemplateArgs<'_>,
        severity: Severity,
        attribute: Option<Attribute>,
    ) -> Result<Self, String> {
        Ok(Self {
            severity: args.severity(severity)?,
            message: args.message()?,
            attribute: args.attribute(attribute)?,
        })
    }

    fn annotate(&self, fact: &mut dyn Fact, cx: &Consequence<'_>) -> Result<(), EvaluationError> {
        let request = fact
            .downcast_mut::<ValidationRequest>()
            .ok_or_else(|| EvaluationError::RuleFailed {
                rule: cx.rule().to_owned(),
                detail: "matched fact is not a validation request".to_owned(),
            })?;
        let mut annotation = Annotation::new(cx.rule(), self.severity, &self.message);
        if let Some(attribute) = self.attribute {
            annotation = annotation.for_attribute(attribute);
        }
        request.add_annotation(annotation);
        Ok(())
    }
}

fn global_name(args: &TemplateArgs<'_>) -> Result<String, String> {
    Ok(args
        .opt_str("global")?
        .unwrap_or(CountryList::GLOBAL)
        .to_owned())
}

// ---------------------------------------------------------------------------
// IBAN
// ---------------------------------------------------------------------------

/// Rejects IBANs that do not have the ISO 13616 shape.
#[derive(Debug)]
pub struct IbanFormat {
    pattern: Regex,
    finding: Finding,
}

impl IbanFormat {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            pattern: args.regex("pattern", IBAN_PATTERN)?,
            finding: Finding::from_args(args, Severity::Reject, Some(Attribute::Iban))?,
        })
    }
}

impl Rule for IbanFormat {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::IBAN)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(iban_of(fact).is_some_and(|iban| !self.pattern.is_match(iban)))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Rejects IBANs whose first two characters are not a known country.
#[derive(Debug)]
pub struct IbanCountry {
    global: String,
    finding: Finding,
}

impl IbanCountry {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            global: global_name(args)?,
            finding: Finding::from_args(args, Severity::Reject, Some(Attribute::Iban))?,
        })
    }
}

impl Rule for IbanCountry {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::IBAN)
    }

    fn when(&self, fact: &dyn Fact, cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        let Some(iban) = iban_of(fact) else {
            return Ok(false);
        };
        let countries = cx.global::<CountryList>(&self.global)?;
        Ok(!countries.contains(iban.get(..2).unwrap_or("")))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Rejects IBANs failing the MOD 97-10 check.
#[derive(Debug)]
pub struct IbanChecksum {
    finding: Finding,
}

impl IbanChecksum {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            finding: Finding::from_args(args, Severity::Reject, Some(Attribute::Iban))?,
        })
    }
}

impl Rule for IbanChecksum {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::IBAN)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(iban_of(fact).is_some_and(|iban| !is_valid_iban_checksum(iban)))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// One decision-table row: IBANs of `country` must have a BBAN matching
/// `pattern`.
#[derive(Debug)]
pub struct IbanBban {
    country: String,
    pattern: Regex,
    finding: Finding,
}

impl IbanBban {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        let country = args.str("country")?;
        if country.len() != 2 {
            return Err(format!("country \"{country}\" is not a two-letter code"));
        }
        Ok(Self {
            country: country.to_ascii_uppercase(),
            pattern: args.regex("pattern", ".*")?,
            finding: Finding::from_args(args, Severity::Reject, Some(Attribute::Iban))?,
        })
    }
}

impl Rule for IbanBban {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::IBAN)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(iban_of(fact).is_some_and(|iban| {
            iban.starts_with(&self.country) && !self.pattern.is_match(iban.get(4..).unwrap_or(""))
        }))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

// ---------------------------------------------------------------------------
// BIC
// ---------------------------------------------------------------------------

/// Rejects BICs that are not 8 or 11 characters of ISO 9362 shape.
#[derive(Debug)]
pub struct BicStructure {
    pattern: Regex,
    finding: Finding,
}

impl BicStructure {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            pattern: args.regex("pattern", BIC_PATTERN)?,
            finding: Finding::from_args(args, Severity::Reject, Some(Attribute::Bic))?,
        })
    }
}

impl Rule for BicStructure {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::BIC)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(bic_of(fact).is_some_and(|bic| {
            let length_ok = bic.len() == 8 || bic.len() == 11;
            !length_ok || !self.pattern.is_match(bic)
        }))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Rejects BICs whose country segment (characters 5 and 6) is unknown.
#[derive(Debug)]
pub struct BicCountry {
    global: String,
    finding: Finding,
}

impl BicCountry {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            global: global_name(args)?,
            finding: Finding::from_args(args, Severity::Reject, Some(Attribute::Bic))?,
        })
    }
}

impl Rule for BicCountry {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::BIC)
    }

    fn when(&self, fact: &dyn Fact, cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        let Some(country) = bic_of(fact).and_then(|bic| bic.get(4..6)) else {
            return Ok(false);
        };
        let countries = cx.global::<CountryList>(&self.global)?;
        Ok(!countries.contains(country))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Flags test BICs: a `0` as the second location character.
#[derive(Debug)]
pub struct BicTestCode {
    finding: Finding,
}

impl BicTestCode {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            finding: Finding::from_args(args, Severity::Warn, Some(Attribute::Bic))?,
        })
    }
}

impl Rule for BicTestCode {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::BIC)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(bic_of(fact).is_some_and(|bic| bic.as_bytes().get(7) == Some(&b'0')))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// Inserts an IBAN or BIC request for the matching payment field.
///
/// Findings on the derived request are scoped to `attribute`, so they
/// aggregate back onto the payment's field.
#[derive(Debug)]
pub struct DeriveRequest {
    attribute: Attribute,
}

impl DeriveRequest {
    fn identifier<'p>(&self, payment: &'p Payment) -> Option<&'p str> {
        let value = match self.attribute {
            Attribute::Iban => payment.iban.as_deref(),
            Attribute::Bic => payment.bic.as_deref(),
            Attribute::SellCurrency
            | Attribute::BuyCurrency
            | Attribute::SellAmount
            | Attribute::BuyAmount
            | Attribute::FixedLeg
            | Attribute::Rate => None,
        };
        value.filter(|v| !v.trim().is_empty())
    }
}

impl Rule for DeriveRequest {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::PAYMENT)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(payment_of(fact).and_then(|p| self.identifier(p)).is_some())
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        let Some(raw) = payment_of(fact).and_then(|p| self.identifier(p)) else {
            return Ok(());
        };
        let value = sanitize(raw);
        let subject = match self.attribute {
            Attribute::Bic => Subject::Bic(value),
            Attribute::Iban
            | Attribute::SellCurrency
            | Attribute::BuyCurrency
            | Attribute::SellAmount
            | Attribute::BuyAmount
            | Attribute::FixedLeg
            | Attribute::Rate => Subject::Iban(value),
        };
        cx.insert(Box::new(ValidationRequest::derived(subject, self.attribute)));
        Ok(())
    }
}

fn currency_attribute(leg: Leg) -> Attribute {
    match leg {
        Leg::Sell => Attribute::SellCurrency,
        Leg::Buy => Attribute::BuyCurrency,
    }
}

fn amount_attribute(leg: Leg) -> Attribute {
    match leg {
        Leg::Sell => Attribute::SellAmount,
        Leg::Buy => Attribute::BuyAmount,
    }
}

/// Rejects a present but malformed currency code on one leg.
#[derive(Debug)]
pub struct CurrencyCode {
    leg: Leg,
    pattern: Regex,
    finding: Finding,
}

impl CurrencyCode {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        let leg = args.leg()?;
        Ok(Self {
            leg,
            pattern: args.regex("pattern", CURRENCY_PATTERN)?,
            finding: Finding::from_args(args, Severity::Reject, Some(currency_attribute(leg)))?,
        })
    }
}

impl Rule for CurrencyCode {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::PAYMENT)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(payment_of(fact)
            .and_then(|p| p.currency(self.leg))
            .is_some_and(|ccy| !self.pattern.is_match(ccy)))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Warns when both legs use the same currency.
#[derive(Debug)]
pub struct SameCurrency {
    finding: Finding,
}

impl SameCurrency {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            finding: Finding::from_args(args, Severity::Warn, None)?,
        })
    }
}

impl Rule for SameCurrency {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::PAYMENT)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(payment_of(fact).is_some_and(|p| {
            matches!((p.currency(Leg::Sell), p.currency(Leg::Buy)), (Some(s), Some(b)) if s == b)
        }))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Rejects a present amount that is zero or negative.
#[derive(Debug)]
pub struct PositiveAmount {
    leg: Leg,
    finding: Finding,
}

impl PositiveAmount {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        let leg = args.leg()?;
        Ok(Self {
            leg,
            finding: Finding::from_args(args, Severity::Reject, Some(amount_attribute(leg)))?,
        })
    }
}

impl Rule for PositiveAmount {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::PAYMENT)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(payment_of(fact)
            .and_then(|p| p.amount(self.leg))
            .is_some_and(|amount| amount <= Decimal::ZERO))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Rejects a payment whose fixed leg carries no amount.
#[derive(Debug)]
pub struct FixedLegAmount {
    finding: Finding,
}

impl FixedLegAmount {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            finding: Finding::from_args(args, Severity::Reject, Some(Attribute::FixedLeg))?,
        })
    }
}

impl Rule for FixedLegAmount {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::PAYMENT)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(payment_of(fact)
            .is_some_and(|p| p.fixed_leg.is_some_and(|leg| p.amount(leg).is_none())))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Rejects a present rate that is zero or negative.
#[derive(Debug)]
pub struct RatePositive {
    finding: Finding,
}

impl RatePositive {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            finding: Finding::from_args(args, Severity::Reject, Some(Attribute::Rate))?,
        })
    }
}

impl Rule for RatePositive {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::PAYMENT)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(payment_of(fact)
            .and_then(|p| p.rate)
            .is_some_and(|rate| rate <= Decimal::ZERO))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}

/// Warns when `buy_amount` strays from `sell_amount * rate` by more than
/// `tolerance`.
#[derive(Debug)]
pub struct RateConsistency {
    tolerance: Decimal,
    finding: Finding,
}

impl RateConsistency {
    fn build(args: &TemplateArgs<'_>) -> Result<Self, String> {
        Ok(Self {
            tolerance: args.decimal("tolerance", Decimal::new(1, 2))?,
            finding: Finding::from_args(args, Severity::Warn, Some(Attribute::Rate))?,
        })
    }
}

impl Rule for RateConsistency {
    fn fact_type(&self) -> Option<&str> {
        Some(ValidationRequest::PAYMENT)
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(payment_of(fact)
            .and_then(Payment::rate_discrepancy)
            .is_some_and(|gap| gap > self.tolerance))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        self.finding.annotate(fact, cx)
    }
}
