//! Validation request facts.
//!
//! A [`ValidationRequest`] wraps the subject under test and collects the
//! annotations rules attach to it. It is the only fact type the shipped rule
//! content matches on.
use std::any::Any;
use std::fmt;

use crate::annotation::{Annotation, Attribute, Severity, ValidationResult};
use crate::fact::{Fact, FactValue};
use crate::payment::Payment;
use crate::sanitize::sanitize;

/// What a request validates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// A sanitized IBAN.
    Iban(String),
    /// A sanitized BIC.
    Bic(String),
    Payment(Payment),
}

impl Subject {
    /// The fact type tag of a request carrying this subject.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Iban(_) => ValidationRequest::IBAN,
            Self::Bic(_) => ValidationRequest::BIC,
            Self::Payment(_) => ValidationRequest::PAYMENT,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iban(iban) => f.write_str(iban),
            Self::Bic(bic) => f.write_str(bic),
            Self::Payment(payment) => write!(f, "{payment}"),
        }
    }
}

/// A subject plus the annotations rules have attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRequest {
    subject: Subject,
    attribute: Option<Attribute>,
    annotations: Vec<Annotation>,
}

impl ValidationRequest {
    pub const IBAN: &'static str = "IbanValidationRequest";
    pub const BIC: &'static str = "BicValidationRequest";
    pub const PAYMENT: &'static str = "PaymentValidationRequest";

    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            attribute: None,
            annotations: Vec::new(),
        }
    }

    /// An IBAN request; `raw` is sanitized.
    pub fn iban(raw: &str) -> Self {
        Self::new(Subject::Iban(sanitize(raw)))
    }

    /// A BIC request; `raw` is sanitized.
    pub fn bic(raw: &str) -> Self {
        Self::new(Subject::Bic(sanitize(raw)))
    }

    pub fn payment(payment: Payment) -> Self {
        Self::new(Subject::Payment(payment))
    }

    /// A request derived from a field of a larger entity.
    ///
    /// Every annotation added to it is scoped to `attribute` unless the rule
    /// chose a more specific one.
    pub fn derived(subject: Subject, attribute: Attribute) -> Self {
        Self {
            attribute: Some(attribute),
            ..Self::new(subject)
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// The attribute of the parent entity this request was derived from.
    pub fn attribute(&self) -> Option<Attribute> {
        self.attribute
    }

    /// The IBAN or BIC under test; `None` for payments.
    pub fn identifier(&self) -> Option<&str> {
        match &self.subject {
            Subject::Iban(s) | Subject::Bic(s) => Some(s),
            Subject::Payment(_) => None,
        }
    }

    pub fn as_iban(&self) -> Option<&str> {
        match &self.subject {
            Subject::Iban(s) => Some(s),
            Subject::Bic(_) | Subject::Payment(_) => None,
        }
    }

    pub fn as_bic(&self) -> Option<&str> {
        match &self.subject {
            Subject::Bic(s) => Some(s),
            Subject::Iban(_) | Subject::Payment(_) => None,
        }
    }

    pub fn as_payment(&self) -> Option<&Payment> {
        match &self.subject {
            Subject::Payment(p) => Some(p),
            Subject::Iban(_) | Subject::Bic(_) => None,
        }
    }

    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Attaches an annotation, scoping it to the derived attribute if any.
    pub fn add_annotation(&mut self, annotation: Annotation) {
        self.annotations.push(annotation.or_attribute(self.attribute));
    }

    pub fn reject(&mut self, rule: &str, message: &str) {
        self.add_annotation(Annotation::reject(rule, message));
    }

    pub fn reject_attribute(&mut self, rule: &str, message: &str, attribute: Attribute) {
        self.add_annotation(Annotation::reject(rule, message).for_attribute(attribute));
    }

    pub fn is_valid(&self) -> bool {
        self.annotations.iter().all(Annotation::is_valid)
    }

    pub fn most_severe(&self) -> Option<Severity> {
        self.annotations.iter().map(Annotation::severity).max()
    }

    /// Converts the request into a result reported against `subject`.
    pub fn into_result(self, subject: impl Into<String>) -> ValidationResult {
        ValidationResult::with_annotations(subject, self.annotations)
    }
}

impl Fact for ValidationRequest {
    fn type_name(&self) -> &str {
        self.subject.type_name()
    }

    fn property(&self, name: &str) -> Option<FactValue> {
        match name {
            "valid" => return Some(self.is_valid().into()),
            "annotationCount" => return Some(self.annotations.len().into()),
            "mostSevere" => return Some(self.most_severe().map(Severity::as_str).into()),
            "attribute" => return Some(self.attribute.map(Attribute::as_str).into()),
            "subject" => return Some(self.subject.to_string().into()),
            _ => {}
        }
        match &self.subject {
            Subject::Iban(iban) => (name == "iban").then(|| iban.as_str().into()),
            Subject::Bic(bic) => (name == "bic").then(|| bic.as_str().into()),
            Subject::Payment(p) => payment_property(p, name),
        }
    }

    fn describe(&self) -> String {
        format!(
            "{}({}) annotations={}",
            self.type_name(),
            self.subject,
            self.annotations.len()
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn payment_property(p: &Payment, name: &str) -> Option<FactValue> {
    let value = match name {
        "sellCurrency" => p.sell_currency.clone().into(),
        "buyCurrency" => p.buy_currency.clone().into(),
        "sellAmount" => p.sell_amount.into(),
        "buyAmount" => p.buy_amount.into(),
        "fixedLeg" => p.fixed_leg.map(|l| l.to_string()).into(),
        "rate" => p.rate.into(),
        "iban" => p.iban.clone().into(),
        "bic" => p.bic.clone().into(),
        _ => return None,
    };
    Some(value)
}
