//! Diagnostic findings and their aggregation into a validity verdict.
//!
//! This module defines [`Severity`], [`Attribute`], [`Annotation`] and
//! [`ValidationResult`]: the types every validator returns, whether the
//! findings come from a rule session or from a direct check.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// The severity of a single finding.
///
/// Variants are declared in ascending order so the derived [`Ord`] gives
/// `Info < Warn < Reject`. [`Severity::Reject`] is the unique maximum and the
/// only level that makes a result invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational observation.
    Info,
    /// Suspicious but acceptable.
    Warn,
    /// The subject must not be accepted.
    Reject,
}

impl Severity {
    /// Returns the wire name (`"INFO"`, `"WARN"` or `"REJECT"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "REJECT" => Ok(Self::Reject),
            _ => Err(format!("unknown severity \"{s}\"")),
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// The field of the validated entity a finding concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    SellCurrency,
    BuyCurrency,
    SellAmount,
    BuyAmount,
    FixedLeg,
    Rate,
    Iban,
    Bic,
}

impl Attribute {
    /// Returns the camelCase field name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SellCurrency => "sellCurrency",
            Self::BuyCurrency => "buyCurrency",
            Self::SellAmount => "sellAmount",
            Self::BuyAmount => "buyAmount",
            Self::FixedLeg => "fixedLeg",
            Self::Rate => "rate",
            Self::Iban => "iban",
            Self::Bic => "bic",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sellCurrency" => Ok(Self::SellCurrency),
            "buyCurrency" => Ok(Self::BuyCurrency),
            "sellAmount" => Ok(Self::SellAmount),
            "buyAmount" => Ok(Self::BuyAmount),
            "fixedLeg" => Ok(Self::FixedLeg),
            "rate" => Ok(Self::Rate),
            "iban" => Ok(Self::Iban),
            "bic" => Ok(Self::Bic),
            _ => Err(format!("unknown attribute \"{s}\"")),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotation
// ---------------------------------------------------------------------------

/// A single finding produced while validating one subject.
///
/// Immutable once built; the only way to attach it to a result is
/// [`ValidationResult::add`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    rule: String,
    severity: Severity,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attribute: Option<Attribute>,
}

impl Annotation {
    /// Creates an entity-wide annotation.
    pub fn new(rule: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            attribute: None,
        }
    }

    /// Convenience for a [`Severity::Reject`] annotation.
    pub fn reject(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule, Severity::Reject, message)
    }

    /// Convenience for a [`Severity::Warn`] annotation.
    pub fn warn(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule, Severity::Warn, message)
    }

    /// Convenience for a [`Severity::Info`] annotation.
    pub fn info(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule, Severity::Info, message)
    }

    /// Returns this annotation scoped to `attribute`.
    #[must_use]
    pub fn for_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = Some(attribute);
        self
    }

    /// Scopes the annotation to `attribute` unless it already has one.
    #[must_use]
    pub fn or_attribute(mut self, attribute: Option<Attribute>) -> Self {
        if self.attribute.is_none() {
            self.attribute = attribute;
        }
        self
    }

    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn attribute(&self) -> Option<Attribute> {
        self.attribute
    }

    /// `false` only for [`Severity::Reject`].
    pub fn is_valid(&self) -> bool {
        self.severity != Severity::Reject
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.severity)?;
        if let Some(attribute) = self.attribute {
            write!(f, " {attribute}")?;
        }
        write!(f, ": {}", self.message)
    }
}

// ---------------------------------------------------------------------------
// ValidationResult
// ---------------------------------------------------------------------------

/// The aggregate outcome of validating one subject.
///
/// Annotations are kept in the order they were added, which is the order the
/// rules fired. Validity and the most severe level are derived on read, so
/// they always agree with the annotation set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    subject: String,
    annotations: Vec<Annotation>,
}

impl ValidationResult {
    /// Creates an empty (valid) result for `subject`.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            annotations: Vec::new(),
        }
    }

    /// Creates a result holding `annotations` in order.
    pub fn with_annotations(
        subject: impl Into<String>,
        annotations: impl IntoIterator<Item = Annotation>,
    ) -> Self {
        let mut result = Self::new(subject);
        result.extend(annotations);
        result
    }

    /// Appends one annotation. The only mutation path.
    pub fn add(&mut self, annotation: Annotation) {
        self.annotations.push(annotation);
    }

    /// Appends every annotation from `annotations`, preserving order.
    pub fn extend(&mut self, annotations: impl IntoIterator<Item = Annotation>) {
        self.annotations.extend(annotations);
    }

    /// The identifier (or payment summary) that was validated.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// `false` if and only if at least one annotation is [`Severity::Reject`].
    pub fn is_valid(&self) -> bool {
        self.annotations.iter().all(Annotation::is_valid)
    }

    /// The maximum severity across all annotations, or `None` when empty.
    pub fn most_severe(&self) -> Option<Severity> {
        self.annotations.iter().map(Annotation::severity).max()
    }

    /// All annotations in insertion order.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Annotations with [`Severity::Reject`].
    pub fn rejections(&self) -> impl Iterator<Item = &Annotation> {
        self.with_severity(Severity::Reject)
    }

    /// Annotations with [`Severity::Warn`].
    pub fn warnings(&self) -> impl Iterator<Item = &Annotation> {
        self.with_severity(Severity::Warn)
    }

    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |a| a.severity() == severity)
    }

    /// Annotations scoped to `attribute`.
    pub fn for_attribute(&self, attribute: Attribute) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |a| a.attribute() == Some(attribute))
    }

    /// Annotations whose rule name ends with `rule`, ignoring case.
    pub fn by_rule<'a>(&'a self, rule: &'a str) -> impl Iterator<Item = &'a Annotation> + 'a {
        self.annotations
            .iter()
            .filter(move |a| crate::journal::name_matches(a.rule(), rule))
    }

    /// `true` when no annotation rejects `attribute`.
    pub fn is_attribute_valid(&self, attribute: Attribute) -> bool {
        self.for_attribute(attribute).all(Annotation::is_valid)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn into_annotations(self) -> Vec<Annotation> {
        self.annotations
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultView<'a> {
    subject: &'a str,
    is_valid: bool,
    most_severe: Option<Severity>,
    annotations: &'a [Annotation],
}

impl Serialize for ValidationResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ResultView {
            subject: &self.subject,
            is_valid: self.is_valid(),
            most_severe: self.most_severe(),
            annotations: &self.annotations,
        }
        .serialize(serializer)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.is_valid() { "valid" } else { "invalid" };
        write!(f, "{}: {verdict}", self.subject)?;
        for annotation in &self.annotations {
            write!(f, "\n  {annotation}")?;
        }
        Ok(())
    }
}
