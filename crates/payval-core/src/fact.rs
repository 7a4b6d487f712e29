//! Facts: the typed values a rule session matches against.
//!
//! A session treats facts as opaque beyond a type tag, a handle and a small
//! property interface used by [`PropertyFilter`] lookups.
use std::any::Any;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fact
// ---------------------------------------------------------------------------

/// A value that can be inserted into a rule session.
pub trait Fact: Any + Send + fmt::Debug + 'static {
    /// Runtime type tag used by rules and by [`crate::harness::StatefulHarness::find_facts_by_type`].
    fn type_name(&self) -> &str;

    /// Looks up a named property; `None` if the fact has no such property.
    fn property(&self, name: &str) -> Option<FactValue>;

    /// One-line rendering for logs and fact journals.
    fn describe(&self) -> String {
        format!("{self:?}")
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Fact {
    /// Downcasts to a concrete fact type.
    pub fn downcast_ref<T: Fact>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Fact>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn is<T: Fact>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Stable identity of a fact within one session.
///
/// Handles are allocated in insertion order and never reused within a
/// session, so ordering by handle is ordering by insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FactHandle(u64);

impl FactHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// FactValue
// ---------------------------------------------------------------------------

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
}

impl FactValue {
    /// Parses the textual form used in `name=value` filters.
    ///
    /// `null`, `true` and `false` map to their typed values, integers and
    /// decimals to numbers, everything else to text.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "null" => return Self::Null,
            "true" => return Self::Bool(true),
            "false" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(d) = Decimal::from_str(raw) {
            return Self::Decimal(d);
        }
        Self::Text(raw.to_owned())
    }

    fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Int(i) => Some(Decimal::from(*i)),
            Self::Decimal(d) => Some(*d),
            Self::Null | Self::Bool(_) | Self::Text(_) => None,
        }
    }

    /// Value equivalence used by property filters.
    ///
    /// Numbers compare by value across `Int` and `Decimal`. Text compares
    /// against the display form of any other scalar, so `Text("false")`
    /// matches `Bool(false)`. `Null` only matches `Null`.
    pub fn equivalent(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.as_decimal(), other.as_decimal()) {
            return a == b;
        }
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Text(t), v @ (Self::Bool(_) | Self::Int(_) | Self::Decimal(_)))
            | (v @ (Self::Bool(_) | Self::Int(_) | Self::Decimal(_)), Self::Text(t)) => {
                *t == v.to_string()
            }
            _ => false,
        }
    }
}

impl fmt::Display for FactValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Text(t) => f.write_str(t),
        }
    }
}

impl From<bool> for FactValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FactValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FactValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<usize> for FactValue {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Decimal(Decimal::from(value)), Self::Int)
    }
}

impl From<Decimal> for FactValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for FactValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FactValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<FactValue>> From<Option<T>> for FactValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ---------------------------------------------------------------------------
// PropertyFilter
// ---------------------------------------------------------------------------

/// Error returned when a `name=value` filter string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid property filter \"{0}\": expected name=value")]
pub struct FilterParseError(String);

/// Expected value of one named fact property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFilter {
    name: String,
    expected: FactValue,
}

impl PropertyFilter {
    pub fn new(name: impl Into<String>, expected: impl Into<FactValue>) -> Self {
        Self {
            name: name.into(),
            expected: expected.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected(&self) -> &FactValue {
        &self.expected
    }

    /// `true` when `fact` has the property and its value is equivalent.
    pub fn matches(&self, fact: &dyn Fact) -> bool {
        fact.property(&self.name)
            .is_some_and(|actual| actual.equivalent(&self.expected))
    }
}

impl FromStr for PropertyFilter {
    type Err = FilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((name, value)) = s.split_once('=') else {
            return Err(FilterParseError(s.to_owned()));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(FilterParseError(s.to_owned()));
        }
        Ok(Self::new(name, FactValue::parse(value.trim())))
    }
}

/// `true` when every filter matches; an empty filter list matches any fact.
pub fn matches_all(fact: &dyn Fact, filters: &[PropertyFilter]) -> bool {
    filters.iter().all(|f| f.matches(fact))
}
