//! The narrow boundary between the session harness and a rule engine.
//!
//! A [`RuleBackend`] compiles loaded resources into an immutable
//! [`RulePackage`]; a package spawns independent [`RuleSession`]s. The harness
//! only ever talks to these traits, so engines are interchangeable.
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::annotation::Annotation;
use crate::config::EngineConfig;
use crate::error::{ConfigError, EvaluationError, ValidatorError};
use crate::fact::{Fact, FactHandle, FactValue};
use crate::journal::EvaluationReport;
use crate::resource::LoadedResource;

// ---------------------------------------------------------------------------
// Globals
// ---------------------------------------------------------------------------

/// Named, read-only reference data bound into a session at construction.
///
/// Values are shared behind [`Arc`], so cloning a `Globals` is cheap and
/// every session sees the same immutable data.
#[derive(Clone, Default)]
pub struct Globals {
    values: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Globals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns these globals with `value` bound to `name`, replacing any
    /// previous binding.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.values.insert(name.into(), Arc::new(value));
        self
    }

    /// Binds an already shared value.
    #[must_use]
    pub fn with_shared(mut self, name: impl Into<String>, value: Arc<dyn Any + Send + Sync>) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// The value bound to `name`, if it exists and has type `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.values.get(name).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl fmt::Debug for Globals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// A value bound to a variable in a query row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Annotation(Annotation),
    Value(FactValue),
    Handle(FactHandle),
}

/// One row of a named query: variable name to bound value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRow {
    bindings: BTreeMap<String, Binding>,
}

impl QueryRow {
    #[must_use]
    pub fn bind(mut self, name: impl Into<String>, binding: Binding) -> Self {
        self.bindings.insert(name.into(), binding);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        match self.bindings.get(name)? {
            Binding::Annotation(a) => Some(a),
            Binding::Value(_) | Binding::Handle(_) => None,
        }
    }

    pub fn value(&self, name: &str) -> Option<&FactValue> {
        match self.bindings.get(name)? {
            Binding::Value(v) => Some(v),
            Binding::Annotation(_) | Binding::Handle(_) => None,
        }
    }

    pub fn handle(&self, name: &str) -> Option<FactHandle> {
        match self.bindings.get(name)? {
            Binding::Handle(h) => Some(*h),
            Binding::Annotation(_) | Binding::Value(_) => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

/// The rows a named query produced, in fact order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResults {
    pub query: String,
    pub rows: Vec<QueryRow>,
}

impl QueryResults {
    pub fn new(query: impl Into<String>, rows: Vec<QueryRow>) -> Self {
        Self {
            query: query.into(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryRow> {
        self.rows.iter()
    }

    /// Collects the annotation bound to `binding` in every row.
    ///
    /// Fails if any row lacks it.
    pub fn annotations(&self, binding: &str) -> Result<Vec<Annotation>, ValidatorError> {
        self.rows
            .iter()
            .map(|row| {
                row.annotation(binding)
                    .cloned()
                    .ok_or_else(|| ValidatorError::MissingBinding {
                        query: self.query.clone(),
                        binding: binding.to_owned(),
                    })
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a QueryResults {
    type Item = &'a QueryRow;
    type IntoIter = std::slice::Iter<'a, QueryRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

// ---------------------------------------------------------------------------
// Backend traits
// ---------------------------------------------------------------------------

/// A rule engine able to compile resources into packages.
pub trait RuleBackend: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Compiles every resource into one immutable package set.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Compile`] for malformed content,
    /// [`ConfigError::DuplicateBinding`] when two packages declare the same
    /// query or rule name, [`ConfigError::UnknownTemplate`] for rules the
    /// engine cannot instantiate.
    fn compile(&self, resources: &[LoadedResource]) -> Result<Arc<dyn RulePackage>, ConfigError>;
}

/// A compiled, read-only rule set. Shareable across threads.
pub trait RulePackage: Send + Sync + fmt::Debug {
    fn package_names(&self) -> Vec<String>;

    /// Rule names in agenda priority order.
    fn rule_names(&self) -> Vec<String>;

    fn query_names(&self) -> Vec<String>;

    /// Creates an empty session bound to `globals`.
    fn new_session(self: Arc<Self>, globals: Globals, config: &EngineConfig) -> Box<dyn RuleSession>;
}

/// One working memory of facts evaluated against a package.
///
/// Not safe for concurrent use; each caller owns its session.
pub trait RuleSession: Send {
    /// Inserts a fact and returns its handle. Rules see it on the next
    /// [`RuleSession::fire_all`].
    fn insert(&mut self, fact: Box<dyn Fact>) -> FactHandle;

    /// Replaces the fact behind `handle`, making it eligible for matching again.
    fn update(&mut self, handle: FactHandle, fact: Box<dyn Fact>) -> Result<(), EvaluationError>;

    /// Removes a fact and hands it back.
    fn retract(&mut self, handle: FactHandle) -> Result<Box<dyn Fact>, EvaluationError>;

    fn get(&self, handle: FactHandle) -> Option<&dyn Fact>;

    /// Live facts in insertion order.
    fn facts(&self) -> Vec<(FactHandle, &dyn Fact)>;

    /// Fires rules until no activation is left.
    fn fire_all(&mut self) -> Result<EvaluationReport, EvaluationError>;

    /// Runs a named query against the current facts.
    fn query(&self, name: &str) -> Result<QueryResults, EvaluationError>;

    /// Disposes of the session, handing back its facts in insertion order.
    fn into_facts(self: Box<Self>) -> Vec<(FactHandle, Box<dyn Fact>)>;
}
