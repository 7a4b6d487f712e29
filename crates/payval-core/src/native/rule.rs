//! The single-fact rule abstraction templates implement.
use std::any::Any;
use std::fmt;

use crate::backend::Globals;
use crate::error::EvaluationError;
use crate::fact::Fact;

/// A compiled rule over one fact at a time.
///
/// `when` must be a pure function of the fact and the globals. `then` may
/// annotate the fact in place; that alone does not make the fact eligible for
/// matching again. Call [`Consequence::update`] for that.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Fact type this rule matches; `None` matches every fact.
    fn fact_type(&self) -> Option<&str>;

    fn when(&self, fact: &dyn Fact, cx: &RuleContext<'_>) -> Result<bool, EvaluationError>;

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError>;
}

/// Read-only view handed to [`Rule::when`].
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    rule: &'a str,
    globals: &'a Globals,
}

impl<'a> RuleContext<'a> {
    pub fn new(rule: &'a str, globals: &'a Globals) -> Self {
        Self { rule, globals }
    }

    /// Name of the rule being evaluated.
    pub fn rule(&self) -> &'a str {
        self.rule
    }

    /// The global bound to `name`.
    ///
    /// # Errors
    ///
    /// [`EvaluationError::MissingGlobal`] when nothing of type `T` is bound.
    pub fn global<T: Any>(&self, name: &str) -> Result<&'a T, EvaluationError> {
        lookup_global(self.globals, self.rule, name)
    }
}

/// Side effects requested by [`Rule::then`].
#[derive(Debug)]
pub struct Consequence<'a> {
    cx: RuleContext<'a>,
    inserted: Vec<Box<dyn Fact>>,
    updated: bool,
}

impl<'a> Consequence<'a> {
    pub fn new(rule: &'a str, globals: &'a Globals) -> Self {
        Self {
            cx: RuleContext::new(rule, globals),
            inserted: Vec::new(),
            updated: false,
        }
    }

    pub fn rule(&self) -> &'a str {
        self.cx.rule()
    }

    pub fn global<T: Any>(&self, name: &str) -> Result<&'a T, EvaluationError> {
        self.cx.global(name)
    }

    /// Queues a new fact; it is matched in the following cycles.
    pub fn insert(&mut self, fact: Box<dyn Fact>) {
        self.inserted.push(fact);
    }

    /// Marks the matched fact as modified so rules see it again.
    pub fn update(&mut self) {
        self.updated = true;
    }

    pub fn into_parts(self) -> (Vec<Box<dyn Fact>>, bool) {
        (self.inserted, self.updated)
    }
}

fn lookup_global<'a, T: Any>(
    globals: &'a Globals,
    rule: &str,
    name: &str,
) -> Result<&'a T, EvaluationError> {
    globals
        .get::<T>(name)
        .ok_or_else(|| EvaluationError::MissingGlobal {
            rule: rule.to_owned(),
            global: name.to_owned(),
        })
}
