//! Evaluation history: which rules fired and how facts changed.
//!
//! A rule session returns an [`EvaluationReport`] from every `fire_all`
//! call. The harness folds those reports into an [`ActivationJournal`] and a
//! [`FactJournal`], which play the part of long-lived event listeners without
//! any callback wiring.
use std::fmt;

use crate::fact::FactHandle;

// ---------------------------------------------------------------------------
// Rule-name matching
// ---------------------------------------------------------------------------

/// Case-insensitive suffix match of a fired rule name against `expected`.
///
/// Rules generated from tables carry a row prefix (`"Row 3 IBAN is for UK"`),
/// so the match is on the tail of the name.
///
/// ```
/// use payval_core::journal::name_matches;
///
/// assert!(name_matches("121 Her Rule", "her rule"));
/// assert!(!name_matches("54 My Rule", "54"));
/// ```
pub fn name_matches(fired: &str, expected: &str) -> bool {
    fired.to_lowercase().ends_with(&expected.to_lowercase())
}

/// `true` if any activation's rule name matches `rule_name`.
pub fn rule_fired(activations: &[Activation], rule_name: &str) -> bool {
    activations
        .iter()
        .any(|a| name_matches(&a.rule, rule_name))
}

/// `true` if every name in `rule_names` matches at least one activation.
pub fn all_rules_fired<S: AsRef<str>>(activations: &[Activation], rule_names: &[S]) -> bool {
    rule_names
        .iter()
        .all(|name| rule_fired(activations, name.as_ref()))
}

/// Renders the activation list one rule per line, in firing order.
pub fn pretty_rules_fired(activations: &[Activation]) -> String {
    activations
        .iter()
        .enumerate()
        .map(|(i, activation)| format!("{:>3}. {activation}\n", i + 1))
        .collect()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One rule firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    pub rule: String,
    pub package: String,
    pub handle: FactHandle,
}

impl Activation {
    pub fn new(rule: impl Into<String>, package: impl Into<String>, handle: FactHandle) -> Self {
        Self {
            rule: rule.into(),
            package: package.into(),
            handle,
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.\"{}\" on {}", self.package, self.rule, self.handle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactEventKind {
    Inserted,
    Updated,
    Retracted,
}

impl fmt::Display for FactEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted => f.write_str("inserted"),
            Self::Updated => f.write_str("updated"),
            Self::Retracted => f.write_str("retracted"),
        }
    }
}

/// One insertion, update or retraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactEvent {
    pub kind: FactEventKind,
    pub handle: FactHandle,
    pub fact_type: String,
    /// [`crate::fact::Fact::describe`] of the fact after the change (before it,
    /// for retractions).
    pub description: String,
}

impl FactEvent {
    pub fn new(
        kind: FactEventKind,
        handle: FactHandle,
        fact_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            handle,
            fact_type: fact_type.into(),
            description: description.into(),
        }
    }
}

/// Everything one `fire_all` call did, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub activations: Vec<Activation>,
    pub fact_events: Vec<FactEvent>,
}

impl EvaluationReport {
    /// See [`rule_fired`].
    pub fn rule_fired(&self, rule_name: &str) -> bool {
        rule_fired(&self.activations, rule_name)
    }

    /// Number of rule firings in this report.
    pub fn fired_count(&self) -> usize {
        self.activations.len()
    }

    /// Appends `other` after this report's records.
    pub fn merge(&mut self, other: Self) {
        self.activations.extend(other.activations);
        self.fact_events.extend(other.fact_events);
    }
}

// ---------------------------------------------------------------------------
// Journals
// ---------------------------------------------------------------------------

/// Accumulated rule activations across evaluations, in firing order.
#[derive(Debug, Clone, Default)]
pub struct ActivationJournal {
    activations: Vec<Activation>,
}

impl ActivationJournal {
    /// Appends activations after those already recorded.
    pub fn record(&mut self, activations: impl IntoIterator<Item = Activation>) {
        self.activations.extend(activations);
    }

    /// Recorded activations in firing order.
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    /// See [`rule_fired`].
    pub fn rule_fired(&self, rule_name: &str) -> bool {
        rule_fired(&self.activations, rule_name)
    }

    /// See [`all_rules_fired`].
    pub fn all_rules_fired<S: AsRef<str>>(&self, rule_names: &[S]) -> bool {
        all_rules_fired(&self.activations, rule_names)
    }

    /// See [`pretty_rules_fired`].
    pub fn pretty(&self) -> String {
        pretty_rules_fired(&self.activations)
    }

    /// Discards every recorded activation.
    pub fn clear(&mut self) {
        self.activations.clear();
    }

    pub fn len(&self) -> usize {
        self.activations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activations.is_empty()
    }
}

/// Which fact events a [`FactJournal`] keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JournalFilter {
    #[default]
    All,
    /// Only events for one fact.
    Handle(FactHandle),
    /// Only events for facts of one type.
    FactType(String),
}

impl JournalFilter {
    fn accepts(&self, event: &FactEvent) -> bool {
        match self {
            Self::All => true,
            Self::Handle(handle) => event.handle == *handle,
            Self::FactType(name) => event.fact_type == *name,
        }
    }
}

/// Accumulated fact mutations, optionally restricted by a [`JournalFilter`].
#[derive(Debug, Clone, Default)]
pub struct FactJournal {
    filter: JournalFilter,
    events: Vec<FactEvent>,
}

impl FactJournal {
    /// An empty journal keeping only events `filter` accepts.
    pub fn new(filter: JournalFilter) -> Self {
        Self {
            filter,
            events: Vec::new(),
        }
    }

    /// The filter applied on every `record` call.
    pub fn filter(&self) -> &JournalFilter {
        &self.filter
    }

    /// Records the events the filter accepts; returns how many were kept.
    pub fn record(&mut self, events: impl IntoIterator<Item = FactEvent>) -> usize {
        let before = self.events.len();
        let filter = &self.filter;
        self.events
            .extend(events.into_iter().filter(|e| filter.accepts(e)));
        self.events.len() - before
    }

    /// Kept events in recording order.
    pub fn events(&self) -> &[FactEvent] {
        &self.events
    }

    /// Events of one kind, in recording order.
    pub fn of_kind(&self, kind: FactEventKind) -> impl Iterator<Item = &FactEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn inserted(&self) -> impl Iterator<Item = &FactEvent> {
        self.of_kind(FactEventKind::Inserted)
    }

    pub fn updated(&self) -> impl Iterator<Item = &FactEvent> {
        self.of_kind(FactEventKind::Updated)
    }

    pub fn retracted(&self) -> impl Iterator<Item = &FactEvent> {
        self.of_kind(FactEventKind::Retracted)
    }

    /// Events concerning the fact behind `handle`.
    pub fn for_handle(&self, handle: FactHandle) -> impl Iterator<Item = &FactEvent> {
        self.events.iter().filter(move |e| e.handle == handle)
    }

    /// Events concerning facts of `fact_type`.
    pub fn for_type<'a>(&'a self, fact_type: &'a str) -> impl Iterator<Item = &'a FactEvent> + 'a {
        self.events.iter().filter(move |e| e.fact_type == fact_type)
    }

    /// Discards every kept event; the filter stays.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
