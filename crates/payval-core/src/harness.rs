//! Session lifecycle around a pluggable [`RuleBackend`].
//!
//! A [`KnowledgeBase`] is the compiled, immutable rule set plus the globals
//! every session is bound to. It is cheap to clone and safe to share across
//! threads. On top of it sit two harnesses:
//!
//! - [`StatelessHarness`]: one fresh session per [`StatelessHarness::execute`]
//!   call, disposed when the call returns. Safe to share across threads.
//! - [`StatefulHarness`]: one long-lived session mutated incrementally, with
//!   journals accumulating rule activations and fact mutations. Not `Sync`;
//!   give each thread its own or wrap it in a mutex.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::backend::{Globals, QueryResults, RuleBackend, RulePackage, RuleSession};
use crate::config::EngineConfig;
use crate::error::{ConfigError, EvaluationError, HarnessError};
use crate::fact::{Fact, FactHandle, PropertyFilter, matches_all};
use crate::journal::{
    Activation, ActivationJournal, EvaluationReport, FactEvent, FactEventKind, FactJournal,
    JournalFilter,
};
use crate::resource::{LoadedResource, ResourceDescriptor, ResourceLoader};

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

/// A compiled rule package bound to its globals.
#[derive(Clone)]
pub struct KnowledgeBase {
    package: Arc<dyn RulePackage>,
    globals: Globals,
    config: EngineConfig,
}

impl fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("packages", &self.package.package_names())
            .field("globals", &self.globals)
            .field("config", &self.config)
            .finish()
    }
}

impl KnowledgeBase {
    /// Loads and compiles `resources` with a default [`ResourceLoader`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::ResourceLoad`] if a resource cannot be read, or any
    /// compile error the backend reports.
    pub fn initialize(
        backend: &dyn RuleBackend,
        resources: &[ResourceDescriptor],
        globals: Globals,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        let loader = ResourceLoader::new(&config);
        Self::with_loader(backend, &loader, resources, globals, config)
    }

    /// Like [`KnowledgeBase::initialize`] with an explicit loader.
    pub fn with_loader(
        backend: &dyn RuleBackend,
        loader: &ResourceLoader,
        resources: &[ResourceDescriptor],
        globals: Globals,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        let loaded = loader.load_all(resources)?;
        Self::from_loaded(backend, &loaded, globals, config)
    }

    /// Compiles already loaded resources.
    pub fn from_loaded(
        backend: &dyn RuleBackend,
        loaded: &[LoadedResource],
        globals: Globals,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        let package = backend.compile(loaded)?;
        let kb = Self {
            package,
            globals,
            config,
        };
        tracing::info!(
            backend = backend.name(),
            resources = loaded.len(),
            rules = kb.package.rule_names().len(),
            "knowledge base initialized"
        );
        Ok(kb)
    }

    /// A new, empty session bound to this knowledge base's globals.
    pub fn new_session(&self) -> Box<dyn RuleSession> {
        Arc::clone(&self.package).new_session(self.globals.clone(), &self.config)
    }

    /// The compiled rule package every session runs.
    pub fn package(&self) -> &Arc<dyn RulePackage> {
        &self.package
    }

    /// Globals bound into every new session.
    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Engine settings new sessions are created with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `true` if some package declares the query `name`.
    pub fn has_query(&self, name: &str) -> bool {
        self.package.query_names().iter().any(|q| q == name)
    }

    /// Multi-line summary of packages, rules in agenda order, and queries.
    pub fn describe(&self) -> String {
        let mut lines = vec![format!("packages: {}", self.package.package_names().join(", "))];
        lines.extend(
            self.package
                .rule_names()
                .into_iter()
                .enumerate()
                .map(|(i, rule)| format!("  rule {}: {rule}", i + 1)),
        );
        lines.push(format!("queries: {}", self.package.query_names().join(", ")));
        lines.push(format!(
            "globals: {}",
            self.globals.names().collect::<Vec<_>>().join(", ")
        ));
        lines.join("\n")
    }
}

fn fact_event(kind: FactEventKind, handle: FactHandle, fact: &dyn Fact) -> FactEvent {
    FactEvent::new(kind, handle, fact.type_name(), fact.describe())
}

// ---------------------------------------------------------------------------
// Stateful
// ---------------------------------------------------------------------------

/// A long-lived session with activation and fact-mutation journals.
///
/// After an evaluation error the session is dirty: every operation except
/// [`StatefulHarness::start_session`] and read-only accessors fails with
/// [`HarnessError::SessionDirty`] until it is restarted.
pub struct StatefulHarness {
    kb: KnowledgeBase,
    session: Box<dyn RuleSession>,
    activations: ActivationJournal,
    facts: FactJournal,
    dirty: bool,
}

impl fmt::Debug for StatefulHarness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatefulHarness")
            .field("kb", &self.kb)
            .field("facts", &self.session.facts().len())
            .field("activations", &self.activations.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl StatefulHarness {
    /// Opens a session on `kb` with empty journals.
    pub fn start(kb: KnowledgeBase) -> Self {
        let session = kb.new_session();
        Self {
            kb,
            session,
            activations: ActivationJournal::default(),
            facts: FactJournal::default(),
            dirty: false,
        }
    }

    /// Restricts the fact journal to one fact or fact type.
    ///
    /// Discards the journal's history.
    #[must_use]
    pub fn with_fact_filter(mut self, filter: JournalFilter) -> Self {
        self.facts = FactJournal::new(filter);
        self
    }

    /// Resets the session in place: retracts every fact and clears both
    /// journals. Also clears the dirty flag.
    ///
    /// A dirty session is replaced by a fresh one from the knowledge base,
    /// since its contents can no longer be trusted.
    pub fn start_session(&mut self) {
        if self.dirty {
            self.session = self.kb.new_session();
        } else {
            let handles: Vec<FactHandle> = self.session.facts().into_iter().map(|(h, _)| h).collect();
            for handle in handles {
                if let Err(err) = self.session.retract(handle) {
                    tracing::warn!(handle = %handle, error = %err, "retract during reset failed");
                }
            }
        }
        self.reset_listeners();
        self.dirty = false;
        tracing::debug!("session started");
    }

    /// Discards journal history without touching the session.
    pub fn reset_listeners(&mut self) {
        self.activations = ActivationJournal::default();
        self.facts = FactJournal::new(self.facts.filter().clone());
    }

    fn ensure_clean(&self) -> Result<(), HarnessError> {
        if self.dirty {
            Err(HarnessError::SessionDirty)
        } else {
            Ok(())
        }
    }

    /// Inserts one fact and journals the insertion.
    ///
    /// # Errors
    ///
    /// [`HarnessError::SessionDirty`] after a failed evaluation.
    pub fn insert<F: Fact>(&mut self, fact: F) -> Result<FactHandle, HarnessError> {
        self.insert_boxed(Box::new(fact))
    }

    /// Like [`StatefulHarness::insert`] for an already boxed fact.
    pub fn insert_boxed(&mut self, fact: Box<dyn Fact>) -> Result<FactHandle, HarnessError> {
        self.ensure_clean()?;
        let event_type = fact.type_name().to_owned();
        let description = fact.describe();
        let handle = self.session.insert(fact);
        self.facts.record([FactEvent::new(
            FactEventKind::Inserted,
            handle,
            event_type,
            description,
        )]);
        Ok(handle)
    }

    /// Inserts every fact in order and returns their handles.
    pub fn insert_facts(&mut self, facts: Vec<Box<dyn Fact>>) -> Result<Vec<FactHandle>, HarnessError> {
        facts.into_iter().map(|f| self.insert_boxed(f)).collect()
    }

    /// Replaces the fact behind `handle`, making it eligible for matching
    /// again on the next [`StatefulHarness::evaluate`].
    pub fn update<F: Fact>(&mut self, handle: FactHandle, fact: F) -> Result<(), HarnessError> {
        self.ensure_clean()?;
        let event = fact_event(FactEventKind::Updated, handle, &fact);
        self.session.update(handle, Box::new(fact))?;
        self.facts.record([event]);
        Ok(())
    }

    /// Removes one fact and hands it back.
    pub fn retract(&mut self, handle: FactHandle) -> Result<Box<dyn Fact>, HarnessError> {
        self.ensure_clean()?;
        let fact = self.session.retract(handle)?;
        self.facts
            .record([fact_event(FactEventKind::Retracted, handle, fact.as_ref())]);
        Ok(fact)
    }

    /// Removes every live fact; returns how many were removed.
    pub fn retract_all(&mut self) -> Result<usize, HarnessError> {
        self.ensure_clean()?;
        let handles: Vec<FactHandle> = self.session.facts().into_iter().map(|(h, _)| h).collect();
        for &handle in &handles {
            self.retract(handle)?;
        }
        Ok(handles.len())
    }

    /// Fires rules to a fixed point and journals what happened.
    ///
    /// # Errors
    ///
    /// [`HarnessError::Evaluation`] if the backend fails; the session is then
    /// dirty.
    pub fn evaluate(&mut self) -> Result<EvaluationReport, HarnessError> {
        self.ensure_clean()?;
        match self.session.fire_all() {
            Ok(report) => {
                self.activations.record(report.activations.iter().cloned());
                self.facts.record(report.fact_events.iter().cloned());
                tracing::debug!(fired = report.fired_count(), "evaluation finished");
                Ok(report)
            }
            Err(err) => {
                self.dirty = true;
                tracing::warn!(error = %err, "evaluation failed; session is dirty");
                Err(err.into())
            }
        }
    }

    /// True if any recorded activation's rule name ends with `rule_name`,
    /// ignoring case.
    pub fn query_fired(&self, rule_name: &str) -> bool {
        self.activations.rule_fired(rule_name)
    }

    /// True if [`StatefulHarness::query_fired`] holds for every name.
    pub fn all_fired<S: AsRef<str>>(&self, rule_names: &[S]) -> bool {
        self.activations.all_rules_fired(rule_names)
    }

    /// Every activation since the last reset, in firing order.
    pub fn activations(&self) -> &[Activation] {
        self.activations.activations()
    }

    /// The activation history backing `query_fired` and `all_fired`.
    pub fn activation_journal(&self) -> &ActivationJournal {
        &self.activations
    }

    /// Fact mutations since the last reset, restricted by the journal filter.
    pub fn fact_journal(&self) -> &FactJournal {
        &self.facts
    }

    /// Live facts of `type_name` whose properties satisfy every filter.
    pub fn find_facts_by_type(&self, type_name: &str, filters: &[PropertyFilter]) -> Vec<&dyn Fact> {
        self.session
            .facts()
            .into_iter()
            .map(|(_, fact)| fact)
            .filter(|fact| fact.type_name() == type_name && matches_all(*fact, filters))
            .collect()
    }

    /// The live fact behind `handle`, if it has type `T`.
    pub fn get<T: Fact>(&self, handle: FactHandle) -> Option<&T> {
        self.session.get(handle)?.downcast_ref::<T>()
    }

    /// Runs the named query against the live facts.
    pub fn query(&self, name: &str) -> Result<QueryResults, HarnessError> {
        self.ensure_clean()?;
        Ok(self.session.query(name)?)
    }

    /// Number of live facts.
    pub fn fact_count(&self) -> usize {
        self.session.facts().len()
    }

    /// `true` after a failed evaluation, until the next `start_session`.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The knowledge base the session was opened on.
    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }
}

// ---------------------------------------------------------------------------
// Stateless
// ---------------------------------------------------------------------------

/// What one [`StatelessHarness::execute`] call produced.
#[derive(Debug)]
pub struct ExecutionResults {
    /// Inserts made by the caller, then everything the evaluation did.
    pub report: EvaluationReport,
    /// Registered query results, keyed by result name.
    pub queries: BTreeMap<String, QueryResults>,
    /// The session's facts at disposal, in insertion order.
    pub facts: Vec<(FactHandle, Box<dyn Fact>)>,
}

impl ExecutionResults {
    /// The query results stored under `result_name`.
    pub fn query(&self, result_name: &str) -> Option<&QueryResults> {
        self.queries.get(result_name)
    }

    /// Suffix match of `rule_name` against this execution's activations.
    pub fn rule_fired(&self, rule_name: &str) -> bool {
        self.report.rule_fired(rule_name)
    }

    /// Takes the first final fact of type `T`.
    pub fn fact<T: Fact>(&self) -> Option<&T> {
        self.facts.iter().find_map(|(_, f)| f.as_ref().downcast_ref::<T>())
    }

    /// Final facts whose type tag is `type_name`.
    pub fn facts_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a dyn Fact> + 'a {
        self.facts
            .iter()
            .map(|(_, f)| f.as_ref())
            .filter(move |f| f.type_name() == type_name)
    }
}

/// Fire-once evaluation over a shared [`KnowledgeBase`].
#[derive(Debug, Clone)]
pub struct StatelessHarness {
    kb: KnowledgeBase,
    /// (result name, query name), in registration order.
    queries: Vec<(String, String)>,
}

impl StatelessHarness {
    /// A harness with no registered queries.
    pub fn new(kb: KnowledgeBase) -> Self {
        Self {
            kb,
            queries: Vec::new(),
        }
    }

    /// Runs `query` after every execution and stores it under `result_name`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownQuery`] if no package declares `query`;
    /// [`ConfigError::DuplicateBinding`] if `result_name` is taken.
    pub fn with_query(
        mut self,
        query: impl Into<String>,
        result_name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let query = query.into();
        let result_name = result_name.into();
        if !self.kb.has_query(&query) {
            return Err(ConfigError::UnknownQuery { query });
        }
        if let Some((_, existing)) = self.queries.iter().find(|(name, _)| *name == result_name) {
            return Err(ConfigError::DuplicateBinding {
                name: result_name,
                existing: format!("query {existing}"),
            });
        }
        self.queries.push((result_name, query));
        Ok(self)
    }

    /// Inserts `facts` into a fresh session, fires to a fixed point, runs the
    /// registered queries and disposes of the session.
    pub fn execute(&self, facts: Vec<Box<dyn Fact>>) -> Result<ExecutionResults, EvaluationError> {
        let mut session = self.kb.new_session();
        let mut report = EvaluationReport::default();
        for fact in facts {
            let event_type = fact.type_name().to_owned();
            let description = fact.describe();
            let handle = session.insert(fact);
            report.fact_events.push(FactEvent::new(
                FactEventKind::Inserted,
                handle,
                event_type,
                description,
            ));
        }
        report.merge(session.fire_all()?);

        let mut queries = BTreeMap::new();
        for (result_name, query) in &self.queries {
            queries.insert(result_name.clone(), session.query(query)?);
        }
        tracing::debug!(
            fired = report.fired_count(),
            queries = queries.len(),
            "stateless execution finished"
        );
        Ok(ExecutionResults {
            report,
            queries,
            facts: session.into_facts(),
        })
    }

    /// The knowledge base every execution opens a session on.
    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }
}
