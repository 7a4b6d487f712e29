//! Working memory and agenda for [`super::NativePackage`].
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::annotation::Severity;
use crate::backend::{Binding, Globals, QueryResults, QueryRow, RuleSession};
use crate::config::EngineConfig;
use crate::error::EvaluationError;
use crate::fact::{Fact, FactHandle, FactValue};
use crate::journal::{Activation, EvaluationReport, FactEvent, FactEventKind};
use crate::request::ValidationRequest;

use super::rule::{Consequence, RuleContext};
use super::source::QuerySelect;
use super::{CompiledQuery, NativePackage};

#[derive(Debug)]
struct Entry {
    fact: Box<dyn Fact>,
    version: u64,
}

/// (rule index, fact, fact version)
type ActivationKey = (usize, FactHandle, u64);

/// (request, index into its annotations)
type AnnotationKey = (FactHandle, usize);

/// A single-threaded session over a shared [`NativePackage`].
#[derive(Debug)]
pub struct NativeSession {
    package: Arc<NativePackage>,
    globals: Globals,
    max_activations: usize,
    facts: BTreeMap<FactHandle, Entry>,
    next_handle: u64,
    considered: HashSet<ActivationKey>,
    /// Firing sequence of every annotation a rule attached to a request.
    annotation_seq: BTreeMap<AnnotationKey, u64>,
    next_seq: u64,
}

impl NativeSession {
    pub fn new(package: Arc<NativePackage>, globals: Globals, config: &EngineConfig) -> Self {
        Self {
            package,
            globals,
            max_activations: config.max_activations,
            facts: BTreeMap::new(),
            next_handle: 1,
            considered: HashSet::new(),
            annotation_seq: BTreeMap::new(),
            next_seq: 0,
        }
    }

    fn allocate(&mut self, fact: Box<dyn Fact>) -> FactHandle {
        let handle = FactHandle::new(self.next_handle);
        self.next_handle += 1;
        self.facts.insert(handle, Entry { fact, version: 0 });
        handle
    }

    /// Finds the highest-priority activation not yet considered.
    ///
    /// Every candidate whose condition is checked is marked considered, so a
    /// false condition is not re-evaluated until the fact changes.
    fn next_activation(&mut self) -> Result<Option<(usize, FactHandle)>, EvaluationError> {
        for (index, compiled) in self.package.rules().iter().enumerate() {
            let cx = RuleContext::new(&compiled.name, &self.globals);
            for (&handle, entry) in &self.facts {
                if compiled
                    .rule
                    .fact_type()
                    .is_some_and(|ty| ty != entry.fact.type_name())
                {
                    continue;
                }
                if !self.considered.insert((index, handle, entry.version)) {
                    continue;
                }
                if compiled.rule.when(entry.fact.as_ref(), &cx)? {
                    return Ok(Some((index, handle)));
                }
            }
        }
        Ok(None)
    }

    fn fire(
        &mut self,
        index: usize,
        handle: FactHandle,
        report: &mut EvaluationReport,
    ) -> Result<(), EvaluationError> {
        let package = Arc::clone(&self.package);
        let compiled = package
            .rules()
            .get(index)
            .ok_or_else(|| EvaluationError::RuleFailed {
                rule: format!("#{index}"),
                detail: "no such rule in package".to_owned(),
            })?;
        let entry = self
            .facts
            .get_mut(&handle)
            .ok_or(EvaluationError::UnknownHandle(handle))?;

        let mut consequence = Consequence::new(&compiled.name, &self.globals);
        let before = annotation_count(entry.fact.as_ref());
        compiled.rule.then(entry.fact.as_mut(), &mut consequence)?;
        for slot in before..annotation_count(entry.fact.as_ref()) {
            self.annotation_seq.insert((handle, slot), self.next_seq);
            self.next_seq += 1;
        }
        tracing::debug!(rule = %compiled.name, handle = %handle, "rule fired");
        report
            .activations
            .push(Activation::new(&compiled.name, &compiled.package, handle));

        let (inserted, updated) = consequence.into_parts();
        if updated {
            entry.version += 1;
            report.fact_events.push(FactEvent::new(
                FactEventKind::Updated,
                handle,
                entry.fact.type_name(),
                entry.fact.describe(),
            ));
        }
        for fact in inserted {
            let event_type = fact.type_name().to_owned();
            let description = fact.describe();
            let new_handle = self.allocate(fact);
            tracing::debug!(rule = %compiled.name, handle = %new_handle, "fact inserted by rule");
            report.fact_events.push(FactEvent::new(
                FactEventKind::Inserted,
                new_handle,
                event_type,
                description,
            ));
        }
        Ok(())
    }

    fn requests(&self) -> impl Iterator<Item = (FactHandle, &ValidationRequest)> {
        self.facts
            .iter()
            .filter_map(|(&h, e)| e.fact.as_ref().downcast_ref::<ValidationRequest>().map(|r| (h, r)))
    }

    /// Annotation rows in firing order. Annotations no rule attached (added
    /// before insertion) come first, in fact order.
    fn annotation_rows(&self, rejected_only: bool) -> Vec<QueryRow> {
        let mut keyed: Vec<(Option<u64>, QueryRow)> = self
            .requests()
            .flat_map(|(handle, request)| {
                request
                    .annotations()
                    .iter()
                    .enumerate()
                    .filter(move |(_, a)| !rejected_only || a.severity() == Severity::Reject)
                    .map(move |(index, a)| {
                        let row = QueryRow::default()
                            .bind("annotation", Binding::Annotation(a.clone()))
                            .bind("request", Binding::Handle(handle));
                        (self.annotation_seq.get(&(handle, index)).copied(), row)
                    })
            })
            .collect();
        keyed.sort_by_key(|(seq, _)| *seq);
        keyed.into_iter().map(|(_, row)| row).collect()
    }

    fn rows(&self, query: &CompiledQuery) -> Vec<QueryRow> {
        match query.select {
            QuerySelect::Annotations => self.annotation_rows(false),
            QuerySelect::Rejected => self.annotation_rows(true),
            QuerySelect::Requests => self
                .requests()
                .map(|(handle, request)| {
                    QueryRow::default()
                        .bind("request", Binding::Handle(handle))
                        .bind("type", Binding::Value(request.type_name().into()))
                        .bind("subject", Binding::Value(request.subject().to_string().into()))
                        .bind("valid", Binding::Value(FactValue::Bool(request.is_valid())))
                })
                .collect(),
            QuerySelect::Facts => self
                .facts
                .iter()
                .filter(|(_, e)| {
                    query
                        .fact_type
                        .as_deref()
                        .is_none_or(|ty| ty == e.fact.type_name())
                })
                .map(|(&handle, _)| QueryRow::default().bind("fact", Binding::Handle(handle)))
                .collect(),
        }
    }
}

fn annotation_count(fact: &dyn Fact) -> usize {
    fact.downcast_ref::<ValidationRequest>()
        .map_or(0, |r| r.annotations().len())
}

impl RuleSession for NativeSession {
    fn insert(&mut self, fact: Box<dyn Fact>) -> FactHandle {
        let handle = self.allocate(fact);
        tracing::debug!(handle = %handle, "fact inserted");
        handle
    }

    fn update(&mut self, handle: FactHandle, fact: Box<dyn Fact>) -> Result<(), EvaluationError> {
        let entry = self
            .facts
            .get_mut(&handle)
            .ok_or(EvaluationError::UnknownHandle(handle))?;
        entry.fact = fact;
        entry.version += 1;
        self.annotation_seq.retain(|&(h, _), _| h != handle);
        tracing::debug!(handle = %handle, version = entry.version, "fact updated");
        Ok(())
    }

    fn retract(&mut self, handle: FactHandle) -> Result<Box<dyn Fact>, EvaluationError> {
        let entry = self
            .facts
            .remove(&handle)
            .ok_or(EvaluationError::UnknownHandle(handle))?;
        self.considered.retain(|&(_, h, _)| h != handle);
        self.annotation_seq.retain(|&(h, _), _| h != handle);
        tracing::debug!(handle = %handle, "fact retracted");
        Ok(entry.fact)
    }

    fn get(&self, handle: FactHandle) -> Option<&dyn Fact> {
        self.facts.get(&handle).map(|e| e.fact.as_ref())
    }

    fn facts(&self) -> Vec<(FactHandle, &dyn Fact)> {
        self.facts
            .iter()
            .map(|(&h, e)| (h, e.fact.as_ref()))
            .collect()
    }

    fn fire_all(&mut self) -> Result<EvaluationReport, EvaluationError> {
        let mut report = EvaluationReport::default();
        while let Some((index, handle)) = self.next_activation()? {
            if report.activations.len() >= self.max_activations {
                return Err(EvaluationError::ActivationLimit {
                    limit: self.max_activations,
                });
            }
            self.fire(index, handle, &mut report)?;
        }
        Ok(report)
    }

    fn query(&self, name: &str) -> Result<QueryResults, EvaluationError> {
        let query = self
            .package
            .query(name)
            .ok_or_else(|| EvaluationError::UnknownQuery(name.to_owned()))?;
        Ok(QueryResults::new(name, self.rows(query)))
    }

    fn into_facts(self: Box<Self>) -> Vec<(FactHandle, Box<dyn Fact>)> {
        self.facts.into_iter().map(|(h, e)| (h, e.fact)).collect()
    }
}
