#![allow(clippy::expect_used)]

use std::any::Any;

use super::*;
use crate::annotation::Severity;
use crate::country::CountryList;
use crate::fact::FactValue;
use crate::native::{Consequence, NativeBackend, Rule, RuleContext};
use crate::request::ValidationRequest;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A stock item whose `quantity` a rule drains one unit at a time.
#[derive(Debug, Clone, PartialEq)]
struct Item {
    kind: &'static str,
    quantity: i64,
    active: bool,
}

impl Fact for Item {
    fn type_name(&self) -> &str {
        self.kind
    }

    fn property(&self, name: &str) -> Option<FactValue> {
        match name {
            "quantity" => Some(self.quantity.into()),
            "active" => Some(self.active.into()),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Debug)]
struct Drain;

impl Rule for Drain {
    fn fact_type(&self) -> Option<&str> {
        None
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(fact.downcast_ref::<Item>().is_some_and(|i| i.quantity > 0))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        if let Some(item) = fact.downcast_mut::<Item>() {
            item.quantity -= 1;
            cx.update();
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Explode;

impl Rule for Explode {
    fn fact_type(&self) -> Option<&str> {
        Some("Bomb")
    }

    fn when(&self, _fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(true)
    }

    fn then(&self, _fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        Err(EvaluationError::RuleFailed {
            rule: cx.rule().to_owned(),
            detail: "boom".to_owned(),
        })
    }
}

fn item(kind: &'static str, quantity: i64) -> Item {
    Item {
        kind,
        quantity,
        active: false,
    }
}

fn backend() -> NativeBackend {
    NativeBackend::new()
        .with_template("test.drain", |_| Ok(Box::new(Drain) as Box<dyn Rule>))
        .and_then(|b| b.with_template("test.explode", |_| Ok(Box::new(Explode) as Box<dyn Rule>)))
        .expect("templates")
}

fn loader() -> ResourceLoader {
    let mut loader = ResourceLoader::default();
    loader.register(
        "test/stock.json",
        r#"{ "package": "stock", "rules": [
            { "name": "121 Drain stock", "template": "test.drain" },
            { "name": "Bomb goes off", "template": "test.explode" } ] }"#,
    );
    loader
}

fn globals() -> Globals {
    Globals::new().with(CountryList::GLOBAL, CountryList::iso3166())
}

fn stock_kb() -> KnowledgeBase {
    KnowledgeBase::with_loader(
        &backend(),
        &loader(),
        &[
            ResourceDescriptor::classpath("rules/payments/validation/validation.json"),
            ResourceDescriptor::classpath("test/stock.json"),
        ],
        globals(),
        EngineConfig::default(),
    )
    .expect("knowledge base")
}

fn iban_kb() -> KnowledgeBase {
    KnowledgeBase::initialize(
        &NativeBackend::new(),
        &[
            ResourceDescriptor::classpath("rules/payments/validation/validation.json"),
            ResourceDescriptor::classpath("rules/payments/validation/iban.json"),
        ],
        globals(),
        EngineConfig::default(),
    )
    .expect("knowledge base")
}

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

#[test]
fn missing_resource_fails_initialization() {
    let err = KnowledgeBase::initialize(
        &NativeBackend::new(),
        &[ResourceDescriptor::classpath("rules/nowhere.json")],
        Globals::new(),
        EngineConfig::default(),
    )
    .expect_err("should fail");
    assert!(matches!(err, ConfigError::ResourceLoad { .. }));
}

#[test]
fn describe_lists_packages_rules_and_queries() {
    let text = stock_kb().describe();
    assert!(text.contains("packages: payments.validation, stock"));
    assert!(text.contains("rule 1: 121 Drain stock"));
    assert!(text.contains("queries: annotations, rejected, requests"));
    assert!(text.contains("globals: countryList"));
}

// ---------------------------------------------------------------------------
// Stateful
// ---------------------------------------------------------------------------

#[test]
fn updates_are_journaled_per_fact() {
    let mut harness = StatefulHarness::start(stock_kb());
    let product = harness.insert(item("Product", 10)).expect("insert");
    let customer = harness.insert(item("Customer", 1)).expect("insert");
    let report = harness.evaluate().expect("evaluate");

    assert_eq!(report.fired_count(), 11);
    assert_eq!(harness.fact_journal().updated().count(), 11);
    assert_eq!(harness.fact_journal().for_handle(product).count(), 11);
    assert_eq!(harness.fact_journal().for_handle(customer).count(), 2);
    assert_eq!(harness.get::<Item>(product).map(|i| i.quantity), Some(0));
}

#[test]
fn fact_filter_keeps_one_type() {
    let mut harness = StatefulHarness::start(stock_kb())
        .with_fact_filter(JournalFilter::FactType("Customer".to_owned()));
    harness.insert(item("Product", 10)).expect("insert");
    harness.insert(item("Customer", 1)).expect("insert");
    harness.evaluate().expect("evaluate");
    assert_eq!(harness.fact_journal().inserted().count(), 1);
    assert_eq!(harness.fact_journal().updated().count(), 1);
}

#[test]
fn fired_rules_match_by_suffix() {
    let mut harness = StatefulHarness::start(stock_kb());
    harness.insert(item("Product", 1)).expect("insert");
    harness.evaluate().expect("evaluate");
    assert!(harness.query_fired("Drain stock"));
    assert!(harness.query_fired("drain STOCK"));
    assert!(!harness.query_fired("121"));
    assert!(harness.all_fired(&["Drain stock", "121 drain stock"]));
    assert!(!harness.all_fired(&["Drain stock", "Bomb goes off"]));
}

#[test]
fn start_session_clears_facts_and_history() {
    let mut harness = StatefulHarness::start(stock_kb());
    harness.insert(item("Product", 2)).expect("insert");
    harness.evaluate().expect("evaluate");
    assert_eq!(harness.find_facts_by_type("Product", &[]).len(), 1);

    harness.start_session();
    assert!(harness.find_facts_by_type("Product", &[]).is_empty());
    assert!(harness.activations().is_empty());
    assert!(harness.fact_journal().is_empty());
    assert_eq!(harness.fact_count(), 0);
}

#[test]
fn find_facts_by_type_applies_filters() {
    let mut harness = StatefulHarness::start(stock_kb());
    harness.insert(item("Product", 0)).expect("insert");
    harness
        .insert(Item {
            active: true,
            ..item("Product", 0)
        })
        .expect("insert");
    harness.insert(item("Customer", 0)).expect("insert");

    let inactive: PropertyFilter = "active=false".parse().expect("filter");
    assert_eq!(harness.find_facts_by_type("Product", &[inactive]).len(), 1);
    let none = [PropertyFilter::new("active", false), PropertyFilter::new("quantity", 3)];
    assert!(harness.find_facts_by_type("Product", &none).is_empty());
    let unknown = [PropertyFilter::new("colour", "red")];
    assert!(harness.find_facts_by_type("Customer", &unknown).is_empty());
}

#[test]
fn retract_all_empties_working_memory() {
    let mut harness = StatefulHarness::start(stock_kb());
    harness
        .insert_facts(vec![Box::new(item("Product", 0)), Box::new(item("Customer", 0))])
        .expect("insert");
    assert_eq!(harness.retract_all().expect("retract"), 2);
    assert_eq!(harness.fact_journal().retracted().count(), 2);
    assert_eq!(harness.fact_count(), 0);
}

#[test]
fn failed_evaluation_marks_session_dirty() {
    let mut harness = StatefulHarness::start(stock_kb());
    harness.insert(item("Bomb", 0)).expect("insert");
    let err = harness.evaluate().expect_err("should fail");
    assert!(matches!(err, HarnessError::Evaluation(EvaluationError::RuleFailed { .. })));
    assert!(harness.is_dirty());
    assert_eq!(
        harness.insert(item("Product", 1)).expect_err("dirty"),
        HarnessError::SessionDirty
    );

    harness.start_session();
    assert!(!harness.is_dirty());
    assert_eq!(harness.fact_count(), 0);
    harness.insert(item("Product", 1)).expect("insert");
    assert_eq!(harness.evaluate().expect("evaluate").fired_count(), 1);
}

#[test]
fn reset_listeners_keeps_facts() {
    let mut harness = StatefulHarness::start(stock_kb());
    harness.insert(item("Product", 1)).expect("insert");
    harness.evaluate().expect("evaluate");
    harness.reset_listeners();
    assert!(harness.activations().is_empty());
    assert_eq!(harness.fact_count(), 1);
}

#[test]
fn stateful_validation_of_ibans() {
    let mut harness = StatefulHarness::start(iban_kb());
    let handle = harness
        .insert(ValidationRequest::iban("GB29 NWB0 6016 1331 9268 19"))
        .expect("insert");
    harness.evaluate().expect("evaluate");
    assert!(harness.query_fired("IBAN is for UK, but doesn't have BBAN structure."));
    let request = harness.get::<ValidationRequest>(handle).expect("request");
    assert_eq!(request.most_severe(), Some(Severity::Reject));
    assert!(harness.query_fired("Mod-97 checksum test."));
    let rejected = harness.query("rejected").expect("query");
    assert_eq!(rejected.len(), 2);
}

// ---------------------------------------------------------------------------
// Stateless
// ---------------------------------------------------------------------------

#[test]
fn with_query_validates_names() {
    let harness = StatelessHarness::new(iban_kb());
    assert_eq!(
        harness.clone().with_query("nope", "x").expect_err("unknown"),
        ConfigError::UnknownQuery {
            query: "nope".to_owned()
        }
    );
    let err = harness
        .with_query("annotations", "out")
        .and_then(|h| h.with_query("rejected", "out"))
        .expect_err("duplicate");
    assert!(matches!(err, ConfigError::DuplicateBinding { ref name, .. } if name == "out"));
}

#[test]
fn execute_runs_in_a_fresh_session() {
    let harness = StatelessHarness::new(iban_kb())
        .with_query("annotations", "annotations")
        .expect("query");

    let results = harness
        .execute(vec![Box::new(ValidationRequest::iban("ES050217009945"))])
        .expect("execute");
    assert!(results.rule_fired("IBAN failed the Mod-97 checksum test."));
    assert_eq!(results.query("annotations").map(QueryResults::len), Some(1));
    assert_eq!(results.report.fact_events[0].kind, FactEventKind::Inserted);
    assert!(results.fact::<ValidationRequest>().is_some_and(|r| !r.is_valid()));

    let results = harness
        .execute(vec![Box::new(ValidationRequest::iban("ES5702170302862100282783"))])
        .expect("execute");
    assert_eq!(results.report.fired_count(), 0);
    assert_eq!(results.facts.len(), 1);
    assert_eq!(results.facts_of_type("IbanValidationRequest").count(), 1);
}

#[test]
fn stateless_harness_is_shareable() {
    let harness = Arc::new(
        StatelessHarness::new(iban_kb())
            .with_query("annotations", "annotations")
            .expect("query"),
    );
    let workers: Vec<_> = (0..4)
        .map(|i| {
            let harness = Arc::clone(&harness);
            std::thread::spawn(move || {
                let iban = if i % 2 == 0 {
                    "GB29NWBK60161331926819"
                } else {
                    "GB29NWBK60161331926820"
                };
                harness
                    .execute(vec![Box::new(ValidationRequest::iban(iban))])
                    .map(|r| r.query("annotations").map_or(0, QueryResults::len))
            })
        })
        .collect();
    let counts: Vec<usize> = workers
        .into_iter()
        .map(|w| w.join().expect("join").expect("execute"))
        .collect();
    assert_eq!(counts, [0, 1, 0, 1]);
}
