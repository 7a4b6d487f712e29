#![allow(clippy::expect_used)]

use std::any::Any;

use super::*;
use crate::country::CountryList;
use crate::error::EvaluationError;
use crate::fact::{Fact, FactHandle, FactValue};
use crate::journal::FactEventKind;
use crate::request::ValidationRequest;
use crate::resource::ResourceDescriptor;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Counter {
    name: &'static str,
    remaining: u32,
}

impl Fact for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn property(&self, name: &str) -> Option<FactValue> {
        match name {
            "name" => Some(self.name.into()),
            "remaining" => Some(i64::from(self.remaining).into()),
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

/// Decrements a counter and updates it until it reaches zero.
#[derive(Debug)]
struct Countdown;

impl Rule for Countdown {
    fn fact_type(&self) -> Option<&str> {
        Some("Counter")
    }

    fn when(&self, fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(fact.downcast_ref::<Counter>().is_some_and(|c| c.remaining > 0))
    }

    fn then(&self, fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        if let Some(counter) = fact.downcast_mut::<Counter>() {
            counter.remaining -= 1;
            cx.update();
        }
        Ok(())
    }
}

/// Always true, never changes anything.
#[derive(Debug)]
struct Always;

impl Rule for Always {
    fn fact_type(&self) -> Option<&str> {
        None
    }

    fn when(&self, _fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(true)
    }

    fn then(&self, _fact: &mut dyn Fact, _cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        Ok(())
    }
}

/// Updates the fact every time, so it never reaches a fixed point.
#[derive(Debug)]
struct Forever;

impl Rule for Forever {
    fn fact_type(&self) -> Option<&str> {
        None
    }

    fn when(&self, _fact: &dyn Fact, _cx: &RuleContext<'_>) -> Result<bool, EvaluationError> {
        Ok(true)
    }

    fn then(&self, _fact: &mut dyn Fact, cx: &mut Consequence<'_>) -> Result<(), EvaluationError> {
        cx.update();
        Ok(())
    }
}

fn backend() -> NativeBackend {
    NativeBackend::new()
        .with_template("test.countdown", |_| Ok(Box::new(Countdown) as Box<dyn Rule>))
        .and_then(|b| b.with_template("test.always", |_| Ok(Box::new(Always) as Box<dyn Rule>)))
        .and_then(|b| b.with_template("test.forever", |_| Ok(Box::new(Forever) as Box<dyn Rule>)))
        .expect("templates")
}

fn resource(json: &str) -> LoadedResource {
    LoadedResource {
        descriptor: ResourceDescriptor::classpath("test.json"),
        contents: json.to_owned(),
    }
}

fn compile(documents: &[&str]) -> Result<Arc<dyn RulePackage>, ConfigError> {
    let resources: Vec<_> = documents.iter().map(|d| resource(d)).collect();
    backend().compile(&resources)
}

fn session(package: Arc<dyn RulePackage>) -> Box<dyn RuleSession> {
    let globals = Globals::new().with(CountryList::GLOBAL, CountryList::iso3166());
    package.new_session(globals, &EngineConfig::default())
}

const QUERIES: &str = r#"{ "package": "queries", "queries": [
    { "name": "annotations", "select": "annotations" },
    { "name": "rejected", "select": "rejected" },
    { "name": "requests", "select": "requests" },
    { "name": "counters", "select": "facts", "factType": "Counter" } ] }"#;

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

#[test]
fn rules_are_ordered_by_salience_then_declaration() {
    let package = compile(&[r#"{ "package": "p", "rules": [
        { "name": "low", "template": "test.always", "salience": 1 },
        { "name": "first high", "template": "test.always", "salience": 5 },
        { "name": "second high", "template": "test.always", "salience": 5 } ] }"#])
    .expect("compile");
    assert_eq!(package.rule_names(), ["first high", "second high", "low"]);
    assert_eq!(package.package_names(), ["p"]);
}

#[test]
fn tables_expand_to_numbered_rules() {
    let package = compile(&[r#"{ "package": "p", "tables": [
        { "name": "BBAN", "template": "iban.bban", "rows": [
            { "name": "UK", "params": { "country": "GB", "pattern": "^[A-Z]{4}[0-9]{14}$" } },
            { "params": { "country": "DE", "pattern": "^[0-9]{18}$" } } ] } ] }"#])
    .expect("compile");
    assert_eq!(package.rule_names(), ["Row 1 UK", "Row 2 BBAN"]);
}

#[test]
fn duplicate_queries_across_packages_are_rejected() {
    let err = compile(&[QUERIES, r#"{ "package": "other", "queries": [
        { "name": "annotations", "select": "rejected" } ] }"#])
    .expect_err("should fail");
    assert_eq!(
        err,
        ConfigError::DuplicateBinding {
            name: "annotations".to_owned(),
            existing: "queries".to_owned(),
        }
    );
}

#[test]
fn duplicate_rules_and_packages_are_rejected() {
    let rule = r#"{ "package": "a", "rules": [ { "name": "r", "template": "test.always" } ] }"#;
    let again = r#"{ "package": "b", "rules": [ { "name": "r", "template": "test.always" } ] }"#;
    assert!(matches!(
        compile(&[rule, again]),
        Err(ConfigError::DuplicateBinding { ref name, ref existing }) if name == "r" && existing == "a"
    ));
    assert!(matches!(
        compile(&[rule, rule]),
        Err(ConfigError::DuplicateBinding { ref name, .. }) if name == "a"
    ));
}

#[test]
fn unknown_template_is_reported() {
    let err = compile(&[r#"{ "package": "p", "rules": [ { "name": "r", "template": "nope" } ] }"#])
        .expect_err("should fail");
    assert_eq!(
        err,
        ConfigError::UnknownTemplate {
            rule: "r".to_owned(),
            template: "nope".to_owned(),
        }
    );
}

#[test]
fn bad_template_params_fail_compilation() {
    let err = compile(&[r#"{ "package": "p", "rules": [
        { "name": "r", "template": "iban.format", "params": { "pattern": "([" } } ] }"#])
    .expect_err("should fail");
    assert!(matches!(err, ConfigError::Compile { ref package, ref detail }
        if package == "p" && detail.contains("rule \"r\"")));
}

#[test]
fn template_names_are_unique() {
    let err = NativeBackend::new()
        .with_template("iban.mod97", |_| Ok(Box::new(Always) as Box<dyn Rule>))
        .expect_err("should fail");
    assert!(matches!(err, ConfigError::DuplicateBinding { ref name, .. } if name == "iban.mod97"));
    assert!(NativeBackend::empty().template_names().next().is_none());
    assert!(NativeBackend::new().template_names().any(|t| t == "payment.derive_iban"));
}

// ---------------------------------------------------------------------------
// Agenda
// ---------------------------------------------------------------------------

#[test]
fn updated_facts_rematch_until_fixed_point() {
    let package = compile(&[
        QUERIES,
        r#"{ "package": "p", "rules": [ { "name": "countdown", "template": "test.countdown" } ] }"#,
    ])
    .expect("compile");
    let mut session = session(package);
    let product = session.insert(Box::new(Counter { name: "product", remaining: 10 }));
    let customer = session.insert(Box::new(Counter { name: "customer", remaining: 1 }));

    let report = session.fire_all().expect("fire");
    assert_eq!(report.fired_count(), 11);
    let updates = |h: FactHandle| {
        report
            .fact_events
            .iter()
            .filter(|e| e.kind == FactEventKind::Updated && e.handle == h)
            .count()
    };
    assert_eq!(updates(product), 10);
    assert_eq!(updates(customer), 1);

    let counter = session
        .get(product)
        .and_then(|f| f.downcast_ref::<Counter>())
        .expect("counter");
    assert_eq!(counter.remaining, 0);
    assert_eq!(session.query("counters").expect("query").len(), 2);

    // A second pass has nothing left to do.
    assert_eq!(session.fire_all().expect("fire").fired_count(), 0);
}

#[test]
fn each_activation_fires_once() {
    let package = compile(&[r#"{ "package": "p", "rules": [
        { "name": "always", "template": "test.always" } ] }"#])
    .expect("compile");
    let mut session = session(package);
    let first = session.insert(Box::new(Counter { name: "a", remaining: 0 }));
    assert_eq!(session.fire_all().expect("fire").fired_count(), 1);
    session.insert(Box::new(Counter { name: "b", remaining: 0 }));
    assert_eq!(session.fire_all().expect("fire").fired_count(), 1);

    session
        .update(first, Box::new(Counter { name: "a", remaining: 3 }))
        .expect("update");
    let report = session.fire_all().expect("fire");
    assert_eq!(report.activations[0].handle, first);
}

#[test]
fn activation_limit_aborts_evaluation() {
    let package = compile(&[r#"{ "package": "p", "rules": [
        { "name": "forever", "template": "test.forever" } ] }"#])
    .expect("compile");
    let config = EngineConfig {
        max_activations: 25,
        ..EngineConfig::default()
    };
    let mut session = package.new_session(Globals::new(), &config);
    session.insert(Box::new(Counter { name: "x", remaining: 1 }));
    assert_eq!(
        session.fire_all().expect_err("should fail"),
        EvaluationError::ActivationLimit { limit: 25 }
    );
}

#[test]
fn missing_global_is_an_evaluation_error() {
    let package = compile(&[r#"{ "package": "p", "rules": [
        { "name": "country", "template": "iban.country" } ] }"#])
    .expect("compile");
    let mut session = package.new_session(Globals::new(), &EngineConfig::default());
    session.insert(Box::new(ValidationRequest::iban("GB29NWBK60161331926819")));
    assert_eq!(
        session.fire_all().expect_err("should fail"),
        EvaluationError::MissingGlobal {
            rule: "country".to_owned(),
            global: "countryList".to_owned(),
        }
    );
}

// ---------------------------------------------------------------------------
// Working memory and queries
// ---------------------------------------------------------------------------

#[test]
fn retract_and_unknown_handles() {
    let package = compile(&[QUERIES]).expect("compile");
    let mut session = session(package);
    let handle = session.insert(Box::new(Counter { name: "a", remaining: 0 }));
    let fact = session.retract(handle).expect("retract");
    assert_eq!(fact.type_name(), "Counter");
    assert!(session.get(handle).is_none());
    assert_eq!(
        session.retract(handle).expect_err("gone"),
        EvaluationError::UnknownHandle(handle)
    );
    assert!(session
        .update(handle, Box::new(Counter { name: "a", remaining: 0 }))
        .is_err());
}

#[test]
fn queries_read_request_annotations() {
    let package = compile(&[
        QUERIES,
        include_str!("../../rules/payments/validation/iban.json"),
    ])
    .expect("compile");
    let mut session = session(package);
    let bad = session.insert(Box::new(ValidationRequest::iban("ES050217009945")));
    session.insert(Box::new(ValidationRequest::iban("GB29NWBK60161331926819")));
    session.insert(Box::new(Counter { name: "noise", remaining: 0 }));
    session.fire_all().expect("fire");

    let annotations = session.query("annotations").expect("query");
    assert_eq!(annotations.len(), 1);
    let row = annotations.iter().next().expect("row");
    assert_eq!(row.handle("request"), Some(bad));
    assert_eq!(
        row.annotation("annotation").map(|a| a.rule()),
        Some("IBAN failed the Mod-97 checksum test.")
    );
    assert_eq!(session.query("rejected").expect("query").len(), 1);

    let requests = session.query("requests").expect("query");
    let validity: Vec<_> = requests.iter().filter_map(|r| r.value("valid").cloned()).collect();
    assert_eq!(validity, [FactValue::Bool(false), FactValue::Bool(true)]);

    assert_eq!(
        session.query("missing").expect_err("unknown"),
        EvaluationError::UnknownQuery("missing".to_owned())
    );
}

#[test]
fn rule_inserted_facts_are_matched_and_reported() {
    let package = compile(&[
        QUERIES,
        include_str!("../../rules/payments/validation/iban.json"),
        include_str!("../../rules/payments/validation/bic.json"),
        include_str!("../../rules/payments/validation/payment.json"),
    ])
    .expect("compile");
    let mut session = session(package);
    let payment = crate::payment::Payment::default()
        .with_iban("GB29 NWBK 6016 1331 9268 20")
        .with_bic("HLFXESMM");
    session.insert(Box::new(ValidationRequest::payment(payment)));
    let report = session.fire_all().expect("fire");

    let inserted: Vec<_> = report
        .fact_events
        .iter()
        .filter(|e| e.kind == FactEventKind::Inserted)
        .map(|e| e.fact_type.as_str())
        .collect();
    assert_eq!(inserted, ["IbanValidationRequest", "BicValidationRequest"]);
    assert!(report.rule_fired("IBAN failed the Mod-97 checksum test."));

    let annotations = session.query("annotations").expect("query");
    let rejected = annotations.annotations("annotation").expect("bindings");
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].attribute(), Some(crate::annotation::Attribute::Iban));
    assert_eq!(session.into_facts().len(), 3);
}
