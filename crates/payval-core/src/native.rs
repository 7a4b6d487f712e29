//! The built-in rule engine.
//!
//! [`NativeBackend`] compiles JSON rule documents (see [`source`]) into a
//! [`NativePackage`]. Every rule in a document names a *template*: a Rust
//! [`Rule`] implementation registered on the backend and parameterised by the
//! document. The shipped templates live in [`templates`]; embedders add their
//! own with [`NativeBackend::register_template`].
//!
//! Sessions run a forward-chaining agenda to a fixed point. An activation is
//! a (rule, fact, fact version) triple and fires at most once. Higher
//! salience fires first; ties go to declaration order, then fact insertion
//! order.
pub mod rule;
pub mod session;
pub mod source;
pub mod templates;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::annotation::{Attribute, Severity};
use crate::backend::{Globals, RuleBackend, RulePackage, RuleSession};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::payment::Leg;
use crate::resource::LoadedResource;

pub use rule::{Consequence, Rule, RuleContext};
pub use session::NativeSession;
use source::{PackageSource, QuerySelect};

#[cfg(test)]
mod tests;

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Builds a rule from its document parameters.
///
/// Returns a human-readable reason on bad parameters; the backend wraps it
/// into [`ConfigError::Compile`].
pub type TemplateFactory =
    Arc<dyn Fn(&TemplateArgs<'_>) -> Result<Box<dyn Rule>, String> + Send + Sync>;

/// The parameters a template is instantiated with.
#[derive(Debug, Clone, Copy)]
pub struct TemplateArgs<'a> {
    rule: &'a str,
    label: &'a str,
    params: &'a Map<String, Value>,
}

impl<'a> TemplateArgs<'a> {
    pub fn new(rule: &'a str, label: &'a str, params: &'a Map<String, Value>) -> Self {
        Self { rule, label, params }
    }

    /// Full rule name, including any table row prefix.
    pub fn rule(&self) -> &'a str {
        self.rule
    }

    pub fn params(&self) -> &'a Map<String, Value> {
        self.params
    }

    /// The `message` parameter, defaulting to the rule's label.
    pub fn message(&self) -> Result<String, String> {
        Ok(self.opt_str("message")?.unwrap_or(self.label).to_owned())
    }

    pub fn str(&self, key: &str) -> Result<&'a str, String> {
        self.opt_str(key)?
            .ok_or_else(|| format!("missing parameter \"{key}\""))
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<&'a str>, String> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(format!("parameter \"{key}\" must be a string, got {other}")),
        }
    }

    /// Compiles the `key` parameter, or `default` when absent.
    pub fn regex(&self, key: &str, default: &str) -> Result<Regex, String> {
        let pattern = self.opt_str(key)?.unwrap_or(default);
        Regex::new(pattern).map_err(|e| format!("parameter \"{key}\": {e}"))
    }

    pub fn severity(&self, default: Severity) -> Result<Severity, String> {
        self.parsed("severity", default)
    }

    pub fn attribute(&self, default: Option<Attribute>) -> Result<Option<Attribute>, String> {
        match self.opt_str("attribute")? {
            None => Ok(default),
            Some(raw) => raw.parse().map(Some),
        }
    }

    pub fn leg(&self) -> Result<Leg, String> {
        match self.str("leg")? {
            "SELL" => Ok(Leg::Sell),
            "BUY" => Ok(Leg::Buy),
            other => Err(format!("parameter \"leg\" must be SELL or BUY, got \"{other}\"")),
        }
    }

    /// A decimal given either as a JSON string or number.
    pub fn decimal(&self, key: &str, default: Decimal) -> Result<Decimal, String> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::String(s)) => {
                Decimal::from_str(s).map_err(|e| format!("parameter \"{key}\": {e}"))
            }
            Some(Value::Number(n)) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .map_err(|e| format!("parameter \"{key}\": {e}")),
            Some(other) => Err(format!("parameter \"{key}\" must be a decimal, got {other}")),
        }
    }

    fn parsed<T: FromStr<Err = String>>(&self, key: &str, default: T) -> Result<T, String> {
        self.opt_str(key)?
            .map_or(Ok(default), |raw| raw.parse().map_err(|e| format!("parameter \"{key}\": {e}")))
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// The shipped [`RuleBackend`].
#[derive(Clone)]
pub struct NativeBackend {
    templates: BTreeMap<String, TemplateFactory>,
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NativeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBackend")
            .field("templates", &self.templates.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NativeBackend {
    /// A backend with every built-in template registered.
    pub fn new() -> Self {
        let mut backend = Self::empty();
        for (name, factory) in templates::builtins() {
            backend.templates.insert(name.to_owned(), factory);
        }
        backend
    }

    /// A backend with no templates at all.
    pub fn empty() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    /// Registers a custom template.
    ///
    /// # Errors
    ///
    /// [`ConfigError::DuplicateBinding`] when `name` is already taken.
    pub fn register_template<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), ConfigError>
    where
        F: Fn(&TemplateArgs<'_>) -> Result<Box<dyn Rule>, String> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.templates.contains_key(&name) {
            return Err(ConfigError::DuplicateBinding {
                name,
                existing: "template registry".to_owned(),
            });
        }
        self.templates.insert(name, Arc::new(factory));
        Ok(())
    }

    /// Builder form of [`NativeBackend::register_template`].
    pub fn with_template<F>(mut self, name: impl Into<String>, factory: F) -> Result<Self, ConfigError>
    where
        F: Fn(&TemplateArgs<'_>) -> Result<Box<dyn Rule>, String> + Send + Sync + 'static,
    {
        self.register_template(name, factory)?;
        Ok(self)
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    fn instantiate(
        &self,
        package: &str,
        template: &str,
        args: &TemplateArgs<'_>,
    ) -> Result<Box<dyn Rule>, ConfigError> {
        let factory = self
            .templates
            .get(template)
            .ok_or_else(|| ConfigError::UnknownTemplate {
                rule: args.rule().to_owned(),
                template: template.to_owned(),
            })?;
        factory(args).map_err(|detail| ConfigError::Compile {
            package: package.to_owned(),
            detail: format!("rule \"{}\": {detail}", args.rule()),
        })
    }
}

impl RuleBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn compile(&self, resources: &[LoadedResource]) -> Result<Arc<dyn RulePackage>, ConfigError> {
        let mut builder = PackageBuilder::default();
        for resource in resources {
            for package in source::parse(resource)? {
                builder.add(self, &resource.descriptor.to_string(), package)?;
            }
        }
        let package = builder.finish();
        tracing::info!(
            backend = self.name(),
            packages = ?package.package_names(),
            rules = package.rules.len(),
            queries = package.queries.len(),
            "compiled rule packages"
        );
        Ok(Arc::new(package))
    }
}

// ---------------------------------------------------------------------------
// Compiled package
// ---------------------------------------------------------------------------

/// A rule with its agenda metadata.
#[derive(Debug)]
pub struct CompiledRule {
    pub name: String,
    pub package: String,
    pub salience: i32,
    pub rule: Box<dyn Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub package: String,
    pub select: QuerySelect,
    pub fact_type: Option<String>,
}

/// The immutable result of [`NativeBackend::compile`].
#[derive(Debug, Default)]
pub struct NativePackage {
    packages: Vec<String>,
    rules: Vec<CompiledRule>,
    queries: BTreeMap<String, CompiledQuery>,
}

impl NativePackage {
    /// Rules in agenda priority order.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn query(&self, name: &str) -> Option<&CompiledQuery> {
        self.queries.get(name)
    }
}

impl RulePackage for NativePackage {
    fn package_names(&self) -> Vec<String> {
        self.packages.clone()
    }

    fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name.clone()).collect()
    }

    fn query_names(&self) -> Vec<String> {
        self.queries.keys().cloned().collect()
    }

    fn new_session(self: Arc<Self>, globals: Globals, config: &EngineConfig) -> Box<dyn RuleSession> {
        Box::new(NativeSession::new(self, globals, config))
    }
}

#[derive(Default)]
struct PackageBuilder {
    package: NativePackage,
    origins: BTreeMap<String, String>,
}

impl PackageBuilder {
    fn add(
        &mut self,
        backend: &NativeBackend,
        origin: &str,
        source: PackageSource,
    ) -> Result<(), ConfigError> {
        let name = source.package;
        if let Some(existing) = self.origins.get(&name) {
            return Err(ConfigError::DuplicateBinding {
                name,
                existing: existing.clone(),
            });
        }
        self.origins.insert(name.clone(), origin.to_owned());

        for rule in source.rules {
            let args = TemplateArgs::new(&rule.name, &rule.name, &rule.params);
            let compiled = backend.instantiate(&name, &rule.template, &args)?;
            self.push_rule(&name, rule.name, rule.salience, compiled)?;
        }
        for table in source.tables {
            for (rule_name, label, params) in table.expand() {
                let args = TemplateArgs::new(&rule_name, &label, &params);
                let compiled = backend.instantiate(&name, &table.template, &args)?;
                self.push_rule(&name, rule_name, table.salience, compiled)?;
            }
        }
        for query in source.queries {
            if let Some(existing) = self.package.queries.get(&query.name) {
                return Err(ConfigError::DuplicateBinding {
                    name: query.name,
                    existing: existing.package.clone(),
                });
            }
            self.package.queries.insert(
                query.name,
                CompiledQuery {
                    package: name.clone(),
                    select: query.select,
                    fact_type: query.fact_type,
                },
            );
        }
        self.package.packages.push(name);
        Ok(())
    }

    fn push_rule(
        &mut self,
        package: &str,
        name: String,
        salience: i32,
        rule: Box<dyn Rule>,
    ) -> Result<(), ConfigError> {
        if let Some(existing) = self.package.rules.iter().find(|r| r.name == name) {
            return Err(ConfigError::DuplicateBinding {
                name,
                existing: existing.package.clone(),
            });
        }
        tracing::debug!(rule = %name, package, salience, "compiled rule");
        self.package.rules.push(CompiledRule {
            name,
            package: package.to_owned(),
            salience,
            rule,
        });
        Ok(())
    }

    fn finish(mut self) -> NativePackage {
        // Stable: equal salience keeps declaration order.
        self.package.rules.sort_by(|a, b| b.salience.cmp(&a.salience));
        self.package
    }
}
