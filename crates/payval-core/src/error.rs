//! Error types.
//!
//! Only infrastructure faults are errors. A rejected IBAN is a normal
//! [`crate::annotation::ValidationResult`] with `is_valid() == false`.
use thiserror::Error;

use crate::fact::FactHandle;

/// Failures while building a knowledge base or binding query results.
///
/// Raised at initialization time and never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A rule resource could not be located or read.
    #[error("failed to load rule resource {resource}: {detail}")]
    ResourceLoad { resource: String, detail: String },

    /// A rule resource was read but could not be compiled.
    #[error("failed to compile rule package {package}: {detail}")]
    Compile { package: String, detail: String },

    /// The same query, rule or result name was registered twice.
    #[error("duplicate binding \"{name}\" (already registered by {existing})")]
    DuplicateBinding { name: String, existing: String },

    #[error("unknown query \"{query}\"")]
    UnknownQuery { query: String },

    #[error("rule \"{rule}\" references unknown template \"{template}\"")]
    UnknownTemplate { rule: String, template: String },

    /// A configuration document could not be parsed.
    #[error("invalid configuration: {detail}")]
    InvalidConfig { detail: String },
}

/// Failures raised by the rule backend while firing rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    #[error("rule \"{rule}\" failed: {detail}")]
    RuleFailed { rule: String, detail: String },

    #[error("rule \"{rule}\" requires global \"{global}\", which is not bound")]
    MissingGlobal { rule: String, global: String },

    /// The agenda did not reach a fixed point within the configured budget.
    #[error("activation limit of {limit} reached before the agenda emptied")]
    ActivationLimit { limit: usize },

    #[error("no live fact with handle {0}")]
    UnknownHandle(FactHandle),

    #[error("unknown query \"{0}\"")]
    UnknownQuery(String),
}

/// Failures surfaced by the stateful session harness.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// A previous evaluation failed; the session must be restarted with
    /// `start_session` before it can be used again.
    #[error("session is dirty after a failed evaluation; call start_session() before reuse")]
    SessionDirty,

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Infrastructure failures at the validator boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    #[error("validator configuration failed: {0}")]
    Config(#[from] ConfigError),

    #[error("rule evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    /// A query row did not carry the binding the validator reads.
    #[error("query \"{query}\" returned a row without binding \"{binding}\"")]
    MissingBinding { query: String, binding: String },
}
