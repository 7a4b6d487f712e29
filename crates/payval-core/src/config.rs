//! Engine and validator configuration.
//!
//! Every field has a serde default, so an empty JSON object is a complete
//! configuration.
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::resource::ResourceDescriptor;

/// Tuning for rule sessions and resource loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on rule firings per `fire_all`; exceeding it aborts the
    /// evaluation with [`crate::error::EvaluationError::ActivationLimit`].
    #[serde(default = "default_max_activations")]
    pub max_activations: usize,

    /// Timeout for fetching URL rule resources.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
}

fn default_max_activations() -> usize {
    10_000
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_activations: default_max_activations(),
            http_timeout_ms: default_http_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// Configuration for the rule-based validators.
///
/// A `None` resource list means "use the embedded rule content".
///
/// ```
/// use payval_core::config::ValidatorConfig;
///
/// let config = ValidatorConfig::from_json(r#"{ "engine": { "max_activations": 50 } }"#).unwrap();
/// assert_eq!(config.engine.max_activations, 50);
/// assert_eq!(config.engine.http_timeout_ms, 10_000);
/// assert!(config.iban_resources.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub iban_resources: Option<Vec<ResourceDescriptor>>,
    #[serde(default)]
    pub bic_resources: Option<Vec<ResourceDescriptor>>,
    #[serde(default)]
    pub payment_resources: Option<Vec<ResourceDescriptor>>,
}

impl ValidatorConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidConfig {
            detail: e.to_string(),
        })
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidConfig {
            detail: format!("{}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use crate::resource::{LocationKind, ResourceKind};
    use std::io::Write as _;

    #[test]
    fn empty_object_uses_defaults() {
        let config = ValidatorConfig::from_json("{}").expect("parse");
        assert_eq!(config, ValidatorConfig::default());
        assert_eq!(config.engine.max_activations, 10_000);
        assert_eq!(config.engine.http_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn resource_overrides_parse() {
        let config = ValidatorConfig::from_json(
            r#"{ "iban_resources": [
                   { "locationKind": "FILE", "path": "/etc/payval/iban.json",
                     "resourceKind": "RULE_SOURCE" }
                 ] }"#,
        )
        .expect("parse");
        let resources = config.iban_resources.expect("iban resources");
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].location_kind, LocationKind::File);
        assert_eq!(resources[0].resource_kind, ResourceKind::RuleSource);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = ValidatorConfig::from_json("{ nope").expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidConfig { .. }));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(br#"{ "engine": { "http_timeout_ms": 250 } }"#)
            .expect("write");
        let config = ValidatorConfig::load(file.path()).expect("load");
        assert_eq!(config.engine.http_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ValidatorConfig::load(Path::new("/nonexistent/payval.json"))
            .expect_err("should fail");
        assert!(err.to_string().contains("/nonexistent/payval.json"));
    }
}
