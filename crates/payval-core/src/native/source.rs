//! JSON rule document model.
//!
//! A `RULE_SOURCE` resource holds one package document; a
//! `COMPILED_PACKAGE` resource holds a bundle `{ "packages": [...] }`.
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::resource::{LoadedResource, ResourceKind};

/// One rule package as written in a resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSource {
    pub package: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleSource>,
    #[serde(default)]
    pub tables: Vec<TableSource>,
    #[serde(default)]
    pub queries: Vec<QuerySource>,
}

/// A single rule instantiated from a named template.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSource {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub salience: i32,
    #[serde(default)]
    pub params: Map<String, Value>,
}

/// A decision table: one template applied once per row.
///
/// Row parameters override the table's shared parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSource {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub salience: i32,
    #[serde(default)]
    pub params: Map<String, Value>,
    pub rows: Vec<RowSource>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RowSource {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl TableSource {
    /// Expands the table into `(rule name, label, params)` per row.
    ///
    /// Generated names follow `"Row <n> <label>"` with `n` starting at 1.
    pub fn expand(&self) -> Vec<(String, String, Map<String, Value>)> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let label = row.name.clone().unwrap_or_else(|| self.name.clone());
                let mut params = self.params.clone();
                params.extend(row.params.clone());
                (format!("Row {} {label}", i + 1), label, params)
            })
            .collect()
    }
}

/// What a query selects from working memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySelect {
    /// Every annotation on every validation request.
    Annotations,
    /// REJECT annotations only.
    Rejected,
    /// One row per validation request.
    Requests,
    /// One row per fact, optionally restricted by `factType`.
    Facts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct QuerySource {
    pub name: String,
    pub select: QuerySelect,
    #[serde(default)]
    pub fact_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BundleSource {
    packages: Vec<PackageSource>,
}

/// Parses a loaded resource into its package documents.
pub fn parse(resource: &LoadedResource) -> Result<Vec<PackageSource>, ConfigError> {
    let parsed = match resource.descriptor.resource_kind {
        ResourceKind::RuleSource => {
            serde_json::from_str::<PackageSource>(&resource.contents).map(|p| vec![p])
        }
        ResourceKind::CompiledPackage => {
            serde_json::from_str::<BundleSource>(&resource.contents).map(|b| b.packages)
        }
    };
    parsed.map_err(|e| ConfigError::Compile {
        package: resource.descriptor.to_string(),
        detail: e.to_string(),
    })
}
