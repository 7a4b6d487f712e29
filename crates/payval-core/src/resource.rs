//! Rule resource descriptors and loading.
//!
//! A [`ResourceDescriptor`] names where a rule document lives: embedded in
//! the library (`CLASSPATH`), on disk (`FILE`) or behind HTTP (`URL`,
//! optionally with basic-auth credentials). [`ResourceLoader`] turns
//! descriptors into [`LoadedResource`]s ready for a
//! [`crate::backend::RuleBackend`] to compile.
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::ConfigError;

/// Rule documents compiled into the library.
const EMBEDDED: &[(&str, &str)] = &[
    (
        "rules/payments/validation/validation.json",
        include_str!("../rules/payments/validation/validation.json"),
    ),
    (
        "rules/payments/validation/iban.json",
        include_str!("../rules/payments/validation/iban.json"),
    ),
    (
        "rules/payments/validation/bic.json",
        include_str!("../rules/payments/validation/bic.json"),
    ),
    (
        "rules/payments/validation/payment.json",
        include_str!("../rules/payments/validation/payment.json"),
    ),
];

/// Where a resource is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationKind {
    Classpath,
    File,
    Url,
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classpath => f.write_str("classpath"),
            Self::File => f.write_str("file"),
            Self::Url => f.write_str("url"),
        }
    }
}

/// How a resource's contents are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    /// A single rule package.
    #[default]
    RuleSource,
    /// A bundle of packages.
    CompiledPackage,
}

/// The location of one rule resource.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub location_kind: LocationKind,
    pub path: String,
    #[serde(default)]
    pub resource_kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ResourceDescriptor {
    pub fn new(location_kind: LocationKind, path: impl Into<String>) -> Self {
        Self {
            location_kind,
            path: path.into(),
            resource_kind: ResourceKind::RuleSource,
            username: None,
            password: None,
        }
    }

    pub fn classpath(path: impl Into<String>) -> Self {
        Self::new(LocationKind::Classpath, path)
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self::new(LocationKind::File, path)
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::new(LocationKind::Url, url)
    }

    /// Marks the resource as a bundle of packages.
    #[must_use]
    pub fn compiled(mut self) -> Self {
        self.resource_kind = ResourceKind::CompiledPackage;
        self
    }

    /// Attaches HTTP basic-auth credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.location_kind, self.path)
    }
}

impl fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("location_kind", &self.location_kind)
            .field("path", &self.path)
            .field("resource_kind", &self.resource_kind)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// The contents of a resource plus where they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedResource {
    pub descriptor: ResourceDescriptor,
    pub contents: String,
}

/// Resolves [`ResourceDescriptor`]s to their contents.
#[derive(Debug, Clone)]
pub struct ResourceLoader {
    registered: BTreeMap<String, String>,
    http_timeout: Duration,
}

impl Default for ResourceLoader {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl ResourceLoader {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            registered: BTreeMap::new(),
            http_timeout: config.http_timeout(),
        }
    }

    /// Makes `contents` resolvable as a `CLASSPATH` resource at `path`.
    ///
    /// Registered entries shadow embedded ones.
    pub fn register(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.registered.insert(path.into(), contents.into());
    }

    /// Paths of all resources resolvable on the classpath.
    pub fn classpath_entries(&self) -> Vec<&str> {
        let mut entries: Vec<&str> = EMBEDDED.iter().map(|(p, _)| *p).collect();
        entries.extend(self.registered.keys().map(String::as_str));
        entries.sort_unstable();
        entries.dedup();
        entries
    }

    pub fn load(&self, descriptor: &ResourceDescriptor) -> Result<LoadedResource, ConfigError> {
        let contents = match descriptor.location_kind {
            LocationKind::Classpath => self.from_classpath(descriptor)?,
            LocationKind::File => std::fs::read_to_string(&descriptor.path)
                .map_err(|e| load_error(descriptor, e.to_string()))?,
            LocationKind::Url => self.fetch(descriptor)?,
        };
        tracing::debug!(resource = %descriptor, bytes = contents.len(), "loaded rule resource");
        Ok(LoadedResource {
            descriptor: descriptor.clone(),
            contents,
        })
    }

    pub fn load_all(
        &self,
        descriptors: &[ResourceDescriptor],
    ) -> Result<Vec<LoadedResource>, ConfigError> {
        descriptors.iter().map(|d| self.load(d)).collect()
    }

    fn from_classpath(&self, descriptor: &ResourceDescriptor) -> Result<String, ConfigError> {
        let path = descriptor.path.trim_start_matches('/');
        if let Some(contents) = self.registered.get(path) {
            return Ok(contents.clone());
        }
        EMBEDDED
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, contents)| (*contents).to_owned())
            .ok_or_else(|| load_error(descriptor, "no such classpath resource"))
    }

    #[cfg(feature = "http")]
    fn fetch(&self, descriptor: &ResourceDescriptor) -> Result<String, ConfigError> {
        use base64::Engine as _;

        let agent = ureq::AgentBuilder::new()
            .timeout(self.http_timeout)
            .build();
        let mut request = agent.get(&descriptor.path);
        if let Some(username) = descriptor.username.as_deref() {
            let password = descriptor.password.as_deref().unwrap_or_default();
            let token = base64::engine::general_purpose::STANDARD
                .encode(format!("{username}:{password}"));
            request = request.set("authorization", &format!("Basic {token}"));
        }
        match request.call() {
            Ok(response) => response
                .into_string()
                .map_err(|e| load_error(descriptor, format!("read failed: {e}"))),
            Err(ureq::Error::Status(code, _)) => {
                Err(load_error(descriptor, format!("http status {code}")))
            }
            Err(ureq::Error::Transport(err)) => {
                Err(load_error(descriptor, format!("transport error: {err}")))
            }
        }
    }

    #[cfg(not(feature = "http"))]
    fn fetch(&self, descriptor: &ResourceDescriptor) -> Result<String, ConfigError> {
        let _ = self.http_timeout;
        Err(load_error(
            descriptor,
            "URL resources require the `http` feature",
        ))
    }
}

fn load_error(descriptor: &ResourceDescriptor, detail: impl Into<String>) -> ConfigError {
    ConfigError::ResourceLoad {
        resource: descriptor.to_string(),
        detail: detail.into(),
    }
}
