use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use super::Repository;
use crate::package::Package;
use crate::solver::Request;
use crate::util::is_platform_package;
use crate::{Error, Result, PLUGIN_API_VERSION, RUNTIME_API_VERSION};

const NAME: &str = "platform";

/// Platform facts (runtime, extensions, libraries) exposed as packages.
///
/// Detecting the facts is up to the caller; this only holds them and applies
/// `config.platform` overrides on top.
#[derive(Debug, Clone)]
pub struct PlatformRepository {
    packages: IndexMap<String, Package>,
}

impl Default for PlatformRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformRepository {
    /// Repository holding only the package manager's own API packages.
    pub fn new() -> Self {
        let mut repo = Self {
            packages: IndexMap::new(),
        };
        repo.insert("composer-plugin-api", PLUGIN_API_VERSION);
        repo.insert("composer-runtime-api", RUNTIME_API_VERSION);
        repo
    }

    /// Build from detected facts, then apply overrides. An override maps a
    /// name to a version string, or to `false` to hide the package.
    pub fn with_overrides(facts: &IndexMap<String, String>, overrides: &IndexMap<String, Value>) -> Result<Self> {
        let mut repo = Self::new();
        for (name, version) in facts {
            repo.add(name, version)?;
        }

        for (name, value) in overrides {
            match value {
                Value::String(version) => {
                    log::debug!("Overriding platform package {} with {}", name, version);
                    repo.add(name, version)?;
                }
                Value::Bool(false) => {
                    log::debug!("Hiding platform package {}", name);
                    repo.packages.shift_remove(&name.to_lowercase());
                }
                other => {
                    return Err(Error::data_source(
                        NAME,
                        format!("invalid override for {}: expected a version or false, got {}", name, other),
                    ))
                }
            }
        }

        Ok(repo)
    }

    /// Add or replace a fact.
    pub fn add(&mut self, name: &str, version: &str) -> Result<()> {
        if !is_platform_package(name) {
            return Err(Error::data_source(NAME, format!("{} is not a platform package", name)));
        }
        self.insert(name, version);
        Ok(())
    }

    fn insert(&mut self, name: &str, version: &str) {
        self.packages.insert(name.to_lowercase(), Package::new(name.to_lowercase(), version));
    }

    pub fn get(&self, name: &str) -> Option<&Package> {
        self.packages.get(&name.to_lowercase())
    }

    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    /// Name to version as the facts were given
    pub fn facts(&self) -> IndexMap<String, String> {
        self.packages
            .iter()
            .map(|(name, package)| (name.clone(), package.pretty_version().to_string()))
            .collect()
    }

    /// Record every fact on the request.
    pub fn apply_to(&self, request: &mut Request) {
        for (name, version) in self.facts() {
            request.platform(name, version);
        }
    }
}

#[async_trait]
impl Repository for PlatformRepository {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_versions(&self, name: &str) -> Result<Vec<Package>> {
        Ok(self.get(name).cloned().into_iter().collect())
    }
}
