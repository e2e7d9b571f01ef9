use indexmap::IndexMap;
use lockstep_semver::{Stability, VersionParser};
use serde_json::Value;

use crate::util::is_platform_package;

/// A single version of a package.
///
/// `version` holds the normalized form used for comparison; the string the
/// package was published with is kept in `pretty_version` when it differs.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub pretty_version: Option<String>,
    pub require: IndexMap<String, String>,
    pub require_dev: IndexMap<String, String>,
    pub conflict: IndexMap<String, String>,
    pub provide: IndexMap<String, String>,
    pub replace: IndexMap<String, String>,
    pub package_type: Option<String>,
    /// Opaque, passed through to the lock file unchanged
    pub transport_options: IndexMap<String, Value>,
    /// Every other field of the raw record, in original order
    pub metadata: IndexMap<String, Value>,
}

impl Package {
    /// Create a package, normalizing `version`. Versions that cannot be
    /// normalized are kept verbatim.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        let raw = version.into();
        let normalized = VersionParser::new()
            .normalize(&raw)
            .unwrap_or_else(|_| raw.clone());
        let pretty_version = (normalized != raw).then_some(raw);

        Self {
            name: name.into(),
            version: normalized,
            pretty_version,
            require: IndexMap::new(),
            require_dev: IndexMap::new(),
            conflict: IndexMap::new(),
            provide: IndexMap::new(),
            replace: IndexMap::new(),
            package_type: None,
            transport_options: IndexMap::new(),
            metadata: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pretty_version(&self) -> &str {
        self.pretty_version.as_deref().unwrap_or(&self.version)
    }

    pub fn stability(&self) -> Stability {
        VersionParser::parse_stability(&self.version)
    }

    /// Lowercased names this package answers to: its own name followed by
    /// everything it provides or replaces.
    pub fn names(&self) -> Vec<String> {
        let mut names = vec![self.name.to_lowercase()];
        for name in self.provide.keys().chain(self.replace.keys()) {
            let name = name.to_lowercase();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Requirements on platform packages (runtime, extensions, libraries).
    pub fn platform_requirements(&self) -> impl Iterator<Item = (&String, &String)> {
        self.require
            .iter()
            .filter(|(name, _)| is_platform_package(name))
    }

    pub fn is_platform(&self) -> bool {
        is_platform_package(&self.name)
    }

    pub fn pretty_string(&self) -> String {
        format!("{} {}", self.name, self.pretty_version())
    }

    pub fn with_require(mut self, name: impl Into<String>, constraint: impl Into<String>) -> Self {
        self.require.insert(name.into(), constraint.into());
        self
    }
}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.pretty_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_version() {
        let pkg = Package::new("vendor/pkg", "1.2");
        assert_eq!(pkg.version(), "1.2.0.0");
        assert_eq!(pkg.pretty_version(), "1.2");

        let pkg = Package::new("vendor/pkg", "1.2.0.0");
        assert_eq!(pkg.pretty_version, None);
        assert_eq!(pkg.pretty_version(), "1.2.0.0");

        let pkg = Package::new("vendor/pkg", "not a version");
        assert_eq!(pkg.version(), "not a version");
    }

    #[test]
    fn test_stability() {
        assert_eq!(Package::new("a", "1.0.0").stability(), Stability::Stable);
        assert_eq!(Package::new("a", "1.0.0-beta2").stability(), Stability::Beta);
        assert_eq!(Package::new("a", "dev-main").stability(), Stability::Dev);
    }

    #[test]
    fn test_names_include_provides_and_replaces() {
        let mut pkg = Package::new("Vendor/Impl", "1.0.0");
        pkg.provide.insert("psr/log-implementation".to_string(), "1.0".to_string());
        pkg.replace.insert("vendor/old".to_string(), "self.version".to_string());
        pkg.replace.insert("psr/log-implementation".to_string(), "1.0".to_string());

        assert_eq!(
            pkg.names(),
            vec!["vendor/impl", "psr/log-implementation", "vendor/old"]
        );
    }

    #[test]
    fn test_platform_requirements() {
        let pkg = Package::new("vendor/pkg", "1.0.0")
            .with_require("php", ">=8.1")
            .with_require("vendor/other", "^1.0")
            .with_require("ext-json", "*");

        let names: Vec<_> = pkg.platform_requirements().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["php", "ext-json"]);
        assert_eq!(pkg.pretty_string(), "vendor/pkg 1.0.0");
    }
}
