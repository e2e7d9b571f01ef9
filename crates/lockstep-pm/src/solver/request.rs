use indexmap::IndexMap;
use lockstep_semver::{Stability, VersionParser};
use serde_json::Value;

use crate::package::Package;

/// A root requirement from the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRequire {
    pub name: String,
    pub constraint: String,
    pub dev: bool,
}

/// A root-level alias such as `"vendor/pkg": "dev-main as 1.0.0"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootAlias {
    /// Lowercased package name
    pub package: String,
    /// Normalized version being aliased
    pub version: String,
    /// Alias as written
    pub alias: String,
    pub alias_normalized: String,
}

/// A resolution request: what the root wants and what is already in place.
#[derive(Debug, Clone)]
pub struct Request {
    /// Root requirements keyed by lowercase name, in declaration order
    pub requires: IndexMap<String, RootRequire>,

    /// Packages that must stay at exactly this version
    pub fixed_packages: Vec<Package>,

    /// Previously locked packages that may move, but are preferred as-is
    pub updatable_packages: Vec<Package>,

    /// Prior state, only used to compute the transaction
    pub locked_packages: Vec<Package>,

    /// Platform facts (name -> version)
    pub platform: IndexMap<String, String>,

    /// `config.platform` as written in the manifest, recorded in the lock
    pub platform_overrides: IndexMap<String, Value>,

    pub minimum_stability: Stability,

    /// Explicit per-package stability flags
    pub stability_flags: IndexMap<String, Stability>,

    pub prefer_stable: bool,
    pub prefer_lowest: bool,
    pub ignore_platform_reqs: bool,

    pub root_aliases: Vec<RootAlias>,
}

impl Request {
    pub fn new() -> Self {
        Self {
            requires: IndexMap::new(),
            fixed_packages: Vec::new(),
            updatable_packages: Vec::new(),
            locked_packages: Vec::new(),
            platform: IndexMap::new(),
            platform_overrides: IndexMap::new(),
            minimum_stability: Stability::Stable,
            stability_flags: IndexMap::new(),
            prefer_stable: false,
            prefer_lowest: false,
            ignore_platform_reqs: false,
            root_aliases: Vec::new(),
        }
    }

    /// Require a package
    pub fn require(&mut self, name: impl Into<String>, constraint: impl Into<String>) {
        self.add_require(name.into(), constraint.into(), false);
    }

    /// Require a package for development only
    pub fn require_dev(&mut self, name: impl Into<String>, constraint: impl Into<String>) {
        self.add_require(name.into(), constraint.into(), true);
    }

    fn add_require(&mut self, name: String, constraint: String, dev: bool) {
        let key = name.to_lowercase();
        self.requires.insert(key, RootRequire { name, constraint, dev });
    }

    /// Pin a package to exactly this version
    pub fn fix(&mut self, package: Package) {
        self.fixed_packages.push(package);
    }

    /// Record a previously locked package that may be updated but should be
    /// kept when possible
    pub fn fix_updatable(&mut self, package: Package) {
        self.updatable_packages.push(package);
    }

    /// Record a package as currently installed
    pub fn lock(&mut self, package: Package) {
        self.locked_packages.push(package);
    }

    /// Declare a platform fact
    pub fn platform(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.platform.insert(name.into().to_lowercase(), version.into());
    }

    pub fn all_requires(&self) -> impl Iterator<Item = (&str, &str)> {
        self.requires
            .values()
            .map(|r| (r.name.as_str(), r.constraint.as_str()))
    }

    pub fn is_fixed(&self, name: &str) -> bool {
        self.fixed_packages
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// The installed state before this resolution: every fixed, updatable
    /// and locked package, first occurrence per name.
    pub fn prior_packages(&self) -> Vec<Package> {
        let mut seen = std::collections::HashSet::new();
        self.locked_packages
            .iter()
            .chain(&self.fixed_packages)
            .chain(&self.updatable_packages)
            .filter(|p| !p.is_platform() && seen.insert(p.name.to_lowercase()))
            .cloned()
            .collect()
    }

    /// Stability flags in force for this request.
    ///
    /// An explicit `@flag` on a root constraint always applies; a stability
    /// inferred from the constraint's versions only applies when it is less
    /// stable than the minimum stability. Explicit entries from
    /// `stability_flags` are merged in, least stable wins.
    pub fn effective_stability_flags(&self) -> IndexMap<String, Stability> {
        let mut flags: IndexMap<String, Stability> = IndexMap::new();

        let mut merge = |name: &str, stability: Stability| {
            let entry = flags.entry(name.to_lowercase()).or_insert(stability);
            *entry = (*entry).max(stability);
        };

        for (name, stability) in &self.stability_flags {
            merge(name, *stability);
        }

        for require in self.requires.values() {
            let Some(stability) = VersionParser::constraint_stability(&require.constraint) else {
                continue;
            };
            let explicit = require.constraint.contains('@');
            if explicit || stability > self.minimum_stability {
                merge(&require.name, stability);
            }
        }

        flags
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}
