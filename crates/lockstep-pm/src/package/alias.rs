use std::sync::Arc;

use indexmap::IndexMap;
use lockstep_semver::{Stability, VersionParser};

use super::Package;

/// A package presented under another version, e.g. `dev-main as 1.0.0`.
///
/// Links are taken from the aliased package; `self.version` constraints are
/// rewritten to the alias version so they stay meaningful.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasPackage {
    alias_of: Arc<Package>,
    version: String,
    pretty_version: String,
    require: IndexMap<String, String>,
    conflict: IndexMap<String, String>,
    provide: IndexMap<String, String>,
    replace: IndexMap<String, String>,
}

impl AliasPackage {
    pub fn new(alias_of: Arc<Package>, version: String, pretty_version: String) -> Self {
        let require = replace_self_version(&alias_of.require, &pretty_version);
        let conflict = replace_self_version(&alias_of.conflict, &pretty_version);
        let provide = replace_self_version(&alias_of.provide, &pretty_version);
        let replace = replace_self_version(&alias_of.replace, &pretty_version);

        Self {
            alias_of,
            version,
            pretty_version,
            require,
            conflict,
            provide,
            replace,
        }
    }

    pub fn alias_of(&self) -> &Arc<Package> {
        &self.alias_of
    }

    pub fn name(&self) -> &str {
        self.alias_of.name()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pretty_version(&self) -> &str {
        &self.pretty_version
    }

    pub fn require(&self) -> &IndexMap<String, String> {
        &self.require
    }

    pub fn conflict(&self) -> &IndexMap<String, String> {
        &self.conflict
    }

    pub fn provide(&self) -> &IndexMap<String, String> {
        &self.provide
    }

    pub fn replace(&self) -> &IndexMap<String, String> {
        &self.replace
    }

    pub fn stability(&self) -> Stability {
        VersionParser::parse_stability(&self.version)
    }

    pub fn pretty_string(&self) -> String {
        format!("{} {}", self.name(), self.pretty_version)
    }
}

fn replace_self_version(links: &IndexMap<String, String>, version: &str) -> IndexMap<String, String> {
    links
        .iter()
        .map(|(name, constraint)| {
            let constraint = if constraint.trim() == "self.version" {
                version.to_string()
            } else {
                constraint.clone()
            };
            (name.clone(), constraint)
        })
        .collect()
}
