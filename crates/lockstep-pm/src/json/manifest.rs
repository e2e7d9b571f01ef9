use indexmap::IndexMap;
use lazy_static::lazy_static;
use lockstep_semver::{Stability, VersionParser};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::solver::{Request, RootAlias};
use crate::Result;

lazy_static! {
    static ref ROOT_ALIAS: Regex = Regex::new(r"^([^,\s#]+)(?:#[^ ]+)? +as +([^,\s]+)$").unwrap();
    static ref CONSTRAINT_PARTS: Regex = Regex::new(r"\s*\|\|?\s*|\s*,\s*").unwrap();
}

/// The subset of a project manifest that drives resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RootManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub require: IndexMap<String, String>,

    #[serde(default)]
    pub require_dev: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_stability: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_stable: Option<bool>,

    #[serde(default)]
    pub config: IndexMap<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repositories: Option<Value>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl RootManifest {
    pub fn from_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// `config.platform`: version strings, or `false` to hide a package
    pub fn platform_overrides(&self) -> IndexMap<String, Value> {
        match self.config.get("platform") {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            _ => IndexMap::new(),
        }
    }

    pub fn minimum_stability(&self) -> Result<Stability> {
        match &self.minimum_stability {
            Some(stability) => Ok(VersionParser::normalize_stability(stability)?),
            None => Ok(Stability::Stable),
        }
    }

    pub fn prefer_lowest(&self) -> bool {
        matches!(self.config.get("prefer-lowest"), Some(Value::Bool(true)))
    }

    /// Root aliases declared inline, e.g. `"dev-main as 1.0.x-dev"`.
    pub fn root_aliases(&self) -> Result<Vec<RootAlias>> {
        let parser = VersionParser::new();
        let mut aliases = Vec::new();

        for (name, constraint) in self.require.iter().chain(&self.require_dev) {
            for part in CONSTRAINT_PARTS.split(constraint.trim()) {
                let Some(caps) = ROOT_ALIAS.captures(part) else {
                    continue;
                };
                aliases.push(RootAlias {
                    package: name.to_lowercase(),
                    version: parser.normalize(&caps[1])?,
                    alias: caps[2].to_string(),
                    alias_normalized: parser.normalize(&caps[2])?,
                });
            }
        }

        Ok(aliases)
    }

    /// Build the resolution request described by this manifest.
    ///
    /// Lock state and platform facts are added by the caller.
    pub fn to_request(&self) -> Result<Request> {
        let mut request = Request::new();

        for (name, constraint) in &self.require {
            request.require(name, constraint);
        }
        for (name, constraint) in &self.require_dev {
            if !request.requires.contains_key(&name.to_lowercase()) {
                request.require_dev(name, constraint);
            }
        }

        request.minimum_stability = self.minimum_stability()?;
        request.prefer_stable = self.prefer_stable.unwrap_or(false);
        request.prefer_lowest = self.prefer_lowest();
        request.root_aliases = self.root_aliases()?;
        request.platform_overrides = self.platform_overrides();

        Ok(request)
    }
}
