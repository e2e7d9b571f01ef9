use std::cmp::Ordering;
use std::collections::HashMap;

use indexmap::IndexMap;
use lockstep_semver::{compare_versions, Stability};

use super::pool::{PackageId, Pool, PoolEntry};
use super::request::Request;
use crate::package::Package;

/// Policy for selecting between candidate packages.
///
/// When multiple packages can satisfy a requirement, the policy
/// determines which one to try first. The order is total: ties that
/// survive every preference fall back to pool insertion order.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Prefer stable versions over dev
    pub prefer_stable: bool,
    /// Prefer lowest versions
    pub prefer_lowest: bool,
    /// Lowercase name -> version that should be kept if possible
    preferred_versions: HashMap<String, String>,
}

impl Policy {
    pub fn new() -> Self {
        Self {
            prefer_stable: true,
            prefer_lowest: false,
            preferred_versions: HashMap::new(),
        }
    }

    /// Policy matching a request's preferences. Updatable locked packages
    /// become preferred versions.
    pub fn from_request(request: &Request) -> Self {
        let mut policy = Self::new()
            .prefer_stable(request.prefer_stable)
            .prefer_lowest(request.prefer_lowest);
        for package in &request.updatable_packages {
            policy = policy.prefer_version(&package.name, &package.version);
        }
        policy
    }

    pub fn prefer_stable(mut self, prefer: bool) -> Self {
        self.prefer_stable = prefer;
        self
    }

    pub fn prefer_lowest(mut self, prefer: bool) -> Self {
        self.prefer_lowest = prefer;
        self
    }

    /// Try `version` of `name` before any other candidate
    pub fn prefer_version(mut self, name: &str, version: &str) -> Self {
        self.preferred_versions
            .insert(name.to_lowercase(), version.to_string());
        self
    }

    /// Candidates sorted by preference, best first.
    ///
    /// `required_name` is the name the candidates were looked up by, if any;
    /// packages literally carrying it win over providers and replacers.
    pub fn select_preferred(&self, pool: &Pool, candidates: &[PackageId], required_name: Option<&str>) -> Vec<PackageId> {
        let mut sorted: Vec<_> = candidates.to_vec();
        sorted.sort_by(|&a, &b| self.compare(pool, a, b, required_name));
        sorted.dedup();
        sorted
    }

    /// Select a single best package from candidates
    pub fn select_best(&self, pool: &Pool, candidates: &[PackageId], required_name: Option<&str>) -> Option<PackageId> {
        self.select_preferred(pool, candidates, required_name)
            .into_iter()
            .next()
    }

    fn compare(&self, pool: &Pool, a: PackageId, b: PackageId, required_name: Option<&str>) -> Ordering {
        let (Some(ea), Some(eb)) = (pool.entry(a), pool.entry(b)) else {
            return a.cmp(&b);
        };

        // Preferred (locked) versions first
        let preferred = self.is_preferred(eb).cmp(&self.is_preferred(ea));
        if preferred != Ordering::Equal {
            return preferred;
        }

        let same_name = ea.name().eq_ignore_ascii_case(eb.name());
        let ordering = if same_name {
            self.compare_same_name(ea, eb)
        } else {
            compare_different_names(ea, eb, required_name)
        };

        ordering
            .then_with(|| pool.priority(a).cmp(&pool.priority(b)))
            .then_with(|| a.cmp(&b))
    }

    fn compare_same_name(&self, a: &PoolEntry, b: &PoolEntry) -> Ordering {
        // An alias is tried before the package it aliases
        if a.base_package().version == b.base_package().version {
            let alias = b.is_alias().cmp(&a.is_alias());
            if alias != Ordering::Equal {
                return alias;
            }
        }

        if self.prefer_stable {
            let stability = a.stability().cmp(&b.stability());
            if stability != Ordering::Equal {
                return stability;
            }
        }

        let version = compare_versions(a.version(), b.version());
        if self.prefer_lowest {
            version
        } else {
            version.reverse()
        }
    }

    fn is_preferred(&self, entry: &PoolEntry) -> bool {
        self.preferred_versions
            .get(&entry.name().to_lowercase())
            .map(|v| v == entry.version())
            .unwrap_or(false)
    }

    /// Whether a package passes the stability floor.
    ///
    /// A stability flag on the package name or any name it replaces decides
    /// on its own; otherwise the minimum stability applies.
    pub fn is_stability_acceptable(
        package: &Package,
        minimum_stability: Stability,
        stability_flags: &IndexMap<String, Stability>,
    ) -> bool {
        let stability = package.stability();
        let names = std::iter::once(&package.name).chain(package.replace.keys());
        for name in names {
            if let Some(flag) = stability_flags.get(&name.to_lowercase()) {
                return stability.is_at_least_as_stable_as(*flag);
            }
        }
        stability.is_at_least_as_stable_as(minimum_stability)
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordering between candidates of different names: the package literally
/// named by the requirement first, then a package that replaces the other,
/// then same-vendor packages, then by name.
fn compare_different_names(a: &PoolEntry, b: &PoolEntry, required_name: Option<&str>) -> Ordering {
    if let Some(required) = required_name {
        let a_named = a.name().eq_ignore_ascii_case(required);
        let b_named = b.name().eq_ignore_ascii_case(required);
        if a_named != b_named {
            return b_named.cmp(&a_named);
        }

        let required_vendor = vendor(required);
        let a_vendor = vendor(a.name()) == required_vendor;
        let b_vendor = vendor(b.name()) == required_vendor;
        if a_vendor != b_vendor {
            return b_vendor.cmp(&a_vendor);
        }
    }

    if a.replaces(b.name()) && !b.replaces(a.name()) {
        return Ordering::Less;
    }
    if b.replaces(a.name()) && !a.replaces(b.name()) {
        return Ordering::Greater;
    }

    a.name().to_lowercase().cmp(&b.name().to_lowercase())
}

fn vendor(name: &str) -> String {
    name.split('/').next().unwrap_or(name).to_lowercase()
}
