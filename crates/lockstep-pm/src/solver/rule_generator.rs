use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use lockstep_semver::VersionParser;

use super::pool::{PackageId, Pool, PoolEntry};
use super::request::Request;
use super::rule::{Rule, RuleType};
use super::rule_set::RuleSet;
use crate::error::InvariantViolation;
use crate::util::is_platform_package;
use crate::Result;

/// Generates SAT rules from a dependency graph.
///
/// This converts the dependency relationships into SAT clauses:
/// - Fixed packages and platform facts: must be installed
/// - Root requirements: at least one matching package must be installed
/// - Package requirements: if A is installed, then B|C|D must be installed
/// - Conflicts: A and B cannot both be installed
/// - Same-name: only one package per name (or replaced name)
/// - Aliases: an alias and its base package are installed together
///
/// Only packages reachable from the request are visited, breadth first, so
/// the rule order is fully determined by the pool and the request.
pub struct RuleGenerator<'a> {
    pool: &'a Pool,
    rules: RuleSet,
    queue: VecDeque<PackageId>,
    /// Packages processed so far, in processing order
    added_packages: Vec<PackageId>,
    added_set: HashSet<PackageId>,
    /// Lowercase name (own or replaced) -> packages carrying it
    added_names: IndexMap<String, Vec<PackageId>>,
    ignore_platform_reqs: bool,
}

impl<'a> RuleGenerator<'a> {
    pub fn new(pool: &'a Pool) -> Self {
        Self {
            pool,
            rules: RuleSet::new(),
            queue: VecDeque::new(),
            added_packages: Vec::new(),
            added_set: HashSet::new(),
            added_names: IndexMap::new(),
            ignore_platform_reqs: false,
        }
    }

    /// Generate all rules for a request
    pub fn generate(mut self, request: &Request) -> Result<RuleSet> {
        self.ignore_platform_reqs = request.ignore_platform_reqs;

        self.add_fixed_rules(request)?;
        self.add_platform_rules(request);
        self.add_root_require_rules(request);

        while let Some(id) = self.queue.pop_front() {
            self.add_package_rules(id);
        }

        self.add_conflict_rules();
        self.add_same_name_rules();

        let stats = self.rules.stats();
        log::debug!(
            "Generated {} rules for {} packages ({} requires, {} conflicts, {} same-name)",
            stats.total,
            self.added_packages.len(),
            stats.package_requires,
            stats.package_conflict,
            stats.same_name
        );

        Ok(self.rules)
    }

    /// Fixed packages must be in the pool at exactly their version
    fn add_fixed_rules(&mut self, request: &Request) -> Result<()> {
        for package in &request.fixed_packages {
            if package.name.is_empty() {
                return Err(InvariantViolation::PackageWithoutName.into());
            }
            if package.version.is_empty() {
                return Err(InvariantViolation::PackageWithoutVersion {
                    name: package.name.clone(),
                }
                .into());
            }

            let Some(id) = self.pool.id_of(&package.name, &package.version) else {
                return Err(InvariantViolation::FixedPackageMissing {
                    name: package.name.clone(),
                    version: package.pretty_version().to_string(),
                }
                .into());
            };

            self.rules.add(Rule::fixed(id).with_source(id).with_target(&package.name));
            self.queue.push_back(id);
        }
        Ok(())
    }

    /// Platform facts behave like fixed packages
    fn add_platform_rules(&mut self, request: &Request) {
        let parser = VersionParser::new();
        for (name, version) in &request.platform {
            let normalized = parser.normalize(version).unwrap_or_else(|_| version.clone());
            match self.pool.id_of(name, &normalized) {
                Some(id) => {
                    self.rules.add(Rule::fixed(id).with_source(id).with_target(name));
                    self.queue.push_back(id);
                }
                None => log::debug!("Platform package {} {} is not in the pool", name, version),
            }
        }
    }

    fn add_root_require_rules(&mut self, request: &Request) {
        for (name, constraint) in request.all_requires() {
            if self.ignore_platform_reqs && is_platform_package(name) {
                continue;
            }

            let providers = self.pool.what_provides(name, Some(constraint));
            self.queue.extend(providers.iter().copied());

            // An empty rule is kept: it makes the request unsatisfiable and
            // shows up in the problem report
            let rule = Rule::root_require(providers)
                .with_target(name)
                .with_constraint(constraint);
            self.rules.add(rule);
        }
    }

    fn add_package_rules(&mut self, id: PackageId) {
        if !self.added_set.insert(id) {
            return;
        }
        self.added_packages.push(id);

        let pool = self.pool;
        let Some(entry) = pool.entry(id) else {
            return;
        };

        if let PoolEntry::Alias(alias) = entry {
            if let Some(base) = pool.get_alias_base(id) {
                self.rules.add(Rule::new(vec![-id, base], RuleType::PackageAlias).with_source(id));
                self.rules.add(Rule::new(vec![-base, id], RuleType::PackageInverseAlias).with_source(base));
                self.queue.push_back(base);
            }
            let has_self_version = alias
                .alias_of()
                .require
                .values()
                .any(|c| c.trim() == "self.version");
            if !has_self_version {
                return;
            }
        } else {
            // Aliases are exempt from same-name rules
            for name in names_of(entry) {
                self.added_names.entry(name).or_default().push(id);
            }
        }

        for (dep_name, constraint) in entry.require() {
            if is_platform_package(dep_name) {
                if self.ignore_platform_reqs {
                    continue;
                }
                // Library facts are rarely known; only enforce them when present
                if dep_name.to_lowercase().starts_with("lib-") && !pool.exists(dep_name) {
                    continue;
                }
            }

            let constraint = resolve_self_version(constraint, entry);
            let providers = pool.what_provides(dep_name, Some(&constraint));

            if providers.contains(&id) {
                continue;
            }

            self.queue.extend(providers.iter().copied());
            let rule = Rule::requires(id, providers)
                .with_source(id)
                .with_target(dep_name)
                .with_constraint(constraint);
            self.rules.add(rule);
        }
    }

    /// Conflicts are checked against every package that was visited under
    /// the conflicting name, once all packages are known
    fn add_conflict_rules(&mut self) {
        let pool = self.pool;
        for &id in &self.added_packages {
            let Some(entry) = pool.entry(id) else {
                continue;
            };
            if entry.is_alias() {
                continue;
            }

            for (conflict_name, constraint) in entry.conflict() {
                let Some(candidates) = self.added_names.get(&conflict_name.to_lowercase()) else {
                    continue;
                };
                let constraint = resolve_self_version(constraint, entry);

                for &other in candidates {
                    if other == id || self.is_alias_pair(id, other) {
                        continue;
                    }
                    let Some(other_entry) = pool.entry(other) else {
                        continue;
                    };
                    if !pool.constraint_matches(&constraint, other_entry.version()) {
                        continue;
                    }
                    let rule = Rule::conflict(vec![id, other])
                        .with_source(id)
                        .with_target(conflict_name)
                        .with_constraint(constraint.clone());
                    self.rules.add(rule);
                }
            }
        }
    }

    fn add_same_name_rules(&mut self) {
        for (name, ids) in &self.added_names {
            if ids.len() < 2 {
                continue;
            }
            self.rules.add(Rule::same_name(ids.clone()).with_target(name));
        }
    }

    fn is_alias_pair(&self, a: PackageId, b: PackageId) -> bool {
        self.pool.get_alias_base(a) == Some(b) || self.pool.get_alias_base(b) == Some(a)
    }
}

/// Lowercased own name plus replaced names
fn names_of(entry: &PoolEntry) -> Vec<String> {
    let mut names = vec![entry.name().to_lowercase()];
    for replaced in entry.replace().keys() {
        let replaced = replaced.to_lowercase();
        if !names.contains(&replaced) {
            names.push(replaced);
        }
    }
    names
}

fn resolve_self_version(constraint: &str, entry: &PoolEntry) -> String {
    if constraint.trim() == "self.version" {
        entry.pretty_version().to_string()
    } else {
        constraint.to_string()
    }
}
