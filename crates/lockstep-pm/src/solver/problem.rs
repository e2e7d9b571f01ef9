use std::fmt;

use super::pool::{FilterReason, FilteredPackage, PackageId, Pool};
use super::rule::{Rule, RuleId, RuleType};
use crate::util::is_platform_package;

/// A problem encountered during dependency resolution.
///
/// Problems explain why a solution cannot be found. Rule descriptions are
/// rendered against the pool when the rule is added, so a problem can be
/// reported after the pool is gone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Problem {
    /// Rules involved in this problem
    pub rules: Vec<ProblemRule>,
}

/// A rule that contributes to a problem
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemRule {
    pub rule_id: RuleId,
    pub rule_type: RuleType,
    /// Source package as `name version`
    pub source_name: Option<String>,
    /// Target package name
    pub target: Option<String>,
    pub constraint: Option<String>,
    /// Human-readable explanation
    pub description: String,
}

impl Problem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule to this problem. A rule is only recorded once.
    pub fn add_rule(&mut self, rule: &Rule, pool: &Pool) {
        if self.rules.iter().any(|r| r.rule_id == rule.id()) {
            return;
        }

        self.rules.push(ProblemRule {
            rule_id: rule.id(),
            rule_type: rule.rule_type(),
            source_name: rule.source().map(|id| source_name(pool, id)),
            target: rule.target().map(String::from),
            constraint: rule.constraint().map(String::from),
            description: describe_rule(pool, rule),
        });
    }

    /// Put root requirements and fixed packages first, each group in
    /// request order
    pub(crate) fn sort(&mut self) {
        self.rules
            .sort_by_key(|r| (!r.rule_type.is_root_level(), r.rule_id));
    }

    /// Rules that come straight from the request, in request order
    pub fn root_rules(&self) -> impl Iterator<Item = &ProblemRule> {
        self.rules.iter().filter(|r| r.rule_type.is_root_level())
    }

    /// Generate a human-readable description of this problem
    pub fn describe(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for rule in &self.rules {
            if rule.description.is_empty() {
                continue;
            }
            let line = format!("  - {}", rule.description);
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        lines.join("\n")
    }
}

fn source_name(pool: &Pool, id: PackageId) -> String {
    pool.entry(id)
        .map(|e| e.pretty_string())
        .unwrap_or_else(|| format!("#{}", id))
}

/// Up to five versions available under `name`
fn available_versions(pool: &Pool, name: &str) -> Vec<String> {
    pool.packages_by_name(name)
        .into_iter()
        .filter_map(|id| pool.entry(id))
        .map(|e| e.pretty_version().to_string())
        .take(5)
        .collect()
}

/// Explain why nothing satisfies `name constraint`
fn describe_missing(pool: &Pool, name: &str, constraint: &str) -> String {
    if let Some(reason) = describe_filtered(pool, name, constraint) {
        return reason;
    }

    let available = available_versions(pool, name);
    if available.is_empty() {
        if is_platform_package(name) {
            return "it is missing from your platform".to_string();
        }
        return "no matching package found".to_string();
    }
    if is_platform_package(name) {
        return format!(
            "your platform provides {} {} which does not satisfy that requirement",
            name,
            available.join(", ")
        );
    }
    format!(
        "found {}[{}] but it does not match the constraint",
        name,
        available.join(", ")
    )
}

/// Versions matching `constraint` that the pool builder dropped. Stability
/// is reported before missing platform packages.
fn describe_filtered(pool: &Pool, name: &str, constraint: &str) -> Option<String> {
    let matching: Vec<&FilteredPackage> = pool
        .filtered(name)
        .iter()
        .filter(|f| pool.constraint_matches(constraint, &f.version))
        .collect();

    let unstable: Vec<String> = matching
        .iter()
        .filter(|f| f.reason == FilterReason::Stability)
        .map(|f| f.pretty_version.clone())
        .take(5)
        .collect();
    if !unstable.is_empty() {
        return Some(format!(
            "found {}[{}] but it does not match your minimum-stability",
            name,
            unstable.join(", ")
        ));
    }

    let missing = matching.iter().find_map(|f| match &f.reason {
        FilterReason::MissingPlatform(platform) => Some(platform.as_str()),
        FilterReason::Stability => None,
    })?;
    let blocked: Vec<String> = matching
        .iter()
        .map(|f| f.pretty_version.clone())
        .take(5)
        .collect();
    Some(format!(
        "found {}[{}] but it requires {} which is missing from your platform",
        name,
        blocked.join(", "),
        missing
    ))
}

fn describe_rule(pool: &Pool, rule: &Rule) -> String {
    let target = rule.target().unwrap_or("unknown");
    let constraint = rule.constraint().unwrap_or("*");

    match rule.rule_type() {
        RuleType::RootRequire => {
            if rule.literals().is_empty() {
                return format!(
                    "Root requires {} {} -> {}",
                    target,
                    constraint,
                    describe_missing(pool, target, constraint)
                );
            }
            let candidates: Vec<String> = rule
                .literals()
                .iter()
                .filter_map(|&l| pool.entry(Pool::literal_to_id(l)))
                .map(|e| e.pretty_string())
                .collect();
            format!(
                "Root requires {} {} -> satisfiable by {}",
                target,
                constraint,
                candidates.join(", ")
            )
        }
        RuleType::Fixed => {
            let Some(id) = rule.source() else {
                return String::new();
            };
            let source = source_name(pool, id);
            if pool.is_platform(id) {
                format!("{} is provided by the platform", source)
            } else {
                format!("{} is locked and cannot be changed", source)
            }
        }
        RuleType::PackageRequires => {
            let source = rule
                .source()
                .map(|id| source_name(pool, id))
                .unwrap_or_else(|| "unknown".to_string());
            // The first literal is the requiring package itself
            if rule.literals().len() <= 1 {
                return format!(
                    "{} requires {} {} -> {}",
                    source,
                    target,
                    constraint,
                    describe_missing(pool, target, constraint)
                );
            }
            let providers: Vec<String> = rule.literals()[1..]
                .iter()
                .filter_map(|&l| pool.entry(Pool::literal_to_id(l)))
                .map(|e| e.pretty_string())
                .collect();
            format!(
                "{} requires {} {} -> satisfiable by {}",
                source,
                target,
                constraint,
                providers.join(", ")
            )
        }
        RuleType::PackageConflict => {
            let packages: Vec<String> = rule
                .literals()
                .iter()
                .filter_map(|&l| pool.entry(Pool::literal_to_id(l)))
                .map(|e| e.pretty_string())
                .collect();
            match rule.source() {
                Some(id) => {
                    let source = source_name(pool, id);
                    let others: Vec<&str> = packages
                        .iter()
                        .filter(|p| **p != source)
                        .map(String::as_str)
                        .collect();
                    format!("{} conflicts with {}", source, others.join(", "))
                }
                None => format!("{} cannot be installed together", packages.join(" and ")),
            }
        }
        RuleType::PackageSameName => {
            let packages: Vec<String> = rule
                .literals()
                .iter()
                .filter_map(|&l| pool.entry(Pool::literal_to_id(l)))
                .map(|e| e.pretty_string())
                .collect();
            format!(
                "Only one of these can be installed: {}",
                packages.join(", ")
            )
        }
        RuleType::PackageAlias | RuleType::PackageInverseAlias => {
            let packages: Vec<String> = rule
                .literals()
                .iter()
                .filter_map(|&l| pool.entry(Pool::literal_to_id(l)))
                .map(|e| e.pretty_string())
                .collect();
            match (packages.first(), packages.last()) {
                (Some(first), Some(last)) => format!("{} is an alias of {}", first, last),
                _ => String::new(),
            }
        }
        RuleType::Learned => String::new(),
    }
}

/// Collection of problems encountered during solving
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProblemSet {
    problems: Vec<Problem>,
}

impl ProblemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    /// Generate a complete description of all problems
    pub fn describe(&self) -> String {
        let descriptions: Vec<_> = self
            .problems
            .iter()
            .enumerate()
            .map(|(i, p)| format!("Problem {}\n{}", i + 1, p.describe()))
            .collect();

        if descriptions.is_empty() {
            "No problems found".to_string()
        } else {
            descriptions.join("\n\n")
        }
    }
}

impl fmt::Display for ProblemSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} problem(s) found", self.problems.len())?;
        if f.alternate() && !self.problems.is_empty() {
            write!(f, "\n\n{}", self.describe())?;
        }
        Ok(())
    }
}
