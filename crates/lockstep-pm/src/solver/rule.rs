use std::fmt;

use super::pool::{PackageId, Pool};

/// A SAT literal: positive means "install package", negative means
/// "don't install package".
pub type Literal = i32;

/// Index of a rule in its `RuleSet`
pub type RuleId = u32;

/// Why a rule exists. Used for diagnostics and to decide which rules a
/// problem can be blamed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleType {
    /// One of the providers of a root requirement must be installed
    RootRequire,
    /// A package pinned by the request or a platform fact
    Fixed,
    /// If a package is installed, one of the providers of its dependency must be
    PackageRequires,
    /// Two packages declared to conflict
    PackageConflict,
    /// Only one package per name (including replaced names)
    PackageSameName,
    /// An alias requires the package it aliases
    PackageAlias,
    /// A package requires its alias to be installed with it
    PackageInverseAlias,
    /// Derived by conflict analysis
    Learned,
}

impl RuleType {
    /// Rules that come straight from the request
    pub fn is_root_level(self) -> bool {
        matches!(self, RuleType::RootRequire | RuleType::Fixed)
    }
}

/// A disjunction of literals: at least one must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    id: RuleId,
    literals: Vec<Literal>,
    rule_type: RuleType,
    /// All literals are negative and at most one may be false
    multi_conflict: bool,
    disabled: bool,
    source: Option<PackageId>,
    target: Option<String>,
    constraint: Option<String>,
}

impl Rule {
    pub fn new(literals: Vec<Literal>, rule_type: RuleType) -> Self {
        Self {
            id: 0,
            literals,
            rule_type,
            multi_conflict: false,
            disabled: false,
            source: None,
            target: None,
            constraint: None,
        }
    }

    /// At least one of `providers` must be installed
    pub fn root_require(providers: Vec<PackageId>) -> Self {
        Self::new(providers, RuleType::RootRequire)
    }

    /// `package` may only be installed together with one of `providers`
    pub fn requires(package: PackageId, providers: Vec<PackageId>) -> Self {
        let mut literals = Vec::with_capacity(providers.len() + 1);
        literals.push(-package);
        literals.extend(providers);
        Self::new(literals, RuleType::PackageRequires)
    }

    /// None of `packages` may be installed together
    pub fn conflict(packages: Vec<PackageId>) -> Self {
        Self::new(packages.into_iter().map(|id| -id).collect(), RuleType::PackageConflict)
    }

    /// At most one of `packages` may be installed. Two packages give a
    /// plain binary clause, more give a single multi-conflict rule.
    pub fn same_name(packages: Vec<PackageId>) -> Self {
        let multi = packages.len() > 2;
        let mut rule = Self::new(packages.into_iter().map(|id| -id).collect(), RuleType::PackageSameName);
        rule.multi_conflict = multi;
        rule
    }

    /// `package` must be installed
    pub fn fixed(package: PackageId) -> Self {
        Self::new(vec![package], RuleType::Fixed)
    }

    pub fn learned(literals: Vec<Literal>) -> Self {
        Self::new(literals, RuleType::Learned)
    }

    pub fn with_source(mut self, package: PackageId) -> Self {
        self.source = Some(package);
        self
    }

    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.target = Some(name.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: RuleId) {
        self.id = id;
    }

    pub fn literals(&self) -> &[Literal] {
        &self.literals
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn is_multi_conflict(&self) -> bool {
        self.multi_conflict
    }

    /// Rules with a single literal are decided before search starts
    pub fn is_assertion(&self) -> bool {
        self.literals.len() == 1 && !self.multi_conflict
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_enabled(&self) -> bool {
        !self.disabled
    }

    pub fn disable(&mut self) {
        self.disabled = true;
    }

    pub fn enable(&mut self) {
        self.disabled = false;
    }

    pub fn source(&self) -> Option<PackageId> {
        self.source
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    /// Literal set used to spot duplicate rules
    pub(crate) fn hash_key(&self) -> Vec<Literal> {
        let mut key = self.literals.clone();
        key.sort_unstable();
        key
    }

    /// Render the clause with package names, e.g.
    /// `don't install a 1.0.0 | install b 1.0.0`
    pub fn to_string_with_pool(&self, pool: &Pool) -> String {
        let literals: Vec<String> = self
            .literals
            .iter()
            .map(|&literal| pool.literal_to_string(literal))
            .collect();
        let joiner = if self.multi_conflict { " ^ " } else { " | " };
        format!("({})", literals.join(joiner))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let literals: Vec<String> = self.literals.iter().map(|l| l.to_string()).collect();
        write!(f, "#{} {:?} ({})", self.id, self.rule_type, literals.join(" | "))
    }
}
