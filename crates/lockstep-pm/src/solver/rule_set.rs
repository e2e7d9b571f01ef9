use std::collections::HashMap;
use std::ops::Index;

use super::rule::{Rule, RuleId, RuleType};

/// Ordered collection of rules. A rule's id is its position.
///
/// Non-empty rules with the same literal set are stored once; the first
/// one added wins.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    by_literals: HashMap<Vec<i32>, RuleId>,
}

/// Rule counts by type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSetStats {
    pub total: usize,
    pub root_require: usize,
    pub fixed: usize,
    pub package_requires: usize,
    pub package_conflict: usize,
    pub same_name: usize,
    pub alias: usize,
    pub learned: usize,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, returning its id (or the id of the identical rule
    /// already present).
    pub fn add(&mut self, mut rule: Rule) -> RuleId {
        let key = rule.hash_key();
        if !key.is_empty() {
            if let Some(&existing) = self.by_literals.get(&key) {
                return existing;
            }
        }

        let id = self.rules.len() as RuleId;
        rule.set_id(id);
        if !key.is_empty() {
            self.by_literals.insert(key, id);
        }
        self.rules.push(rule);
        id
    }

    /// Add a learned rule. Learned rules are never deduplicated.
    pub fn add_learned(&mut self, mut rule: Rule) -> RuleId {
        let id = self.rules.len() as RuleId;
        rule.set_id(id);
        self.rules.push(rule);
        id
    }

    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id as usize)
    }

    pub fn disable(&mut self, id: RuleId) {
        if let Some(rule) = self.rules.get_mut(id as usize) {
            rule.disable();
        }
    }

    pub fn enable(&mut self, id: RuleId) {
        if let Some(rule) = self.rules.get_mut(id as usize) {
            rule.enable();
        }
    }

    /// Drop every rule from `len` onwards
    pub fn truncate(&mut self, len: usize) {
        if len >= self.rules.len() {
            return;
        }
        self.rules.truncate(len);
        self.by_literals.retain(|_, id| (*id as usize) < len);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn rules_of_type(&self, rule_type: RuleType) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.rule_type() == rule_type)
    }

    pub fn stats(&self) -> RuleSetStats {
        let mut stats = RuleSetStats {
            total: self.rules.len(),
            ..Default::default()
        };
        for rule in &self.rules {
            match rule.rule_type() {
                RuleType::RootRequire => stats.root_require += 1,
                RuleType::Fixed => stats.fixed += 1,
                RuleType::PackageRequires => stats.package_requires += 1,
                RuleType::PackageConflict => stats.package_conflict += 1,
                RuleType::PackageSameName => stats.same_name += 1,
                RuleType::PackageAlias | RuleType::PackageInverseAlias => stats.alias += 1,
                RuleType::Learned => stats.learned += 1,
            }
        }
        stats
    }
}

impl Index<RuleId> for RuleSet {
    type Output = Rule;

    fn index(&self, id: RuleId) -> &Rule {
        &self.rules[id as usize]
    }
}
