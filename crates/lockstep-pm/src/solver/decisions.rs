use super::pool::PackageId;
use super::rule::{Literal, RuleId};

/// A single decision record
#[derive(Debug, Clone, Copy)]
struct Decision {
    /// Whether the package is installed (true) or not (false)
    installed: bool,
    /// The decision level at which this was decided
    level: u32,
    /// Position in the decision queue
    index: usize,
}

/// Tracks decisions made during SAT solving.
///
/// The queue is the solver's trail: decisions are only ever appended, and
/// backtracking pops from the end. Each decision records whether a package
/// is installed, the level it was made at and the rule that forced it
/// (`None` for free choices).
#[derive(Debug, Default)]
pub struct Decisions {
    /// Indexed by package ID
    decision_map: Vec<Option<Decision>>,

    /// Decisions in order made [(literal, rule_id)]
    decision_queue: Vec<(Literal, Option<RuleId>)>,
}

impl Decisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for a pool of `size` packages
    pub fn with_capacity(size: usize) -> Self {
        Self {
            decision_map: vec![None; size + 1],
            decision_queue: Vec::with_capacity(size),
        }
    }

    fn slot(&self, package_id: PackageId) -> Option<&Decision> {
        self.decision_map
            .get(package_id.unsigned_abs() as usize)
            .and_then(|d| d.as_ref())
    }

    /// Record a decision at `level`.
    ///
    /// Returns false if this conflicts with an existing decision. Deciding
    /// an already decided literal again is a no-op.
    pub fn decide(&mut self, literal: Literal, level: u32, rule_id: Option<RuleId>) -> bool {
        let package_id = literal.unsigned_abs() as usize;
        let install = literal > 0;

        if let Some(existing) = self.slot(literal) {
            return existing.installed == install;
        }

        if self.decision_map.len() <= package_id {
            self.decision_map.resize(package_id + 1, None);
        }
        self.decision_map[package_id] = Some(Decision {
            installed: install,
            level,
            index: self.decision_queue.len(),
        });
        self.decision_queue.push((literal, rule_id));

        true
    }

    /// Check if a literal is satisfied by current decisions
    pub fn satisfied(&self, literal: Literal) -> bool {
        self.slot(literal)
            .map(|d| d.installed == (literal > 0))
            .unwrap_or(false)
    }

    /// Check if a literal conflicts with current decisions
    pub fn conflict(&self, literal: Literal) -> bool {
        self.slot(literal)
            .map(|d| d.installed != (literal > 0))
            .unwrap_or(false)
    }

    /// Check if a package has been decided (either way)
    pub fn decided(&self, package_id: PackageId) -> bool {
        self.slot(package_id).is_some()
    }

    pub fn undecided(&self, package_id: PackageId) -> bool {
        !self.decided(package_id)
    }

    pub fn decided_install(&self, package_id: PackageId) -> bool {
        self.slot(package_id).map(|d| d.installed).unwrap_or(false)
    }

    pub fn decided_remove(&self, package_id: PackageId) -> bool {
        self.slot(package_id).map(|d| !d.installed).unwrap_or(false)
    }

    /// Get the decision level for a literal/package
    pub fn decision_level(&self, literal: Literal) -> Option<u32> {
        self.slot(literal).map(|d| d.level)
    }

    /// Get the rule that caused a decision
    pub fn decision_rule(&self, literal: Literal) -> Option<RuleId> {
        self.slot(literal)
            .and_then(|d| self.decision_queue[d.index].1)
    }

    /// Position of a decision in the queue
    pub fn decision_index(&self, literal: Literal) -> Option<usize> {
        self.slot(literal).map(|d| d.index)
    }

    /// The decision at queue position `index`
    pub fn at(&self, index: usize) -> Option<(Literal, Option<RuleId>)> {
        self.decision_queue.get(index).copied()
    }

    /// Undo every decision made above `target_level`
    pub fn revert_to_level(&mut self, target_level: u32) {
        while let Some(&(literal, _)) = self.decision_queue.last() {
            let level = self.decision_level(literal).unwrap_or(0);
            if level <= target_level {
                break;
            }
            self.decision_map[literal.unsigned_abs() as usize] = None;
            self.decision_queue.pop();
        }
    }

    /// Packages decided to be installed, in decision order
    pub fn installed_packages(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.decision_queue
            .iter()
            .filter(|(literal, _)| *literal > 0)
            .map(|(literal, _)| *literal)
    }

    pub fn queue(&self) -> &[(Literal, Option<RuleId>)] {
        &self.decision_queue
    }

    /// Get decisions at a specific level
    pub fn decisions_at_level(&self, level: u32) -> Vec<Literal> {
        self.decision_queue
            .iter()
            .filter(|&&(literal, _)| self.decision_level(literal) == Some(level))
            .map(|&(literal, _)| literal)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.decision_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decision_queue.is_empty()
    }

    pub fn reset(&mut self) {
        self.decision_map.iter_mut().for_each(|d| *d = None);
        self.decision_queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decisions_basic() {
        let mut decisions = Decisions::new();

        assert!(decisions.decide(1, 1, None));
        assert!(decisions.satisfied(1));
        assert!(!decisions.satisfied(-1));
        assert!(decisions.conflict(-1));
        assert!(decisions.decided_install(1));

        assert!(decisions.decide(-2, 1, Some(5)));
        assert!(decisions.satisfied(-2));
        assert!(decisions.decided_remove(2));
        assert_eq!(decisions.decision_rule(2), Some(5));
        assert_eq!(decisions.decision_rule(-2), Some(5));

        assert!(decisions.undecided(3));
    }

    #[test]
    fn test_decisions_conflict() {
        let mut decisions = Decisions::new();

        assert!(decisions.decide(1, 0, None));
        assert!(decisions.decide(1, 2, None));
        assert!(!decisions.decide(-1, 2, None));
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions.decision_level(1), Some(0));
    }

    #[test]
    fn test_decisions_revert() {
        let mut decisions = Decisions::with_capacity(4);

        decisions.decide(1, 1, None);
        decisions.decide(2, 2, Some(0));
        decisions.decide(-3, 2, Some(1));
        decisions.decide(4, 3, None);

        assert_eq!(decisions.decisions_at_level(2), vec![2, -3]);
        assert_eq!(decisions.len(), 4);

        decisions.revert_to_level(1);

        assert_eq!(decisions.len(), 1);
        assert!(decisions.decided(1));
        assert!(decisions.undecided(2));
        assert!(decisions.undecided(3));
        assert!(decisions.undecided(4));
        assert_eq!(decisions.at(0), Some((1, None)));
        assert_eq!(decisions.at(1), None);
    }

    #[test]
    fn test_decisions_installed_in_order() {
        let mut decisions = Decisions::new();
        decisions.decide(3, 0, None);
        decisions.decide(-1, 0, None);
        decisions.decide(2, 1, None);

        let installed: Vec<_> = decisions.installed_packages().collect();
        assert_eq!(installed, vec![3, 2]);
        assert_eq!(decisions.decision_index(2), Some(2));

        decisions.reset();
        assert!(decisions.is_empty());
        assert!(decisions.undecided(3));
    }
}
