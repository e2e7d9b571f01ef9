use std::collections::HashMap;

use super::decisions::Decisions;
use super::rule::{Literal, Rule, RuleId};
use super::rule_set::RuleSet;

/// Two watched literals of one rule
#[derive(Debug, Clone)]
struct WatchNode {
    rule: RuleId,
    watch1: Literal,
    watch2: Literal,
}

impl WatchNode {
    fn new(rule: &Rule) -> Self {
        let literals = rule.literals();
        Self {
            rule: rule.id(),
            watch1: literals.first().copied().unwrap_or(0),
            watch2: literals.get(1).copied().unwrap_or(0),
        }
    }

    /// Watch the literal decided at the highest level as `watch2`, so a
    /// learned rule wakes up as soon as that decision is reverted.
    fn watch2_on_highest(&mut self, rule: &Rule, decisions: &Decisions) {
        let literals = rule.literals();
        if literals.len() < 3 {
            return;
        }
        let mut watch_level = 0;
        for &literal in literals {
            let level = decisions.decision_level(literal).unwrap_or(0);
            if level > watch_level {
                self.watch2 = literal;
                watch_level = level;
            }
        }
    }

    fn other_watch(&self, literal: Literal) -> Literal {
        if self.watch1 == literal {
            self.watch2
        } else {
            self.watch1
        }
    }

    fn move_watch(&mut self, from: Literal, to: Literal) {
        if self.watch1 == from {
            self.watch1 = to;
        } else {
            self.watch2 = to;
        }
    }
}

/// Watched-literal index used for unit propagation.
///
/// Each rule with two or more literals is watched on two of them. A rule
/// only needs attention when one of its watched literals becomes false:
/// then the watch moves to another literal that is not false, or, if there
/// is none, the other watched literal is forced. Multi-conflict rules are
/// watched on every literal.
#[derive(Debug, Default)]
pub struct WatchGraph {
    nodes: Vec<WatchNode>,
    /// Literal -> nodes watching it
    chains: HashMap<Literal, Vec<usize>>,
}

impl WatchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for every rule in the set
    pub fn from_rules(rules: &RuleSet) -> Self {
        let mut graph = Self::new();
        for rule in rules.iter() {
            graph.insert(rule);
        }
        graph
    }

    /// Start watching a rule. Assertions and empty rules are not watched.
    pub fn insert(&mut self, rule: &Rule) {
        if rule.literals().len() < 2 {
            return;
        }
        let node = WatchNode::new(rule);
        self.add_node(node, rule);
    }

    /// Start watching a freshly learned rule
    pub fn insert_learned(&mut self, rule: &Rule, decisions: &Decisions) {
        if rule.literals().len() < 2 {
            return;
        }
        let mut node = WatchNode::new(rule);
        node.watch2_on_highest(rule, decisions);
        self.add_node(node, rule);
    }

    fn add_node(&mut self, node: WatchNode, rule: &Rule) {
        let index = self.nodes.len();
        if rule.is_multi_conflict() {
            for &literal in rule.literals() {
                self.chains.entry(literal).or_default().push(index);
            }
        } else {
            self.chains.entry(node.watch1).or_default().push(index);
            self.chains.entry(node.watch2).or_default().push(index);
        }
        self.nodes.push(node);
    }

    /// Propagate the consequences of `decided` at `level`.
    ///
    /// Returns the id of a rule that is violated by the current decisions,
    /// if any.
    pub fn propagate_literal(
        &mut self,
        decided: Literal,
        level: u32,
        decisions: &mut Decisions,
        rules: &RuleSet,
    ) -> Option<RuleId> {
        // Rules watching the now-false literal need a look
        let literal = -decided;
        let chain = self.chains.remove(&literal)?;
        let mut kept = Vec::with_capacity(chain.len());
        let mut conflict = None;

        let mut position = 0;
        while position < chain.len() {
            let index = chain[position];
            position += 1;

            let rule = &rules[self.nodes[index].rule];

            if rule.is_multi_conflict() {
                kept.push(index);
                if rule.is_disabled() {
                    continue;
                }
                for &other in rule.literals() {
                    if other != literal && !decisions.satisfied(other) {
                        if decisions.conflict(other) {
                            conflict = Some(rule.id());
                            break;
                        }
                        decisions.decide(other, level, Some(rule.id()));
                    }
                }
                if conflict.is_some() {
                    break;
                }
                continue;
            }

            let other_watch = self.nodes[index].other_watch(literal);
            if rule.is_disabled() || decisions.satisfied(other_watch) {
                kept.push(index);
                continue;
            }

            let alternative = rule
                .literals()
                .iter()
                .copied()
                .find(|&l| l != literal && l != other_watch && !decisions.conflict(l));

            if let Some(alternative) = alternative {
                self.nodes[index].move_watch(literal, alternative);
                self.chains.entry(alternative).or_default().push(index);
                continue;
            }

            kept.push(index);
            if decisions.conflict(other_watch) {
                conflict = Some(rule.id());
                break;
            }
            decisions.decide(other_watch, level, Some(rule.id()));
        }

        kept.extend_from_slice(&chain[position..]);
        if !kept.is_empty() {
            let entry = self.chains.entry(literal).or_default();
            // Nothing is added to this chain while it is being walked
            kept.append(entry);
            *entry = kept;
        }

        conflict
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_set(rules: Vec<Rule>) -> RuleSet {
        let mut set = RuleSet::new();
        for rule in rules {
            set.add(rule);
        }
        set
    }

    #[test]
    fn test_assertions_are_not_watched() {
        let rules = rule_set(vec![Rule::fixed(1), Rule::requires(1, vec![2])]);
        let graph = WatchGraph::from_rules(&rules);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_unit_propagation() {
        // 1 -> 2, 2 -> 3
        let rules = rule_set(vec![Rule::requires(1, vec![2]), Rule::requires(2, vec![3])]);
        let mut graph = WatchGraph::from_rules(&rules);
        let mut decisions = Decisions::new();

        decisions.decide(1, 1, None);
        assert_eq!(graph.propagate_literal(1, 1, &mut decisions, &rules), None);
        assert!(decisions.decided_install(2));
        assert_eq!(decisions.decision_rule(2), Some(0));

        assert_eq!(graph.propagate_literal(2, 1, &mut decisions, &rules), None);
        assert!(decisions.decided_install(3));
    }

    #[test]
    fn test_watch_moves_to_undecided_literal() {
        // 1 -> (2 | 3)
        let rules = rule_set(vec![Rule::requires(1, vec![2, 3])]);
        let mut graph = WatchGraph::from_rules(&rules);
        let mut decisions = Decisions::new();

        decisions.decide(-2, 1, None);
        assert_eq!(graph.propagate_literal(-2, 1, &mut decisions, &rules), None);
        assert!(decisions.undecided(3));

        decisions.decide(1, 2, None);
        assert_eq!(graph.propagate_literal(1, 2, &mut decisions, &rules), None);
        assert!(decisions.decided_install(3));
    }

    #[test]
    fn test_conflict_detected() {
        // 1 -> 2, but 2 is already removed
        let rules = rule_set(vec![Rule::requires(1, vec![2])]);
        let mut graph = WatchGraph::from_rules(&rules);
        let mut decisions = Decisions::new();

        decisions.decide(-2, 1, None);
        decisions.decide(1, 2, None);
        assert_eq!(graph.propagate_literal(1, 2, &mut decisions, &rules), Some(0));
    }

    #[test]
    fn test_multi_conflict_propagation() {
        let rules = rule_set(vec![Rule::same_name(vec![1, 2, 3])]);
        let mut graph = WatchGraph::from_rules(&rules);
        let mut decisions = Decisions::new();

        decisions.decide(2, 1, None);
        assert_eq!(graph.propagate_literal(2, 1, &mut decisions, &rules), None);
        assert!(decisions.decided_remove(1));
        assert!(decisions.decided_remove(3));

        let mut decisions = Decisions::new();
        decisions.decide(1, 1, None);
        decisions.decide(3, 1, None);
        assert_eq!(graph.propagate_literal(3, 1, &mut decisions, &rules), Some(0));
    }
}
