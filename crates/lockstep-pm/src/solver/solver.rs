use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::decisions::Decisions;
use super::policy::Policy;
use super::pool::{PackageId, Pool};
use super::problem::{Problem, ProblemSet};
use super::request::Request;
use super::rule::{Literal, Rule, RuleId, RuleType};
use super::rule_generator::RuleGenerator;
use super::rule_set::RuleSet;
use super::transaction::Transaction;
use super::watch_graph::WatchGraph;
use crate::error::{Error, InvariantViolation};
use crate::package::{AliasPackage, Package};
use crate::Result;

/// Limits on a single solve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverBudget {
    /// Decisions plus conflicts before giving up. 0 means unlimited.
    pub max_steps: u64,
    /// Wall-clock limit
    pub time_limit: Option<Duration>,
}

impl Default for SolverBudget {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            time_limit: Some(Duration::from_secs(300)),
        }
    }
}

impl SolverBudget {
    pub fn unlimited() -> Self {
        Self {
            max_steps: 0,
            time_limit: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub steps: u64,
    pub conflicts: u64,
    pub learned: u64,
    pub restarts: u32,
    pub rules: usize,
    pub elapsed: Duration,
}

/// A satisfying assignment
#[derive(Debug)]
pub struct Solution {
    /// Installed packages sorted by name. Platform packages and alias
    /// entries are left out.
    pub packages: Vec<Arc<Package>>,
    /// Installed aliases
    pub aliases: Vec<Arc<AliasPackage>>,
    /// The final trail with levels and reasons
    pub decisions: Decisions,
    pub stats: SolverStats,
}

impl Solution {
    pub fn package(&self, name: &str) -> Option<&Arc<Package>> {
        self.packages
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// CDCL SAT solver for dependency resolution.
///
/// Decisions are made at increasing levels, level 0 holding everything the
/// request forces. Unit propagation runs through a watched-literal graph;
/// a conflict above level 0 is analysed down to its first unique
/// implication point, a rule is learned and the search jumps back. A
/// conflict at level 0 means the request cannot be satisfied as a whole:
/// the root rules behind it are recorded as a problem, disabled, and the
/// search starts over so that independent problems are all reported.
pub struct Solver<'a> {
    pool: &'a Pool,
    policy: &'a Policy,
    budget: SolverBudget,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Solver<'a> {
    pub fn new(pool: &'a Pool, policy: &'a Policy) -> Self {
        Self {
            pool,
            policy,
            budget: SolverBudget::default(),
            cancel: None,
        }
    }

    pub fn with_budget(mut self, budget: SolverBudget) -> Self {
        self.budget = budget;
        self
    }

    /// Abort with [`Error::Cancelled`] once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Solve the request and diff the result against its prior packages
    pub fn solve(&self, request: &Request) -> Result<Transaction> {
        let solution = self.solve_decisions(request)?;
        let prior: Vec<Arc<Package>> = request
            .prior_packages()
            .into_iter()
            .map(Arc::new)
            .collect();
        Transaction::from_packages(&prior, &solution.packages)
    }

    /// Solve the request
    pub fn solve_decisions(&self, request: &Request) -> Result<Solution> {
        let started = Instant::now();
        let rules = RuleGenerator::new(self.pool).generate(request)?;

        let mut search = Search::new(self, rules, started);
        search.run()?;

        let mut stats = search.stats.clone();
        stats.elapsed = started.elapsed();

        if !search.problems.is_empty() {
            log::info!(
                "Resolution failed with {} problem(s) after {} steps",
                search.problems.len(),
                stats.steps
            );
            let mut problems = ProblemSet::new();
            for problem in search.problems {
                problems.add(problem);
            }
            return Err(Error::Unsatisfiable(problems));
        }

        log::debug!(
            "Solved in {:?}: {} steps, {} conflicts, {} learned rules, {} restarts",
            stats.elapsed,
            stats.steps,
            stats.conflicts,
            stats.learned,
            stats.restarts
        );

        let decisions = search.decisions;
        let mut packages: Vec<Arc<Package>> = Vec::new();
        let mut aliases: Vec<Arc<AliasPackage>> = Vec::new();
        for id in decisions.installed_packages() {
            if self.pool.is_platform(id) {
                continue;
            }
            match self.pool.entry(id) {
                Some(entry) => {
                    if let Some(alias) = entry.as_alias() {
                        aliases.push(Arc::clone(alias));
                    } else if let Some(package) = entry.as_package() {
                        packages.push(Arc::clone(package));
                    }
                }
                None => {
                    return Err(InvariantViolation::SolverState(format!(
                        "installed package #{} is not in the pool",
                        id
                    ))
                    .into())
                }
            }
        }
        packages.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        aliases.sort_by(|a, b| a.name().to_lowercase().cmp(&b.name().to_lowercase()));

        Ok(Solution {
            packages,
            aliases,
            decisions,
            stats,
        })
    }
}

enum SatOutcome {
    Solved,
    /// A conflict at level 0 was recorded as a problem
    Unsolvable,
}

/// State of one solve
struct Search<'s> {
    pool: &'s Pool,
    policy: &'s Policy,
    budget: SolverBudget,
    cancel: Option<Arc<AtomicBool>>,
    started: Instant,

    rules: RuleSet,
    /// Rules up to here are generated, later ones are learned
    generated_rules: usize,
    watch_graph: WatchGraph,
    decisions: Decisions,
    propagate_index: usize,
    /// Packages of fixed rules
    fixed: HashSet<PackageId>,

    /// Rules that took part in each learning step
    learned_pool: Vec<Vec<RuleId>>,
    /// Learned rule -> index into `learned_pool`
    learned_why: HashMap<RuleId, usize>,

    problems: Vec<Problem>,
    stats: SolverStats,
}

impl<'s> Search<'s> {
    fn new(solver: &Solver<'s>, rules: RuleSet, started: Instant) -> Self {
        let fixed = rules
            .rules_of_type(RuleType::Fixed)
            .filter_map(|r| r.literals().first())
            .map(|l| l.abs())
            .collect();
        let generated_rules = rules.len();
        let stats = SolverStats {
            rules: generated_rules,
            ..Default::default()
        };

        Self {
            pool: solver.pool,
            policy: solver.policy,
            budget: solver.budget,
            cancel: solver.cancel.clone(),
            started,
            watch_graph: WatchGraph::new(),
            decisions: Decisions::with_capacity(solver.pool.len()),
            rules,
            generated_rules,
            propagate_index: 0,
            fixed,
            learned_pool: Vec::new(),
            learned_why: HashMap::new(),
            problems: Vec::new(),
            stats,
        }
    }

    fn run(&mut self) -> Result<()> {
        self.check_empty_rules();

        loop {
            self.reset();
            self.make_assertion_decisions();

            match self.run_sat()? {
                SatOutcome::Solved => return Ok(()),
                SatOutcome::Unsolvable => {
                    if !self.disable_last_problem() {
                        return Ok(());
                    }
                    self.stats.restarts += 1;
                    log::debug!("Restarting search after problem {}", self.problems.len());
                }
            }
        }
    }

    /// One step of the search. Fails once the budget is spent or the
    /// caller cancelled.
    fn tick(&mut self) -> Result<()> {
        self.stats.steps += 1;

        if let Some(cancel) = &self.cancel {
            if cancel.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
        }

        let exhausted = (self.budget.max_steps > 0 && self.stats.steps > self.budget.max_steps)
            || self
                .budget
                .time_limit
                .is_some_and(|limit| self.started.elapsed() > limit);
        if exhausted {
            return Err(Error::SearchExhausted {
                steps: self.stats.steps,
                elapsed: self.started.elapsed(),
            });
        }
        Ok(())
    }

    /// Drop learned state and start from an empty trail
    fn reset(&mut self) {
        self.rules.truncate(self.generated_rules);
        self.learned_pool.clear();
        self.learned_why.clear();
        self.decisions.reset();
        self.watch_graph = WatchGraph::from_rules(&self.rules);
        self.propagate_index = 0;
    }

    /// A requirement nothing can satisfy is a problem of its own
    fn check_empty_rules(&mut self) {
        let empty: Vec<RuleId> = self
            .rules
            .iter()
            .filter(|r| r.is_enabled() && r.literals().is_empty())
            .map(|r| r.id())
            .collect();

        for id in empty {
            let mut problem = Problem::new();
            problem.add_rule(&self.rules[id], self.pool);
            self.problems.push(problem);
            self.rules.disable(id);
        }
    }

    /// Decide everything asserted by single-literal rules at level 0
    fn make_assertion_decisions(&mut self) {
        let mut index = 0;
        while index < self.rules.len() {
            let rule_id = index as RuleId;
            index += 1;

            let rule = &self.rules[rule_id];
            if !rule.is_assertion() || rule.is_disabled() {
                continue;
            }

            let literal = rule.literals()[0];
            if self.decisions.undecided(literal.abs()) {
                self.decisions.decide(literal, 0, Some(rule_id));
                continue;
            }
            if self.decisions.satisfied(literal) {
                continue;
            }

            if rule.rule_type() == RuleType::Learned {
                self.rules.disable(rule_id);
                continue;
            }

            let Some(conflict_id) = self.decisions.decision_rule(literal) else {
                continue;
            };

            let mut problem = Problem::new();
            problem.add_rule(&self.rules[rule_id], self.pool);
            problem.add_rule(&self.rules[conflict_id], self.pool);

            if !self.rules[conflict_id].rule_type().is_root_level() {
                self.rules.disable(rule_id);
                problem.sort();
                self.problems.push(problem);
                continue;
            }

            // Conflict between request rules: every request assertion on
            // this package is part of the problem
            let asserting: Vec<RuleId> = self
                .rules
                .iter()
                .filter(|r| {
                    r.rule_type().is_root_level()
                        && r.is_enabled()
                        && r.is_assertion()
                        && r.literals()[0].abs() == literal.abs()
                })
                .map(|r| r.id())
                .collect();
            for id in asserting {
                problem.add_rule(&self.rules[id], self.pool);
                self.rules.disable(id);
            }
            problem.sort();
            self.problems.push(problem);

            self.decisions.reset();
            index = 0;
        }
    }

    fn run_sat(&mut self) -> Result<SatOutcome> {
        self.propagate_index = 0;
        let mut level: u32 = 0;
        let mut system_level = level + 1;

        let request_rules: Vec<RuleId> = self
            .rules
            .iter()
            .filter(|r| r.rule_type().is_root_level())
            .map(|r| r.id())
            .collect();

        loop {
            self.tick()?;

            if level == 0 {
                if let Some(conflict) = self.propagate(level) {
                    self.analyze_unsolvable(conflict);
                    return Ok(SatOutcome::Unsolvable);
                }
            }

            // Install something for each request rule
            if level < system_level {
                let mut interrupted = false;
                for &rule_id in &request_rules {
                    let rule = &self.rules[rule_id];
                    if rule.is_disabled() {
                        continue;
                    }

                    let mut queue = Vec::new();
                    let mut none_satisfied = true;
                    for &literal in rule.literals() {
                        if self.decisions.satisfied(literal) {
                            none_satisfied = false;
                            break;
                        }
                        if literal > 0 && self.decisions.undecided(literal) {
                            queue.push(literal);
                        }
                    }
                    if !none_satisfied || queue.is_empty() {
                        continue;
                    }

                    // Fixed candidates win
                    let fixed: Vec<Literal> = queue
                        .iter()
                        .copied()
                        .filter(|l| self.fixed.contains(&l.abs()))
                        .collect();
                    if !fixed.is_empty() {
                        queue = fixed;
                    }

                    let previous_level = level;
                    match self.select_and_install(level, &queue, rule_id)? {
                        None => return Ok(SatOutcome::Unsolvable),
                        Some(new_level) => level = new_level,
                    }
                    if level <= previous_level {
                        interrupted = true;
                        break;
                    }
                }

                system_level = level + 1;
                if interrupted {
                    continue;
                }
            }

            if level < system_level {
                system_level = level;
            }

            // Look for rules that are not yet fulfilled and still have a
            // choice to make
            let mut rules_count = self.rules.len();
            let mut i = 0;
            let mut n = 0;
            while n < rules_count {
                if i == rules_count {
                    i = 0;
                }
                let rule_id = i as RuleId;
                i += 1;
                n += 1;

                let rule = &self.rules[rule_id];
                if rule.is_disabled() {
                    continue;
                }

                let mut queue = Vec::new();
                let mut open = true;
                for &literal in rule.literals() {
                    let id = literal.abs();
                    if literal <= 0 {
                        if !self.decisions.decided_install(id) {
                            open = false;
                            break;
                        }
                    } else {
                        if self.decisions.decided_install(id) {
                            open = false;
                            break;
                        }
                        if self.decisions.undecided(id) {
                            queue.push(literal);
                        }
                    }
                }

                if !open || queue.len() < 2 {
                    continue;
                }

                match self.select_and_install(level, &queue, rule_id)? {
                    None => return Ok(SatOutcome::Unsolvable),
                    Some(new_level) => level = new_level,
                }

                // Something changed, look at all rules again
                rules_count = self.rules.len();
                n = 0;
            }

            if level < system_level {
                continue;
            }

            return Ok(SatOutcome::Solved);
        }
    }

    /// Install the preferred candidate of `queue` at a new level
    fn select_and_install(&mut self, level: u32, queue: &[Literal], rule_id: RuleId) -> Result<Option<u32>> {
        let required = self.rules[rule_id].target().map(str::to_string);
        let preferred = self
            .policy
            .select_preferred(self.pool, queue, required.as_deref());

        let Some(&selected) = preferred.first() else {
            return Err(InvariantViolation::SolverState("no candidate to select".into()).into());
        };

        self.set_propagate_learn(level, selected, rule_id)
    }

    /// Decide `literal` one level deeper and propagate, learning from
    /// conflicts until the trail is consistent. Returns the new level, or
    /// `None` once the request is known to be unsatisfiable.
    fn set_propagate_learn(&mut self, level: u32, literal: Literal, rule_id: RuleId) -> Result<Option<u32>> {
        let mut level = level + 1;
        self.decisions.decide(literal, level, Some(rule_id));

        loop {
            self.tick()?;

            let Some(conflict) = self.propagate(level) else {
                break;
            };

            if level == 0 {
                self.analyze_unsolvable(conflict);
                return Ok(None);
            }

            self.stats.conflicts += 1;
            let (learn_literal, new_level, literals, why) = self.analyze(level, conflict)?;

            if new_level >= level {
                return Err(InvariantViolation::SolverState(format!(
                    "cannot revert to level {} from level {}",
                    new_level, level
                ))
                .into());
            }

            level = new_level;
            self.revert(level);

            let learned = self.rules.add_learned(Rule::learned(literals));
            self.learned_why.insert(learned, why);
            self.watch_graph
                .insert_learned(&self.rules[learned], &self.decisions);
            self.decisions.decide(learn_literal, level, Some(learned));
            self.stats.learned += 1;
        }

        Ok(Some(level))
    }

    /// Propagate every decision not yet propagated
    fn propagate(&mut self, level: u32) -> Option<RuleId> {
        while let Some((literal, _)) = self.decisions.at(self.propagate_index) {
            let conflict = self.watch_graph.propagate_literal(
                literal,
                level,
                &mut self.decisions,
                &self.rules,
            );
            self.propagate_index += 1;
            if conflict.is_some() {
                return conflict;
            }
        }
        None
    }

    fn revert(&mut self, level: u32) {
        self.decisions.revert_to_level(level);
        self.propagate_index = self.propagate_index.min(self.decisions.len());
    }

    fn state_error(message: &str, rule_id: RuleId) -> Error {
        InvariantViolation::SolverState(format!("{} while analysing rule #{}", message, rule_id)).into()
    }

    /// First-UIP conflict analysis.
    ///
    /// Returns the literal to assert, the level to jump back to, the learned
    /// clause (asserted literal first) and the index of the rules involved
    /// in `learned_pool`.
    fn analyze(&mut self, level: u32, conflict: RuleId) -> Result<(Literal, u32, Vec<Literal>, usize)> {
        let mut rule_id = conflict;
        let mut rule_level: u32 = 0;
        let mut num: i64 = 0;
        let mut root_num: i64 = 0;
        let mut seen: HashSet<PackageId> = HashSet::new();
        // Slot 0 holds the asserted literal once found
        let mut learned: Vec<Literal> = vec![0];
        let mut decision_id = self.decisions.len();

        self.learned_pool.push(Vec::new());
        let why = self.learned_pool.len() - 1;

        'analyze: loop {
            self.learned_pool[why].push(rule_id);

            let rule = &self.rules[rule_id];
            for &literal in rule.literals() {
                // Parts of a multi-conflict rule may not have propagated yet
                if rule.is_multi_conflict() && self.decisions.undecided(literal.abs()) {
                    continue;
                }
                if self.decisions.satisfied(literal) {
                    continue;
                }
                if !seen.insert(literal.abs()) {
                    continue;
                }

                let l = self.decisions.decision_level(literal).unwrap_or(0);
                if l == 0 {
                    root_num += 1;
                } else if l == level {
                    num += 1;
                } else {
                    learned.push(literal);
                    rule_level = rule_level.max(l);
                }
            }

            let mut retry = true;
            while retry {
                retry = false;

                if num == 0 {
                    root_num -= 1;
                    if root_num == 0 {
                        break 'analyze;
                    }
                }

                let literal = loop {
                    if decision_id == 0 {
                        return Err(Self::state_error("ran out of decisions", conflict));
                    }
                    decision_id -= 1;
                    let (literal, _) = self
                        .decisions
                        .at(decision_id)
                        .ok_or_else(|| Self::state_error("missing decision", conflict))?;
                    if seen.contains(&literal.abs()) {
                        break literal;
                    }
                };
                seen.remove(&literal.abs());

                let at_uip = if num != 0 {
                    num -= 1;
                    num == 0
                } else {
                    false
                };

                if at_uip {
                    learned[0] = -literal;
                    if root_num == 0 {
                        break 'analyze;
                    }
                    for l in &learned[1..] {
                        seen.remove(&l.abs());
                    }
                    // Only level 0 literals are left to walk
                    root_num += 1;
                    retry = true;
                    continue;
                }

                let reason = self
                    .decisions
                    .at(decision_id)
                    .and_then(|(_, reason)| reason)
                    .ok_or_else(|| Self::state_error("decision without reason", conflict))?;
                let reason_rule = &self.rules[reason];
                if reason_rule.is_multi_conflict() {
                    // Exactly one package of a multi-conflict rule is installed
                    for &literal in reason_rule.literals() {
                        if !seen.contains(&literal.abs()) && self.decisions.satisfied(-literal) {
                            self.learned_pool[why].push(reason);
                            let l = self.decisions.decision_level(literal).unwrap_or(0);
                            if l == 0 {
                                root_num += 1;
                            } else if l == level {
                                num += 1;
                            } else {
                                learned.push(literal);
                                rule_level = rule_level.max(l);
                            }
                            seen.insert(literal.abs());
                            break;
                        }
                    }
                    retry = true;
                }
            }

            rule_id = self
                .decisions
                .at(decision_id)
                .and_then(|(_, reason)| reason)
                .ok_or_else(|| Self::state_error("decision without reason", conflict))?;
        }

        if learned[0] == 0 {
            return Err(Self::state_error("no literal to learn", conflict));
        }

        Ok((learned[0], rule_level, learned, why))
    }

    /// Record the rules behind a level 0 conflict as a problem
    fn analyze_unsolvable(&mut self, conflict: RuleId) {
        let mut problem = Problem::new();
        let mut rule_seen = HashSet::new();
        self.analyze_unsolvable_rule(&mut problem, conflict, &mut rule_seen);

        let mut seen: HashSet<PackageId> = HashSet::new();
        for &literal in self.rules[conflict].literals() {
            if !self.decisions.satisfied(literal) {
                seen.insert(literal.abs());
            }
        }

        for index in (0..self.decisions.len()).rev() {
            let Some((literal, Some(why))) = self.decisions.at(index) else {
                continue;
            };
            if !seen.contains(&literal.abs()) {
                continue;
            }

            self.analyze_unsolvable_rule(&mut problem, why, &mut rule_seen);
            for &literal in self.rules[why].literals() {
                if !self.decisions.satisfied(literal) {
                    seen.insert(literal.abs());
                }
            }
        }

        problem.sort();
        self.problems.push(problem);
    }

    /// Add a rule to the problem, expanding learned rules into the rules
    /// they were derived from
    fn analyze_unsolvable_rule(&self, problem: &mut Problem, rule_id: RuleId, rule_seen: &mut HashSet<RuleId>) {
        if !rule_seen.insert(rule_id) {
            return;
        }

        let rule = &self.rules[rule_id];
        if rule.rule_type() == RuleType::Learned {
            if let Some(&why) = self.learned_why.get(&rule_id) {
                for &origin in &self.learned_pool[why] {
                    self.analyze_unsolvable_rule(problem, origin, rule_seen);
                }
            }
            return;
        }

        problem.add_rule(rule, self.pool);
    }

    /// Disable the rules to blame for the latest problem so the next run
    /// can look past it. Returns false if nothing could be disabled.
    fn disable_last_problem(&mut self) -> bool {
        let Some(problem) = self.problems.last() else {
            return false;
        };

        let mut blamed: Vec<RuleId> = problem
            .root_rules()
            .map(|r| r.rule_id)
            .filter(|&id| self.rules[id].is_enabled())
            .collect();
        if blamed.is_empty() {
            blamed = problem
                .rules
                .iter()
                .map(|r| r.rule_id)
                .filter(|&id| (id as usize) < self.generated_rules && self.rules[id].is_enabled())
                .collect();
        }

        for &id in &blamed {
            self.rules.disable(id);
        }
        !blamed.is_empty()
    }
}
