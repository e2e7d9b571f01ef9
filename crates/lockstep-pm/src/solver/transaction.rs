use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::InvariantViolation;
use crate::package::Package;
use crate::util::is_platform_package;
use crate::Result;

/// A single step of a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Install(Arc<Package>),
    Update { from: Arc<Package>, to: Arc<Package> },
    Uninstall(Arc<Package>),
}

impl Operation {
    /// The package this operation leaves behind (or removes)
    pub fn package(&self) -> &Arc<Package> {
        match self {
            Operation::Install(p) | Operation::Uninstall(p) => p,
            Operation::Update { to, .. } => to,
        }
    }

    pub fn name(&self) -> &str {
        &self.package().name
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Install(_) => "install",
            Operation::Update { .. } => "update",
            Operation::Uninstall(_) => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Install(p) => write!(f, "Installing {} ({})", p.name, p.pretty_version()),
            Operation::Update { from, to } => write!(
                f,
                "Updating {} ({} => {})",
                to.name,
                from.pretty_version(),
                to.pretty_version()
            ),
            Operation::Uninstall(p) => write!(f, "Removing {} ({})", p.name, p.pretty_version()),
        }
    }
}

/// The ordered operations that turn the prior package set into the new one.
///
/// Operations are ordered so that a package is installed or updated only
/// after the packages it requires, and removed only after the packages that
/// required it were removed or updated. Operations that could run at the
/// same point are ordered by package name.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub operations: Vec<Operation>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff two package sets. Platform packages never produce operations.
    pub fn from_packages(prior: &[Arc<Package>], new: &[Arc<Package>]) -> Result<Self> {
        let prior_map = by_name(prior);
        let new_map = by_name(new);

        let mut operations = Vec::new();
        for (name, package) in &new_map {
            match prior_map.get(name) {
                Some(previous) if !changed(previous, package) => {}
                Some(previous) => operations.push(Operation::Update {
                    from: Arc::clone(previous),
                    to: Arc::clone(package),
                }),
                None => operations.push(Operation::Install(Arc::clone(package))),
            }
        }
        for (name, package) in &prior_map {
            if !new_map.contains_key(name) {
                operations.push(Operation::Uninstall(Arc::clone(package)));
            }
        }

        let operations = order(operations)?;
        log::debug!(
            "Transaction: {} operation(s) from {} prior and {} new package(s)",
            operations.len(),
            prior_map.len(),
            new_map.len()
        );
        Ok(Self { operations })
    }

    /// Packages installed fresh or updated to
    pub fn installs(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Install(p) => Some(p),
            Operation::Update { to, .. } => Some(to),
            Operation::Uninstall(_) => None,
        })
    }

    /// Packages that were not present before
    pub fn new_installs(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Install(p) => Some(p),
            _ => None,
        })
    }

    pub fn updates(&self) -> impl Iterator<Item = (&Arc<Package>, &Arc<Package>)> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Update { from, to } => Some((from, to)),
            _ => None,
        })
    }

    pub fn removals(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Uninstall(p) => Some(p),
            _ => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Index of the operation touching `name`
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.operations
            .iter()
            .position(|op| op.name().eq_ignore_ascii_case(name))
    }
}

fn by_name(packages: &[Arc<Package>]) -> IndexMap<String, Arc<Package>> {
    let mut map = IndexMap::new();
    for package in packages {
        if is_platform_package(&package.name) {
            continue;
        }
        map.entry(package.name.to_lowercase())
            .or_insert_with(|| Arc::clone(package));
    }
    map
}

fn source_reference(package: &Package) -> Option<&serde_json::Value> {
    package.metadata.get("source").and_then(|s| s.get("reference"))
}

/// A package counts as changed when its version or its source reference moved
fn changed(from: &Package, to: &Package) -> bool {
    from.version != to.version || source_reference(from) != source_reference(to)
}

/// Order operations topologically, layer by layer
fn order(operations: Vec<Operation>) -> Result<Vec<Operation>> {
    let count = operations.len();

    // Every name (own, provided, replaced) an operation satisfies or frees
    let mut installs_by_name: HashMap<String, Vec<usize>> = HashMap::new();
    let mut removals_by_name: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, op) in operations.iter().enumerate() {
        match op {
            Operation::Install(p) | Operation::Update { to: p, .. } => {
                for name in p.names() {
                    installs_by_name.entry(name).or_default().push(index);
                }
            }
            Operation::Uninstall(_) => {}
        }
        let freed = match op {
            Operation::Uninstall(p) => Some(p),
            Operation::Update { from, .. } => Some(from),
            Operation::Install(_) => None,
        };
        if let Some(p) = freed {
            for name in p.names() {
                removals_by_name.entry(name).or_default().push(index);
            }
        }
    }

    // before[i] holds the operations that must run before i
    let mut before: Vec<HashSet<usize>> = vec![HashSet::new(); count];
    for (index, op) in operations.iter().enumerate() {
        match op {
            Operation::Install(p) | Operation::Update { to: p, .. } => {
                for dep in p.require.keys() {
                    let dep = dep.to_lowercase();
                    for &other in installs_by_name.get(&dep).into_iter().flatten() {
                        if other != index {
                            before[index].insert(other);
                        }
                    }
                }
            }
            Operation::Uninstall(_) => {}
        }

        // A removed or updated package frees what it required: those
        // removals wait for it
        let freed = match op {
            Operation::Uninstall(p) => Some(p),
            Operation::Update { from, .. } => Some(from),
            Operation::Install(_) => None,
        };
        if let Some(p) = freed {
            for dep in p.require.keys() {
                let dep = dep.to_lowercase();
                for &other in removals_by_name.get(&dep).into_iter().flatten() {
                    if other != index && matches!(operations[other], Operation::Uninstall(_)) {
                        before[other].insert(index);
                    }
                }
            }
        }
    }

    let mut after: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut pending: Vec<usize> = vec![0; count];
    for (index, deps) in before.iter().enumerate() {
        pending[index] = deps.len();
        for &dep in deps {
            after[dep].push(index);
        }
    }

    let key = |i: usize| (operations[i].name().to_lowercase(), i);
    let mut ready: BTreeSet<(String, usize)> = (0..count)
        .filter(|&i| pending[i] == 0)
        .map(key)
        .collect();
    let mut sorted = Vec::with_capacity(count);

    while sorted.len() < count {
        if ready.is_empty() {
            // Mutual requires leave no operation free to run. Release the
            // first cycle member by name and carry on from there.
            let Some(index) = cycle_members(&before, &pending)
                .into_iter()
                .min_by_key(|&i| key(i))
            else {
                return Err(InvariantViolation::DependencyCycle {
                    packages: stuck_names(&operations, &pending),
                }
                .into());
            };
            log::debug!(
                "Breaking dependency cycle at {} ({} operation(s) unordered)",
                operations[index].name(),
                count - sorted.len()
            );
            pending[index] = 0;
            ready.insert(key(index));
        }

        let layer = std::mem::take(&mut ready);
        for (_, index) in layer {
            sorted.push(index);
            for &next in &after[index] {
                // A released cycle member is already at zero
                if pending[next] == 0 {
                    continue;
                }
                pending[next] -= 1;
                if pending[next] == 0 {
                    ready.insert(key(next));
                }
            }
        }
    }

    let mut slots: Vec<Option<Operation>> = operations.into_iter().map(Some).collect();
    Ok(sorted
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect())
}

/// Unordered operations that sit on a cycle, leaving out those that merely
/// wait for one
fn cycle_members(before: &[HashSet<usize>], pending: &[usize]) -> Vec<usize> {
    let mut remaining: HashSet<usize> = (0..pending.len()).filter(|&i| pending[i] > 0).collect();
    loop {
        let waiting_only: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|&i| !remaining.iter().any(|&j| before[j].contains(&i)))
            .collect();
        if waiting_only.is_empty() {
            break;
        }
        for i in waiting_only {
            remaining.remove(&i);
        }
    }
    remaining.into_iter().collect()
}

fn stuck_names(operations: &[Operation], pending: &[usize]) -> Vec<String> {
    let mut names: Vec<String> = (0..operations.len())
        .filter(|&i| pending[i] > 0)
        .map(|i| operations[i].name().to_string())
        .collect();
    names.sort();
    names
}
