//! Ties the pieces together: request in, solution and transaction out, and
//! the lock snapshot describing the result.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::Config;
use crate::json::{LockAlias, RootManifest};
use crate::lock::{LockSnapshot, LockStorage, Locker};
use crate::package::Package;
use crate::solver::{Policy, Pool, Request, Solution, Solver, Transaction};
use crate::util::is_platform_package;
use crate::{Error, Result};

/// How the previous lock constrains a new resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Locked packages are fixed
    Install,
    /// Locked packages may move, but are kept when possible
    Minimal,
    /// Locked packages only serve as the prior state for the transaction
    Full,
}

/// Outcome of a successful resolution.
#[derive(Debug)]
pub struct Resolution {
    pub solution: Solution,
    pub transaction: Transaction,
}

impl Resolution {
    pub fn packages(&self) -> &[Arc<Package>] {
        &self.solution.packages
    }
}

pub struct Resolver {
    config: Config,
    cancel: Arc<AtomicBool>,
}

impl Resolver {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Setting the returned flag makes a running `resolve` fail with
    /// [`Error::Cancelled`].
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Solve `request` against `pool` and diff the result against the
    /// request's prior packages.
    pub fn resolve(&self, pool: &Pool, request: &Request) -> Result<Resolution> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(Error::Cancelled);
        }

        let policy = self.policy(request);
        let solver = Solver::new(pool, &policy)
            .with_budget(self.config.budget())
            .with_cancel_flag(self.cancel_flag());

        let solution = solver.solve_decisions(request)?;

        let prior: Vec<Arc<Package>> = request
            .prior_packages()
            .into_iter()
            .map(Arc::new)
            .collect();
        let transaction = Transaction::from_packages(&prior, &solution.packages)?;

        log::info!(
            "Resolved {} packages: {} installs, {} updates, {} removals",
            solution.packages.len(),
            transaction.new_installs().count(),
            transaction.updates().count(),
            transaction.removals().count()
        );

        Ok(Resolution { solution, transaction })
    }

    fn policy(&self, request: &Request) -> Policy {
        let mut policy = Policy::from_request(request);
        if let Some(prefer_stable) = self.config.prefer_stable {
            policy = policy.prefer_stable(prefer_stable);
        }
        if let Some(prefer_lowest) = self.config.prefer_lowest {
            policy = policy.prefer_lowest(prefer_lowest);
        }
        policy
    }

    /// What to record in the lock file for `resolution`.
    ///
    /// Packages reachable from the non-dev root requirements are locked as
    /// `packages`, the rest as `packages-dev`.
    pub fn lock_snapshot(&self, resolution: &Resolution, request: &Request) -> LockSnapshot {
        let (packages, dev_packages) = split_dev_packages(resolution.packages(), request);

        let installed: HashSet<String> = resolution
            .packages()
            .iter()
            .map(|p| p.name.to_lowercase())
            .collect();
        let aliases = request
            .root_aliases
            .iter()
            .filter(|alias| installed.contains(&alias.package))
            .map(|alias| LockAlias {
                package: alias.package.clone(),
                version: alias.version.clone(),
                alias: alias.alias.clone(),
                alias_normalized: alias.alias_normalized.clone(),
            })
            .collect();

        let mut platform = indexmap::IndexMap::new();
        let mut platform_dev = indexmap::IndexMap::new();
        for require in request.requires.values() {
            if !is_platform_package(&require.name) {
                continue;
            }
            let target = if require.dev { &mut platform_dev } else { &mut platform };
            target.insert(require.name.clone(), require.constraint.clone());
        }

        LockSnapshot {
            packages,
            dev_packages: Some(dev_packages),
            aliases,
            minimum_stability: request.minimum_stability.as_str().to_string(),
            stability_flags: request
                .effective_stability_flags()
                .into_iter()
                .map(|(name, stability)| (name, stability.priority()))
                .collect(),
            prefer_stable: self.config.prefer_stable.unwrap_or(request.prefer_stable),
            prefer_lowest: self.config.prefer_lowest.unwrap_or(request.prefer_lowest),
            platform,
            platform_dev,
            platform_overrides: request.platform_overrides.clone(),
        }
    }

    /// Build the request for `manifest`, seeded from the lock according to
    /// `mode`. Without a lock this is the manifest's request as is.
    ///
    /// A stale lock is only logged here; use [`Resolver::check_fresh`] to
    /// treat it as an error.
    pub fn request_from_lock<S: LockStorage>(
        &self,
        locker: &Locker<S>,
        manifest: &RootManifest,
        mode: UpdateMode,
    ) -> Result<Request> {
        let mut request = manifest.to_request()?;
        request.ignore_platform_reqs = self.config.ignore_platform_reqs;
        if let Some(prefer_stable) = self.config.prefer_stable {
            request.prefer_stable = prefer_stable;
        }
        if let Some(prefer_lowest) = self.config.prefer_lowest {
            request.prefer_lowest = prefer_lowest;
        }

        if !locker.is_locked()? {
            log::debug!("No lock file present, resolving from scratch");
            return Ok(request);
        }

        if mode == UpdateMode::Install && !locker.is_fresh()? {
            log::warn!("The lock file is not up to date with the latest changes in the manifest");
        }

        let locked = locker.get_locked_packages(true)?;
        log::debug!("Seeding request with {} locked packages ({:?})", locked.len(), mode);

        for package in locked {
            match mode {
                UpdateMode::Install => request.fix(package),
                UpdateMode::Minimal => request.fix_updatable(package),
                UpdateMode::Full => request.lock(package),
            }
        }

        Ok(request)
    }

    /// Fail with [`Error::StaleLock`] when the lock was written for a
    /// different manifest.
    pub fn check_fresh<S: LockStorage>(&self, locker: &Locker<S>) -> Result<()> {
        if locker.is_fresh()? {
            Ok(())
        } else {
            log::warn!("Lock file is stale");
            Err(Error::StaleLock)
        }
    }
}

/// Split installed packages into those needed by the non-dev root
/// requirements and the rest, keeping the input order in both.
fn split_dev_packages(packages: &[Arc<Package>], request: &Request) -> (Vec<Package>, Vec<Package>) {
    let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, package) in packages.iter().enumerate() {
        for name in package.names() {
            by_name.entry(name).or_default().push(index);
        }
    }

    let mut queue: VecDeque<String> = request
        .requires
        .iter()
        .filter(|(_, require)| !require.dev)
        .map(|(name, _)| name.clone())
        .collect();
    let mut reached = vec![false; packages.len()];

    while let Some(name) = queue.pop_front() {
        let Some(indices) = by_name.get(&name) else {
            continue;
        };
        for &index in indices {
            if reached[index] {
                continue;
            }
            reached[index] = true;
            queue.extend(packages[index].require.keys().map(|n| n.to_lowercase()));
        }
    }

    let mut main = Vec::new();
    let mut dev = Vec::new();
    for (index, package) in packages.iter().enumerate() {
        if reached[index] {
            main.push(package.as_ref().clone());
        } else {
            dev.push(package.as_ref().clone());
        }
    }
    (main, dev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MemoryStorage;
    use crate::solver::PoolBuilder;
    use crate::InvariantViolation;

    const MANIFEST: &str = r#"{
        "name": "acme/app",
        "require": {"php": ">=8.1", "vendor/a": "^1.0"},
        "require-dev": {"vendor/test": "^1.0"},
        "config": {"platform": {"php": "8.2.0"}}
    }"#;

    fn package(name: &str, version: &str, requires: &[(&str, &str)]) -> Package {
        let mut package = Package::new(name, version);
        for (dep, constraint) in requires {
            package.require.insert(dep.to_string(), constraint.to_string());
        }
        package
    }

    fn packages() -> Vec<Package> {
        vec![
            package("vendor/a", "1.0.0", &[("vendor/b", "^1.0"), ("php", ">=8.0")]),
            package("vendor/a", "1.1.0", &[("vendor/b", "^1.0"), ("php", ">=8.0")]),
            package("vendor/b", "1.0.0", &[]),
            package("vendor/b", "1.2.0", &[]),
            package("vendor/test", "1.0.0", &[("vendor/b", "^1.0"), ("vendor/mock", "*")]),
            package("vendor/mock", "2.0.0", &[]),
        ]
    }

    fn pool_for(request: &Request) -> Pool {
        PoolBuilder::new()
            .for_request(request)
            .add_packages_from_repo(packages(), "main")
            .build()
    }

    fn manifest_request() -> Request {
        let manifest = RootManifest::from_str(MANIFEST).unwrap();
        let mut request = manifest.to_request().unwrap();
        request.platform("php", "8.2.0");
        request
    }

    fn versions(packages: &[Package]) -> Vec<String> {
        packages.iter().map(|p| p.pretty_string()).collect()
    }

    #[test]
    fn test_resolve_fresh_project() {
        let request = manifest_request();
        let pool = pool_for(&request);
        let resolver = Resolver::new(Config::default());

        let resolution = resolver.resolve(&pool, &request).unwrap();
        let names: Vec<_> = resolution.packages().iter().map(|p| p.pretty_string()).collect();
        assert_eq!(
            names,
            vec!["vendor/a 1.1.0", "vendor/b 1.2.0", "vendor/mock 2.0.0", "vendor/test 1.0.0"]
        );
        assert_eq!(resolution.transaction.new_installs().count(), 4);
        assert_eq!(resolution.transaction.operations[0].name(), "vendor/b");
    }

    #[test]
    fn test_lock_snapshot_splits_dev_packages() {
        let request = manifest_request();
        let pool = pool_for(&request);
        let resolver = Resolver::new(Config::default());
        let resolution = resolver.resolve(&pool, &request).unwrap();

        let snapshot = resolver.lock_snapshot(&resolution, &request);
        assert_eq!(versions(&snapshot.packages), vec!["vendor/a 1.1.0", "vendor/b 1.2.0"]);
        assert_eq!(
            versions(snapshot.dev_packages.as_deref().unwrap()),
            vec!["vendor/mock 2.0.0", "vendor/test 1.0.0"]
        );
        assert_eq!(snapshot.platform.get("php").map(String::as_str), Some(">=8.1"));
        assert!(snapshot.platform_dev.is_empty());
        assert_eq!(snapshot.minimum_stability, "stable");
        assert_eq!(snapshot.platform_overrides.len(), 1);
    }

    #[test]
    fn test_resolution_is_reproducible() {
        let resolver = Resolver::new(Config::default());
        let lock_for = || {
            let request = manifest_request();
            let pool = pool_for(&request);
            let resolution = resolver.resolve(&pool, &request).unwrap();
            let mut locker = Locker::new(MemoryStorage::new(), MANIFEST);
            locker.set_lock_data(resolver.lock_snapshot(&resolution, &request)).unwrap();
            crate::lock::to_pretty_json(&locker.get_lock_data().unwrap()).unwrap()
        };

        assert_eq!(lock_for(), lock_for());
    }

    fn locked_locker() -> Locker<MemoryStorage> {
        let resolver = Resolver::new(Config::default());
        let mut request = manifest_request();
        request.requires["vendor/a"].constraint = "1.0.0".to_string();
        request.requires["vendor/test"].constraint = "1.0.0".to_string();
        let pool = pool_for(&request);
        let resolution = resolver.resolve(&pool, &request).unwrap();

        let mut locker = Locker::new(MemoryStorage::new(), MANIFEST);
        let mut snapshot = resolver.lock_snapshot(&resolution, &request);
        // Pin b to the older release as if it had been locked earlier
        for package in &mut snapshot.packages {
            if package.name == "vendor/b" {
                *package = Package::new("vendor/b", "1.0.0");
            }
        }
        locker.set_lock_data(snapshot).unwrap();
        locker
    }

    #[test]
    fn test_install_from_lock_is_idempotent() {
        let locker = locked_locker();
        let resolver = Resolver::new(Config::default());
        let manifest = RootManifest::from_str(MANIFEST).unwrap();

        let mut request = resolver
            .request_from_lock(&locker, &manifest, UpdateMode::Install)
            .unwrap();
        request.platform("php", "8.2.0");
        assert_eq!(request.fixed_packages.len(), 4);

        let pool = pool_for(&request);
        let resolution = resolver.resolve(&pool, &request).unwrap();
        let names: Vec<_> = resolution.packages().iter().map(|p| p.pretty_string()).collect();
        assert_eq!(
            names,
            vec!["vendor/a 1.0.0", "vendor/b 1.0.0", "vendor/mock 2.0.0", "vendor/test 1.0.0"]
        );
        assert!(resolution.transaction.is_empty());
    }

    #[test]
    fn test_minimal_update_keeps_locked_versions() {
        let locker = locked_locker();
        let resolver = Resolver::new(Config::default());
        let manifest = RootManifest::from_str(MANIFEST).unwrap();

        let mut request = resolver
            .request_from_lock(&locker, &manifest, UpdateMode::Minimal)
            .unwrap();
        request.platform("php", "8.2.0");
        assert_eq!(request.updatable_packages.len(), 4);

        let pool = pool_for(&request);
        let resolution = resolver.resolve(&pool, &request).unwrap();
        assert_eq!(resolution.solution.package("vendor/b").unwrap().pretty_version(), "1.0.0");
        assert_eq!(resolution.solution.package("vendor/a").unwrap().pretty_version(), "1.0.0");
    }

    #[test]
    fn test_full_update_moves_to_newest() {
        let locker = locked_locker();
        let resolver = Resolver::new(Config::default());
        let manifest = RootManifest::from_str(MANIFEST).unwrap();

        let mut request = resolver
            .request_from_lock(&locker, &manifest, UpdateMode::Full)
            .unwrap();
        request.platform("php", "8.2.0");
        assert!(request.fixed_packages.is_empty());

        let pool = pool_for(&request);
        let resolution = resolver.resolve(&pool, &request).unwrap();
        let updates: Vec<_> = resolution
            .transaction
            .updates()
            .map(|(from, to)| format!("{} => {}", from.pretty_string(), to.pretty_version()))
            .collect();
        assert_eq!(updates, vec!["vendor/b 1.0.0 => 1.2.0", "vendor/a 1.0.0 => 1.1.0"]);
    }

    #[test]
    fn test_request_without_lock() {
        let resolver = Resolver::new(Config::default());
        let manifest = RootManifest::from_str(MANIFEST).unwrap();
        let locker = Locker::new(MemoryStorage::new(), MANIFEST);

        let request = resolver
            .request_from_lock(&locker, &manifest, UpdateMode::Install)
            .unwrap();
        assert!(request.fixed_packages.is_empty());
        assert!(request.locked_packages.is_empty());
    }

    #[test]
    fn test_check_fresh() {
        let resolver = Resolver::new(Config::default());
        let locker = locked_locker();
        assert!(resolver.check_fresh(&locker).is_ok());

        let changed = MANIFEST.replace("^1.0\"}", "^2.0\"}");
        let locker = Locker::new(locker.into_storage(), changed);
        assert!(matches!(resolver.check_fresh(&locker), Err(Error::StaleLock)));

        let empty = Locker::new(MemoryStorage::new(), MANIFEST);
        assert!(matches!(
            resolver.check_fresh(&empty),
            Err(Error::InputInvariant(InvariantViolation::NotLocked))
        ));
    }

    #[test]
    fn test_cancelled_resolution_leaves_lock_untouched() {
        let locker = locked_locker();
        let before = locker.get_lock_data().unwrap();

        let resolver = Resolver::new(Config::default());
        let request = manifest_request();
        let pool = pool_for(&request);
        let pool_size = pool.len();

        resolver.cancel_flag().store(true, Ordering::SeqCst);
        assert!(matches!(resolver.resolve(&pool, &request), Err(Error::Cancelled)));

        assert_eq!(pool.len(), pool_size);
        assert_eq!(locker.get_lock_data().unwrap(), before);
        assert_eq!(locker.storage().writes(), 1);
    }

    #[test]
    fn test_config_overrides_preferences() {
        let config = Config {
            prefer_lowest: Some(true),
            ..Config::default()
        };
        let resolver = Resolver::new(config);
        let request = manifest_request();
        let pool = pool_for(&request);

        let resolution = resolver.resolve(&pool, &request).unwrap();
        assert_eq!(resolution.solution.package("vendor/a").unwrap().pretty_version(), "1.0.0");
        assert!(resolver.lock_snapshot(&resolution, &request).prefer_lowest);
    }

    #[test]
    fn test_unsatisfiable_request() {
        let resolver = Resolver::new(Config::default());
        let mut request = manifest_request();
        request.require("vendor/a", "^3.0");
        let pool = pool_for(&request);

        let err = resolver.resolve(&pool, &request).unwrap_err();
        let problems = err.problems().unwrap();
        assert_eq!(problems.len(), 1);
        assert!(problems.describe().contains("vendor/a ^3.0"));
    }

    fn two_package_manifest(pkg1: &str, minimum_stability: &str) -> String {
        format!(
            r#"{{"name": "acme/app", "require": {{"pkg1": "{}", "pkg2": "^0.1"}}, "minimum-stability": "{}"}}"#,
            pkg1, minimum_stability
        )
    }

    fn two_package_pool(request: &Request) -> Pool {
        PoolBuilder::new()
            .for_request(request)
            .add_packages_from_repo(
                vec![Package::new("pkg1", "1.0.0-beta"), Package::new("pkg2", "0.1.10")],
                "main",
            )
            .build()
    }

    #[test]
    fn test_two_package_example_is_locked() {
        let mut pool = Pool::new();
        pool.add_package(Package::new("pkg1", "1.0.0-beta"));
        pool.add_package(Package::new("pkg2", "0.1.10"));

        let mut request = Request::new();
        request.require("pkg1", "^1.0");
        request.require("pkg2", "^0.1");

        let resolver = Resolver::new(Config::default());
        let resolution = resolver.resolve(&pool, &request).unwrap();

        let decided: Vec<_> = resolution.packages().iter().map(|p| p.pretty_string()).collect();
        assert_eq!(decided, vec!["pkg1 1.0.0-beta", "pkg2 0.1.10"]);
        assert_eq!(resolution.transaction.new_installs().count(), 2);

        let manifest = r#"{"require": {"pkg1": "^1.0", "pkg2": "^0.1"}}"#;
        let mut locker = Locker::new(MemoryStorage::new(), manifest);
        assert!(locker.set_lock_data(resolver.lock_snapshot(&resolution, &request)).unwrap());
        assert!(locker.is_locked().unwrap());
        assert!(locker.is_fresh().unwrap());

        let lock = locker.get_lock_data().unwrap();
        let locked: Vec<(String, String)> = lock
            .packages
            .unwrap()
            .into_iter()
            .map(|p| (p.name, p.version))
            .collect();
        assert_eq!(
            locked,
            vec![
                ("pkg1".to_string(), "1.0.0-beta".to_string()),
                ("pkg2".to_string(), "0.1.10".to_string()),
            ]
        );
        assert_eq!(lock.packages_dev, Some(vec![]));
    }

    #[test]
    fn test_beta_filtered_at_stable_minimum() {
        let manifest = RootManifest::from_str(&two_package_manifest("^1.0", "stable")).unwrap();
        let request = manifest.to_request().unwrap();
        let pool = two_package_pool(&request);

        let err = Resolver::new(Config::default()).resolve(&pool, &request).unwrap_err();
        let problems = err.problems().unwrap();
        assert!(problems
            .describe()
            .contains("pkg1 ^1.0 -> found pkg1[1.0.0-beta] but it does not match your minimum-stability"));
    }

    #[test]
    fn test_beta_accepted_by_flag_or_minimum() {
        for (pkg1, minimum_stability) in [("^1.0@beta", "stable"), ("^1.0", "beta")] {
            let manifest = RootManifest::from_str(&two_package_manifest(pkg1, minimum_stability)).unwrap();
            let request = manifest.to_request().unwrap();
            let pool = two_package_pool(&request);

            let resolution = Resolver::new(Config::default()).resolve(&pool, &request).unwrap();
            let decided: Vec<_> = resolution.packages().iter().map(|p| p.pretty_string()).collect();
            assert_eq!(decided, vec!["pkg1 1.0.0-beta", "pkg2 0.1.10"], "{} at {}", pkg1, minimum_stability);
        }
    }

    #[test]
    fn test_circular_requires_are_locked() {
        let mut request = Request::new();
        request.require("a", "*");
        let pool = PoolBuilder::new()
            .for_request(&request)
            .add_package(package("a", "1.0.0", &[("b", "*")]))
            .add_package(package("b", "1.0.0", &[("a", "*")]))
            .build();

        let resolver = Resolver::new(Config::default());
        let resolution = resolver.resolve(&pool, &request).unwrap();
        let operations: Vec<_> = resolution.transaction.operations.iter().map(|op| op.to_string()).collect();
        assert_eq!(operations, vec!["Installing a (1.0.0)", "Installing b (1.0.0)"]);

        let mut locker = Locker::new(MemoryStorage::new(), r#"{"require": {"a": "*"}}"#);
        locker.set_lock_data(resolver.lock_snapshot(&resolution, &request)).unwrap();
        assert_eq!(versions(&locker.get_locked_packages(false).unwrap()), vec!["a 1.0.0", "b 1.0.0"]);
    }
}
