use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use lockstep_semver::{compare_versions, Constraint, Operator, Stability, VersionParser};

use super::policy::Policy;
use super::request::{Request, RootAlias};
use crate::package::{AliasPackage, Package};
use crate::util::is_platform_package;

/// Identifier of a pool entry. Used directly as a positive SAT literal.
pub type PackageId = i32;

/// Repository name given to platform facts
pub const PLATFORM_REPO: &str = "platform";

/// Represents an entry in the pool - either a regular package or an alias
#[derive(Debug, Clone)]
pub enum PoolEntry {
    Package(Arc<Package>),
    Alias(Arc<AliasPackage>),
}

impl PoolEntry {
    pub fn name(&self) -> &str {
        match self {
            PoolEntry::Package(p) => p.name(),
            PoolEntry::Alias(a) => a.name(),
        }
    }

    /// Normalized version
    pub fn version(&self) -> &str {
        match self {
            PoolEntry::Package(p) => p.version(),
            PoolEntry::Alias(a) => a.version(),
        }
    }

    pub fn pretty_version(&self) -> &str {
        match self {
            PoolEntry::Package(p) => p.pretty_version(),
            PoolEntry::Alias(a) => a.pretty_version(),
        }
    }

    pub fn pretty_string(&self) -> String {
        format!("{} {}", self.name(), self.pretty_version())
    }

    pub fn stability(&self) -> Stability {
        match self {
            PoolEntry::Package(p) => p.stability(),
            PoolEntry::Alias(a) => a.stability(),
        }
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, PoolEntry::Alias(_))
    }

    pub fn as_alias(&self) -> Option<&Arc<AliasPackage>> {
        match self {
            PoolEntry::Alias(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_package(&self) -> Option<&Arc<Package>> {
        match self {
            PoolEntry::Package(p) => Some(p),
            _ => None,
        }
    }

    /// The concrete package behind this entry
    pub fn base_package(&self) -> &Arc<Package> {
        match self {
            PoolEntry::Package(p) => p,
            PoolEntry::Alias(a) => a.alias_of(),
        }
    }

    pub fn require(&self) -> &IndexMap<String, String> {
        match self {
            PoolEntry::Package(p) => &p.require,
            PoolEntry::Alias(a) => a.require(),
        }
    }

    pub fn conflict(&self) -> &IndexMap<String, String> {
        match self {
            PoolEntry::Package(p) => &p.conflict,
            PoolEntry::Alias(a) => a.conflict(),
        }
    }

    pub fn provide(&self) -> &IndexMap<String, String> {
        match self {
            PoolEntry::Package(p) => &p.provide,
            PoolEntry::Alias(a) => a.provide(),
        }
    }

    pub fn replace(&self) -> &IndexMap<String, String> {
        match self {
            PoolEntry::Package(p) => &p.replace,
            PoolEntry::Alias(a) => a.replace(),
        }
    }

    /// Constraint under which this entry provides or replaces `name`
    fn provided_constraint(&self, name: &str) -> Option<&str> {
        self.provide()
            .iter()
            .chain(self.replace())
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether this entry replaces `name`
    pub fn replaces(&self, name: &str) -> bool {
        self.replace().keys().any(|k| k.eq_ignore_ascii_case(name))
    }
}

/// Why the builder left a package out of the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterReason {
    /// Less stable than the minimum stability or its stability flag allows
    Stability,
    /// Requires a platform package that is not present
    MissingPlatform(String),
}

/// A package the builder dropped, kept for problem reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredPackage {
    /// Normalized version
    pub version: String,
    pub pretty_version: String,
    pub reason: FilterReason,
}

/// Pool of all candidate packages for one resolution run.
///
/// Ids are 1-based and dense. Entries of one name are kept ordered by
/// version, highest first, so iteration order is deterministic.
pub struct Pool {
    entries: Vec<PoolEntry>,

    /// Package IDs indexed by lowercase name
    packages_by_name: HashMap<String, Vec<PackageId>>,

    /// Packages indexed by what they provide or replace
    providers: HashMap<String, Vec<PackageId>>,

    /// Priority of repositories (lower = preferred)
    priorities: HashMap<String, i32>,

    /// Repository name for each package
    package_repos: HashMap<PackageId, String>,

    /// Parsed constraints, `None` when a constraint failed to parse
    parsed_constraints: RefCell<HashMap<String, Option<Constraint>>>,

    /// Alias id -> base id
    alias_map: HashMap<PackageId, PackageId>,

    /// Packages dropped by the builder, by lowercase name
    filtered: HashMap<String, Vec<FilteredPackage>>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("entries", &self.entries)
            .field("packages_by_name", &self.packages_by_name)
            .field("providers", &self.providers)
            .field("priorities", &self.priorities)
            .field("package_repos", &self.package_repos)
            .field("alias_map", &self.alias_map)
            .field("filtered", &self.filtered)
            .finish()
    }
}

impl Pool {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            packages_by_name: HashMap::new(),
            providers: HashMap::new(),
            priorities: HashMap::new(),
            package_repos: HashMap::new(),
            parsed_constraints: RefCell::new(HashMap::new()),
            alias_map: HashMap::new(),
            filtered: HashMap::new(),
        }
    }

    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Add a package to the pool, returning its ID
    pub fn add_package(&mut self, package: Package) -> PackageId {
        self.add_package_from_repo(package, None)
    }

    /// Add a package to the pool from a specific repository, returning its ID
    pub fn add_package_from_repo(&mut self, package: Package, repo_name: Option<&str>) -> PackageId {
        let id = self.push_entry(PoolEntry::Package(Arc::new(package)));
        if let Some(repo) = repo_name {
            self.package_repos.insert(id, repo.to_string());
        }
        id
    }

    /// Add an alias package. The base package must already be in the pool
    /// for the alias relationship to be tracked.
    pub fn add_alias(&mut self, alias: AliasPackage) -> PackageId {
        let base_id = self.find_package_id(alias.alias_of().name(), alias.alias_of().version());
        let id = self.push_entry(PoolEntry::Alias(Arc::new(alias)));

        if let Some(base_id) = base_id {
            self.alias_map.insert(id, base_id);
            if let Some(repo) = self.package_repos.get(&base_id).cloned() {
                self.package_repos.insert(id, repo);
            }
        }
        id
    }

    fn push_entry(&mut self, entry: PoolEntry) -> PackageId {
        let id = (self.entries.len() + 1) as PackageId;
        let name = entry.name().to_lowercase();

        for provided in entry.provide().keys().chain(entry.replace().keys()) {
            let ids = self.providers.entry(provided.to_lowercase()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let version = entry.version().to_string();
        self.entries.push(entry);

        let ids = self.packages_by_name.entry(name).or_default();
        let position = ids
            .iter()
            .position(|&other| {
                let other_version = self.entries[(other - 1) as usize].version();
                compare_versions(&version, other_version) == Ordering::Greater
            })
            .unwrap_or(ids.len());
        ids.insert(position, id);

        id
    }

    fn find_package_id(&self, name: &str, version: &str) -> Option<PackageId> {
        self.packages_by_name
            .get(&name.to_lowercase())?
            .iter()
            .copied()
            .find(|&id| {
                self.entry(id)
                    .map(|e| !e.is_alias() && e.version() == version)
                    .unwrap_or(false)
            })
    }

    pub fn entry(&self, id: PackageId) -> Option<&PoolEntry> {
        if id > 0 {
            self.entries.get((id - 1) as usize)
        } else {
            None
        }
    }

    pub fn is_alias(&self, id: PackageId) -> bool {
        self.entry(id).map(|e| e.is_alias()).unwrap_or(false)
    }

    pub fn get_alias_base(&self, id: PackageId) -> Option<PackageId> {
        self.alias_map.get(&id).copied()
    }

    /// Aliases of a package, in id order
    pub fn get_aliases(&self, base_id: PackageId) -> Vec<PackageId> {
        let mut aliases: Vec<_> = self
            .alias_map
            .iter()
            .filter(|(_, &base)| base == base_id)
            .map(|(&alias_id, _)| alias_id)
            .collect();
        aliases.sort_unstable();
        aliases
    }

    /// The concrete package for an id. Aliases resolve to their base.
    pub fn package(&self, id: PackageId) -> Option<&Arc<Package>> {
        self.entry(id).map(PoolEntry::base_package)
    }

    /// Look up the id of an exact (name, normalized version) pair
    pub fn id_of(&self, name: &str, version: &str) -> Option<PackageId> {
        self.find_package_id(name, version)
    }

    /// All entries with the given name, highest version first
    pub fn packages_by_name(&self, name: &str) -> Vec<PackageId> {
        self.packages_by_name
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Remember that `package` was kept out of the pool
    pub fn add_filtered(&mut self, package: &Package, reason: FilterReason) {
        self.filtered
            .entry(package.name.to_lowercase())
            .or_default()
            .push(FilteredPackage {
                version: package.version.clone(),
                pretty_version: package.pretty_version().to_string(),
                reason,
            });
    }

    /// Packages named `name` that the builder dropped, in input order
    pub fn filtered(&self, name: &str) -> &[FilteredPackage] {
        self.filtered
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether anything in the pool answers to `name`
    pub fn exists(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.packages_by_name.contains_key(&name) || self.providers.contains_key(&name)
    }

    /// Entries named `name` whose version satisfies `constraint`, highest
    /// version first. Providers and replacers are not included.
    pub fn query(&self, name: &str, constraint: &Constraint) -> Vec<PackageId> {
        self.packages_by_name(name)
            .into_iter()
            .filter(|&id| {
                self.entry(id)
                    .map(|e| constraint.matches_version(e.version()))
                    .unwrap_or(false)
            })
            .collect()
    }

    /// Find every entry that can satisfy a requirement on `name`.
    ///
    /// Direct matches come first (highest version first), followed by
    /// providers and replacers ordered by name then version. A constraint
    /// that cannot be parsed matches nothing.
    pub fn what_provides(&self, name: &str, constraint: Option<&str>) -> Vec<PackageId> {
        let required = match constraint {
            None => Constraint::Any,
            Some(text) => match self.parse_constraint(text) {
                Some(c) => c,
                None => {
                    log::warn!("Could not parse constraint {:?} for {}, nothing will match it", text, name);
                    return Vec::new();
                }
            },
        };

        let name_lower = name.to_lowercase();
        let mut result = self.query(&name_lower, &required);

        let Some(provider_ids) = self.providers.get(&name_lower) else {
            return result;
        };

        let mut providers: Vec<PackageId> = provider_ids
            .iter()
            .copied()
            .filter(|id| !result.contains(id))
            .filter(|&id| {
                let Some(entry) = self.entry(id) else {
                    return false;
                };
                match self.provided_constraint(entry, &name_lower) {
                    Some(provided) => required.matches(&provided),
                    None => false,
                }
            })
            .collect();

        providers.sort_by(|&a, &b| {
            let (ea, eb) = (&self.entries[(a - 1) as usize], &self.entries[(b - 1) as usize]);
            ea.name()
                .to_lowercase()
                .cmp(&eb.name().to_lowercase())
                .then_with(|| compare_versions(eb.version(), ea.version()))
                .then_with(|| a.cmp(&b))
        });

        result.extend(providers);
        result
    }

    /// Constraint an entry provides `name` at. `self.version` means the
    /// entry's own version; bare versions are treated as exact matches.
    fn provided_constraint(&self, entry: &PoolEntry, name: &str) -> Option<Constraint> {
        let text = entry.provided_constraint(name)?.trim();
        if text == "self.version" {
            return Some(Constraint::single(Operator::Equal, entry.version()));
        }
        if let Some(parsed) = self.parse_constraint(text) {
            return Some(parsed);
        }
        match VersionParser::new().normalize(text) {
            Ok(version) => Some(Constraint::single(Operator::Equal, version)),
            Err(_) => {
                log::debug!("Ignoring unparsable provide/replace {:?} of {}", text, entry.pretty_string());
                None
            }
        }
    }

    /// Whether a required constraint text accepts `version`
    pub fn constraint_matches(&self, constraint: &str, version: &str) -> bool {
        self.parse_constraint(constraint)
            .map(|c| c.matches_version(version))
            .unwrap_or(false)
    }

    fn parse_constraint(&self, text: &str) -> Option<Constraint> {
        if let Some(cached) = self.parsed_constraints.borrow().get(text) {
            return cached.clone();
        }
        let parsed = VersionParser::new().parse_constraints(text).ok();
        self.parsed_constraints
            .borrow_mut()
            .insert(text.to_string(), parsed.clone());
        parsed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert a literal to its package ID (absolute value)
    pub fn literal_to_id(literal: i32) -> PackageId {
        literal.abs()
    }

    /// Check if a literal represents "install" (positive)
    pub fn literal_is_positive(literal: i32) -> bool {
        literal > 0
    }

    /// Create an "install" or "don't install" literal for a package
    pub fn id_to_literal(id: PackageId, install: bool) -> i32 {
        if install {
            id
        } else {
            -id
        }
    }

    pub fn all_package_ids(&self) -> impl Iterator<Item = PackageId> {
        1..=self.entries.len() as PackageId
    }

    /// Set repository priority (lower = preferred)
    pub fn set_priority(&mut self, repo_name: &str, priority: i32) {
        self.priorities.insert(repo_name.to_string(), priority);
    }

    pub fn priority(&self, id: PackageId) -> i32 {
        self.package_repos
            .get(&id)
            .and_then(|repo| self.priorities.get(repo))
            .copied()
            .unwrap_or(0)
    }

    pub fn repository(&self, id: PackageId) -> Option<&str> {
        self.package_repos.get(&id).map(|s| s.as_str())
    }

    pub fn is_platform(&self, id: PackageId) -> bool {
        self.entry(id)
            .map(|e| is_platform_package(e.name()))
            .unwrap_or(false)
    }

    /// Human-readable form of a literal, e.g. `vendor/a 1.0.0` or
    /// `don't install vendor/a 1.0.0`
    pub fn literal_to_string(&self, literal: i32) -> String {
        let package = self
            .entry(literal.abs())
            .map(|e| e.pretty_string())
            .unwrap_or_else(|| format!("#{}", literal.abs()));
        if literal > 0 {
            format!("install {}", package)
        } else {
            format!("don't install {}", package)
        }
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing a filtered Pool.
///
/// The builder only holds plain data so it can be filled from async
/// repository loading and turned into a `Pool` afterwards.
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    packages: Vec<(Package, Option<String>)>,
    priorities: Vec<(String, i32)>,
    minimum_stability: Stability,
    stability_flags: IndexMap<String, Stability>,
    /// `None` disables the platform presence filter
    platform: Option<IndexMap<String, String>>,
    ignore_platform_reqs: bool,
    root_aliases: Vec<RootAlias>,
    /// (name, version) pairs exempt from stability filtering
    pinned: HashSet<(String, String)>,
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self {
            packages: Vec::new(),
            priorities: Vec::new(),
            minimum_stability: Stability::Dev,
            stability_flags: IndexMap::new(),
            platform: None,
            ignore_platform_reqs: false,
            root_aliases: Vec::new(),
            pinned: HashSet::new(),
        }
    }

    /// Take stability policy, platform facts and aliases from a request
    pub fn for_request(mut self, request: &Request) -> Self {
        self.minimum_stability = request.minimum_stability;
        self.stability_flags = request.effective_stability_flags();
        self.platform = Some(request.platform.clone());
        self.ignore_platform_reqs = request.ignore_platform_reqs;
        self.root_aliases = request.root_aliases.clone();
        self.pinned = request
            .fixed_packages
            .iter()
            .chain(&request.updatable_packages)
            .map(|p| (p.name.to_lowercase(), p.version.clone()))
            .collect();
        self
    }

    pub fn add_package(mut self, package: Package) -> Self {
        self.packages.push((package, None));
        self
    }

    pub fn add_package_from_repo(mut self, package: Package, repo_name: &str) -> Self {
        self.packages.push((package, Some(repo_name.to_string())));
        self
    }

    pub fn add_packages(mut self, packages: impl IntoIterator<Item = Package>) -> Self {
        self.packages.extend(packages.into_iter().map(|p| (p, None)));
        self
    }

    pub fn add_packages_from_repo(mut self, packages: impl IntoIterator<Item = Package>, repo_name: &str) -> Self {
        self.packages
            .extend(packages.into_iter().map(|p| (p, Some(repo_name.to_string()))));
        self
    }

    pub fn set_priority(mut self, repo_name: &str, priority: i32) -> Self {
        self.priorities.push((repo_name.to_string(), priority));
        self
    }

    pub fn minimum_stability(mut self, stability: Stability) -> Self {
        self.minimum_stability = stability;
        self
    }

    pub fn stability_flag(mut self, name: &str, stability: Stability) -> Self {
        self.stability_flags.insert(name.to_lowercase(), stability);
        self
    }

    pub fn platform(mut self, name: &str, version: &str) -> Self {
        self.platform
            .get_or_insert_with(IndexMap::new)
            .insert(name.to_lowercase(), version.to_string());
        self
    }

    pub fn ignore_platform_reqs(mut self, ignore: bool) -> Self {
        self.ignore_platform_reqs = ignore;
        self
    }

    pub fn root_alias(mut self, alias: RootAlias) -> Self {
        self.root_aliases.push(alias);
        self
    }

    /// Build the pool, dropping duplicates, packages below their stability
    /// floor and packages that need platform packages that are not present.
    pub fn build(mut self) -> Pool {
        let mut pool = Pool::new();
        for (repo, priority) in &self.priorities {
            pool.set_priority(repo, *priority);
        }

        let mut seen = HashSet::new();
        let mut dropped_stability = 0usize;
        let mut dropped_platform = 0usize;

        for (package, repo) in std::mem::take(&mut self.packages) {
            let key = (package.name.to_lowercase(), package.version.clone());
            if !seen.insert(key.clone()) {
                log::debug!("Skipping duplicate {} from {}", package.pretty_string(), repo.as_deref().unwrap_or("unknown repository"));
                continue;
            }

            if !package.is_platform()
                && !self.pinned.contains(&key)
                && !Policy::is_stability_acceptable(&package, self.minimum_stability, &self.stability_flags)
            {
                pool.add_filtered(&package, FilterReason::Stability);
                dropped_stability += 1;
                continue;
            }

            if let Some(missing) = self.missing_platform_package(&package) {
                log::debug!("Skipping {}: platform package {} is not available", package.pretty_string(), missing);
                let reason = FilterReason::MissingPlatform(missing.to_string());
                pool.add_filtered(&package, reason);
                dropped_platform += 1;
                continue;
            }

            pool.add_package_from_repo(package, repo.as_deref());
        }

        if let Some(platform) = &self.platform {
            for (name, version) in platform {
                if seen.insert((name.clone(), version.clone())) {
                    pool.add_package_from_repo(Package::new(name.as_str(), version.as_str()), Some(PLATFORM_REPO));
                }
            }
        }

        for alias in &self.root_aliases {
            let Some(base_id) = pool.id_of(&alias.package, &alias.version) else {
                log::debug!("Root alias target {} {} is not in the pool", alias.package, alias.version);
                continue;
            };
            let Some(base) = pool.entry(base_id).and_then(|e| e.as_package()).cloned() else {
                continue;
            };
            pool.add_alias(AliasPackage::new(base, alias.alias_normalized.clone(), alias.alias.clone()));
        }

        log::debug!(
            "Pool built with {} entries ({} dropped by stability, {} by platform)",
            pool.len(),
            dropped_stability,
            dropped_platform
        );

        pool
    }

    /// First platform requirement of `package` with no matching fact.
    /// `lib-*` requirements are not checked here.
    fn missing_platform_package<'p>(&self, package: &'p Package) -> Option<&'p str> {
        if self.ignore_platform_reqs {
            return None;
        }
        let platform = self.platform.as_ref()?;
        package
            .platform_requirements()
            .map(|(name, _)| name.as_str())
            .find(|name| {
                let lower = name.to_lowercase();
                !lower.starts_with("lib-") && !platform.contains_key(&lower)
            })
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_add_package() {
        let mut pool = Pool::new();
        let id = pool.add_package(Package::new("vendor/package", "1.0.0"));

        assert_eq!(id, 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.package(id).unwrap().name, "vendor/package");
        assert!(pool.entry(0).is_none());
        assert!(pool.entry(2).is_none());
    }

    #[test]
    fn test_packages_by_name_version_descending() {
        let mut pool = Pool::new();
        let v1 = pool.add_package(Package::new("vendor/package", "1.0.0"));
        let v3 = pool.add_package(Package::new("vendor/package", "3.0.0"));
        let v2 = pool.add_package(Package::new("Vendor/Package", "2.0.0"));
        pool.add_package(Package::new("vendor/other", "1.0.0"));

        assert_eq!(pool.packages_by_name("vendor/package"), vec![v3, v2, v1]);
        assert!(pool.exists("VENDOR/package"));
        assert!(!pool.exists("vendor/missing"));
    }

    #[test]
    fn test_query() {
        let mut pool = Pool::new();
        pool.add_package(Package::new("php", "8.4.0"));
        pool.add_package(Package::new("php", "8.2.0"));
        pool.add_package(Package::new("php", "7.4.0"));

        let constraint = VersionParser::new().parse_constraints(">=8.0").unwrap();
        let versions: Vec<_> = pool
            .query("php", &constraint)
            .into_iter()
            .map(|id| pool.entry(id).unwrap().pretty_version().to_string())
            .collect();
        assert_eq!(versions, vec!["8.4.0", "8.2.0"]);
    }

    #[test]
    fn test_constraint_matching_semver() {
        let mut pool = Pool::new();
        pool.add_package(Package::new("vendor/pkg", "1.0.0"));
        pool.add_package(Package::new("vendor/pkg", "1.5.0"));
        pool.add_package(Package::new("vendor/pkg", "2.0.0"));

        assert_eq!(pool.what_provides("vendor/pkg", Some("^1.0")).len(), 2);
        assert_eq!(pool.what_provides("vendor/pkg", Some("~1.0")).len(), 2);
        assert_eq!(pool.what_provides("vendor/pkg", Some(">=2.0")).len(), 1);
        assert_eq!(pool.what_provides("vendor/pkg", Some("<2.0")).len(), 2);
        assert_eq!(pool.what_provides("vendor/pkg", Some("*")).len(), 3);
        assert_eq!(pool.what_provides("vendor/pkg", None).len(), 3);
    }

    #[test]
    fn test_unparsable_constraint_matches_nothing() {
        let mut pool = Pool::new();
        pool.add_package(Package::new("vendor/pkg", "1.0.0"));

        assert!(pool.what_provides("vendor/pkg", Some("~>1.0")).is_empty());
    }

    #[test]
    fn test_what_provides_direct_before_providers() {
        let mut pool = Pool::new();

        let mut provider = Package::new("vendor/impl", "1.0.0");
        provider.provide.insert("vendor/interface".to_string(), "1.0".to_string());
        let provider_id = pool.add_package(provider);
        let direct_id = pool.add_package(Package::new("vendor/interface", "1.0.0"));

        assert_eq!(pool.what_provides("vendor/interface", None), vec![direct_id, provider_id]);
    }

    #[test]
    fn test_provide_constraint_matching() {
        let mut pool = Pool::new();
        for version in ["1.0.0", "2.0.0", "3.0.0"] {
            let mut pkg = Package::new("monolog/monolog", version);
            pkg.provide.insert("psr/log-implementation".to_string(), version.to_string());
            pool.add_package(pkg);
        }

        let matches = pool.what_provides("psr/log-implementation", Some("^1.0"));
        assert_eq!(matches.len(), 1);
        assert_eq!(pool.package(matches[0]).unwrap().pretty_version(), "1.0.0");

        let matches = pool.what_provides("psr/log-implementation", Some(">=2.0"));
        let versions: Vec<_> = matches
            .iter()
            .map(|&id| pool.package(id).unwrap().pretty_version().to_string())
            .collect();
        assert_eq!(versions, vec!["3.0.0", "2.0.0"]);
    }

    #[test]
    fn test_replace_self_version() {
        let mut pool = Pool::new();
        let mut pkg = Package::new("symfony/symfony", "5.4.0");
        pkg.replace.insert("symfony/console".to_string(), "self.version".to_string());
        pool.add_package(pkg);

        assert_eq!(pool.what_provides("symfony/console", Some("^5.0")).len(), 1);
        assert!(pool.what_provides("symfony/console", Some("^6.0")).is_empty());
    }

    #[test]
    fn test_pool_add_alias() {
        let mut pool = Pool::new();
        let base_pkg = Package::new("vendor/package", "dev-main");
        let base_id = pool.add_package(base_pkg.clone());

        let alias = AliasPackage::new(Arc::new(base_pkg), "1.0.0.0".to_string(), "1.0.0".to_string());
        let alias_id = pool.add_alias(alias);

        assert!(pool.is_alias(alias_id));
        assert!(!pool.is_alias(base_id));
        assert_eq!(pool.get_alias_base(alias_id), Some(base_id));
        assert_eq!(pool.get_aliases(base_id), vec![alias_id]);
        assert_eq!(pool.package(alias_id).unwrap().version(), "dev-main");

        assert_eq!(pool.what_provides("vendor/package", Some("^1.0")), vec![alias_id]);
        assert_eq!(pool.what_provides("vendor/package", Some("dev-main")), vec![base_id]);
    }

    #[test]
    fn test_literal_operations() {
        assert_eq!(Pool::literal_to_id(5), 5);
        assert_eq!(Pool::literal_to_id(-5), 5);
        assert!(Pool::literal_is_positive(5));
        assert!(!Pool::literal_is_positive(-5));
        assert_eq!(Pool::id_to_literal(5, true), 5);
        assert_eq!(Pool::id_to_literal(5, false), -5);
    }

    #[test]
    fn test_builder_drops_duplicates() {
        let pool = Pool::builder()
            .add_package_from_repo(Package::new("vendor/a", "1.0.0"), "first")
            .add_package_from_repo(Package::new("vendor/a", "1.0"), "second")
            .add_package(Package::new("vendor/b", "1.0.0"))
            .build();

        assert_eq!(pool.len(), 2);
        assert_eq!(pool.repository(1), Some("first"));
    }

    #[test]
    fn test_builder_stability_filter() {
        let pool = Pool::builder()
            .minimum_stability(Stability::Stable)
            .stability_flag("vendor/b", Stability::Beta)
            .add_package(Package::new("vendor/a", "1.0.0"))
            .add_package(Package::new("vendor/a", "1.1.0-beta1"))
            .add_package(Package::new("vendor/b", "2.0.0-beta1"))
            .add_package(Package::new("vendor/b", "2.0.0-alpha1"))
            .build();

        assert_eq!(pool.packages_by_name("vendor/a").len(), 1);
        let b = pool.packages_by_name("vendor/b");
        assert_eq!(b.len(), 1);
        assert_eq!(pool.entry(b[0]).unwrap().pretty_version(), "2.0.0-beta1");
    }

    #[test]
    fn test_builder_platform_filter() {
        let pool = Pool::builder()
            .platform("php", "8.2.0")
            .add_package(Package::new("vendor/a", "1.0.0").with_require("php", ">=8.0"))
            .add_package(Package::new("vendor/a", "2.0.0").with_require("ext-intl", "*"))
            .add_package(Package::new("vendor/a", "3.0.0").with_require("lib-icu", ">=60"))
            .build();

        let versions: Vec<_> = pool
            .packages_by_name("vendor/a")
            .into_iter()
            .map(|id| pool.entry(id).unwrap().pretty_version().to_string())
            .collect();
        assert_eq!(versions, vec!["3.0.0", "1.0.0"]);
        assert_eq!(pool.packages_by_name("php").len(), 1);
        assert_eq!(pool.repository(pool.packages_by_name("php")[0]), Some(PLATFORM_REPO));

        let pool = Pool::builder()
            .platform("php", "8.2.0")
            .ignore_platform_reqs(true)
            .add_package(Package::new("vendor/a", "2.0.0").with_require("ext-intl", "*"))
            .build();
        assert_eq!(pool.packages_by_name("vendor/a").len(), 1);
    }

    #[test]
    fn test_builder_root_alias() {
        let pool = Pool::builder()
            .add_package(Package::new("vendor/a", "dev-main"))
            .root_alias(RootAlias {
                package: "vendor/a".to_string(),
                version: "dev-main".to_string(),
                alias: "1.0.x-dev".to_string(),
                alias_normalized: "1.0.9999999.9999999-dev".to_string(),
            })
            .build();

        assert_eq!(pool.len(), 2);
        let ids = pool.what_provides("vendor/a", Some("^1.0@dev"));
        assert_eq!(ids.len(), 1);
        assert!(pool.is_alias(ids[0]));
    }
}
