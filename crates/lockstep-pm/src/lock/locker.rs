use indexmap::IndexMap;
use serde_json::Value;

use super::hash::{content_hash, legacy_hash};
use super::storage::{LockGuard, LockStorage};
use crate::json::{LockAlias, LockFile, LockedPackage};
use crate::package::Package;
use crate::{InvariantViolation, Result, PLUGIN_API_VERSION};

/// Fixed preamble written at the top of every lock file. It is not part of
/// the content hash, so only the wording is ours.
pub const README: [&str; 3] = [
    "This file pins every dependency of the project to an exact version",
    "Regenerate it with `lockstep resolve` instead of editing it by hand",
    "This file is @generated automatically",
];

/// Plugin API version assumed for lock files that do not record one
const DEFAULT_PLUGIN_API: &str = "1.1.0";

/// Everything a successful resolution records in the lock file.
#[derive(Debug, Clone, PartialEq)]
pub struct LockSnapshot {
    pub packages: Vec<Package>,
    /// `None` when dev requirements were not resolved
    pub dev_packages: Option<Vec<Package>>,
    pub aliases: Vec<LockAlias>,
    pub minimum_stability: String,
    /// Package name to stability priority
    pub stability_flags: IndexMap<String, u8>,
    pub prefer_stable: bool,
    pub prefer_lowest: bool,
    pub platform: IndexMap<String, String>,
    pub platform_dev: IndexMap<String, String>,
    pub platform_overrides: IndexMap<String, Value>,
}

impl Default for LockSnapshot {
    fn default() -> Self {
        Self {
            packages: Vec::new(),
            dev_packages: Some(Vec::new()),
            aliases: Vec::new(),
            minimum_stability: "stable".to_string(),
            stability_flags: IndexMap::new(),
            prefer_stable: false,
            prefer_lowest: false,
            platform: IndexMap::new(),
            platform_dev: IndexMap::new(),
            platform_overrides: IndexMap::new(),
        }
    }
}

/// Reads and writes the lock record for one manifest.
pub struct Locker<S: LockStorage> {
    storage: S,
    manifest: String,
}

impl<S: LockStorage> Locker<S> {
    /// `manifest` is the raw content of the root manifest the lock belongs to.
    pub fn new(storage: S, manifest: impl Into<String>) -> Self {
        Self {
            storage,
            manifest: manifest.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Content hash of the current manifest
    pub fn content_hash(&self) -> Result<String> {
        content_hash(&self.manifest)
    }

    /// Whether a lock record exists and carries a package list.
    pub fn is_locked(&self) -> Result<bool> {
        if !self.storage.exists() {
            return Ok(false);
        }
        Ok(self.storage.read()?.has_packages())
    }

    /// Whether the stored record was written for the current manifest.
    pub fn is_fresh(&self) -> Result<bool> {
        let lock = self.storage.read()?;

        if let Some(hash) = lock.content_hash.as_deref().filter(|h| !h.is_empty()) {
            return Ok(self.content_hash()? == hash);
        }
        if let Some(hash) = lock.hash.as_deref().filter(|h| !h.is_empty()) {
            return Ok(legacy_hash(&self.manifest) == hash);
        }
        Ok(false)
    }

    /// The stored record. Fails with `NotLocked` when there is none.
    pub fn get_lock_data(&self) -> Result<LockFile> {
        if !self.storage.exists() {
            return Err(InvariantViolation::NotLocked.into());
        }
        self.storage.read()
    }

    /// Locked packages, including dev packages when `with_dev` is set.
    pub fn get_locked_packages(&self, with_dev: bool) -> Result<Vec<Package>> {
        let lock = self.get_lock_data()?;
        let Some(packages) = &lock.packages else {
            return Err(InvariantViolation::NotLocked.into());
        };

        let mut locked: Vec<Package> = packages.iter().map(Package::from).collect();
        if with_dev {
            locked.extend(lock.packages_dev.iter().flatten().map(Package::from));
        }
        Ok(locked)
    }

    pub fn get_minimum_stability(&self) -> Result<String> {
        Ok(self.get_lock_data()?.minimum_stability)
    }

    pub fn get_stability_flags(&self) -> Result<IndexMap<String, u8>> {
        Ok(self.get_lock_data()?.stability_flags)
    }

    pub fn get_prefer_stable(&self) -> Result<bool> {
        Ok(self.get_lock_data()?.prefer_stable)
    }

    pub fn get_prefer_lowest(&self) -> Result<bool> {
        Ok(self.get_lock_data()?.prefer_lowest)
    }

    /// Platform requirements recorded at lock time. Dev requirements are
    /// merged in when `with_dev` is set, without overriding non-dev ones.
    pub fn get_platform_requirements(&self, with_dev: bool) -> Result<IndexMap<String, String>> {
        let lock = self.get_lock_data()?;
        let mut requirements = lock.platform;
        if with_dev {
            for (name, constraint) in lock.platform_dev {
                requirements.entry(name).or_insert(constraint);
            }
        }
        Ok(requirements)
    }

    pub fn get_aliases(&self) -> Result<Vec<LockAlias>> {
        Ok(self.get_lock_data()?.aliases)
    }

    pub fn get_platform_overrides(&self) -> Result<IndexMap<String, Value>> {
        Ok(self.get_lock_data()?.platform_overrides)
    }

    pub fn get_plugin_api(&self) -> Result<String> {
        Ok(self
            .get_lock_data()?
            .plugin_api_version
            .unwrap_or_else(|| DEFAULT_PLUGIN_API.to_string()))
    }

    /// Hold the storage's critical section across a read-then-write cycle.
    pub fn lock_guard(&self) -> Result<LockGuard> {
        self.storage.lock_guard()
    }

    /// Build the record for `snapshot` and store it.
    ///
    /// Every package is validated before anything is written. Returns
    /// `false` when the identical record is already stored.
    pub fn set_lock_data(&mut self, snapshot: LockSnapshot) -> Result<bool> {
        let packages = lock_packages(&snapshot.packages)?;
        let packages_dev = snapshot
            .dev_packages
            .as_deref()
            .map(lock_packages)
            .transpose()?;

        let lock = LockFile {
            readme: README.iter().map(|line| line.to_string()).collect(),
            hash: None,
            content_hash: Some(self.content_hash()?),
            packages: Some(packages),
            packages_dev,
            aliases: snapshot.aliases,
            minimum_stability: snapshot.minimum_stability,
            stability_flags: snapshot.stability_flags,
            platform: snapshot.platform,
            platform_dev: snapshot.platform_dev,
            platform_overrides: snapshot.platform_overrides,
            prefer_stable: snapshot.prefer_stable,
            prefer_lowest: snapshot.prefer_lowest,
            plugin_api_version: Some(PLUGIN_API_VERSION.to_string()),
        };

        let unchanged = match self.is_locked() {
            Ok(true) => self.storage.read().map(|current| current == lock).unwrap_or(false),
            _ => false,
        };
        if unchanged {
            log::debug!("Lock file is already up to date");
            return Ok(false);
        }

        self.storage.write(&lock)?;
        log::info!(
            "Lock file written with {} packages",
            lock.all_packages().count()
        );
        Ok(true)
    }
}

/// Lock entries sorted by name, then version.
fn lock_packages(packages: &[Package]) -> Result<Vec<LockedPackage>> {
    let mut locked = Vec::with_capacity(packages.len());

    for package in packages {
        if package.name.is_empty() {
            return Err(InvariantViolation::PackageWithoutName.into());
        }
        if package.pretty_version().is_empty() {
            return Err(InvariantViolation::PackageWithoutVersion {
                name: package.name.clone(),
            }
            .into());
        }
        locked.push(LockedPackage::from(package));
    }

    locked.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version)));
    Ok(locked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::MemoryStorage;
    use crate::Error;
    use serde_json::json;

    const MANIFEST: &str = r#"{"minimum-stability":"beta","name":"test"}"#;
    const MANIFEST_HASH: &str = "3c33c57e3c58f32e4ece539bd2ccfeef";
    const OTHER_HASH: &str = "2ed41e5a10c2cf5b988ca04fbec66f67";

    fn locker_with(lock: LockFile) -> Locker<MemoryStorage> {
        Locker::new(MemoryStorage::with_lock(lock), MANIFEST)
    }

    #[test]
    fn test_is_locked() {
        let locker = locker_with(LockFile {
            packages: Some(vec![]),
            ..Default::default()
        });
        assert!(locker.is_locked().unwrap());

        let locker = locker_with(LockFile::default());
        assert!(!locker.is_locked().unwrap());

        let locker = Locker::new(MemoryStorage::new(), MANIFEST);
        assert!(!locker.is_locked().unwrap());
    }

    #[test]
    fn test_get_not_locked_packages() {
        let locker = Locker::new(MemoryStorage::new(), MANIFEST);
        assert!(matches!(
            locker.get_locked_packages(true),
            Err(Error::InputInvariant(InvariantViolation::NotLocked))
        ));
    }

    #[test]
    fn test_get_locked_packages() {
        let locker = locker_with(LockFile {
            packages: Some(vec![
                LockedPackage::new("pkg1", "1.0.0-beta"),
                LockedPackage::new("pkg2", "0.1.10"),
            ]),
            packages_dev: Some(vec![LockedPackage::new("pkg3", "2.0.0")]),
            ..Default::default()
        });

        let packages = locker.get_locked_packages(false).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].name, "pkg1");
        assert_eq!(packages[0].version, "1.0.0.0-beta");
        assert_eq!(packages[0].pretty_version(), "1.0.0-beta");
        assert_eq!(packages[1].version, "0.1.10.0");

        assert_eq!(locker.get_locked_packages(true).unwrap().len(), 3);
    }


    #[test]
    fn test_set_lock_data() {
        let mut locker = Locker::new(MemoryStorage::new(), format!("{}  ", MANIFEST));

        let mut overrides = IndexMap::new();
        overrides.insert("foo/bar".to_string(), json!("1.0"));

        let written = locker
            .set_lock_data(LockSnapshot {
                packages: vec![Package::new("pkg2", "0.1.10"), Package::new("pkg1", "1.0.0-beta")],
                minimum_stability: "dev".to_string(),
                platform_overrides: overrides,
                ..Default::default()
            })
            .unwrap();
        assert!(written);

        let stored = serde_json::to_value(locker.storage().get().unwrap()).unwrap();
        let expected = json!({
            "_readme": [
                "This file pins every dependency of the project to an exact version",
                "Regenerate it with `lockstep resolve` instead of editing it by hand",
                "This file is @generated automatically"
            ],
            "content-hash": MANIFEST_HASH,
            "packages": [
                {"name": "pkg1", "version": "1.0.0-beta"},
                {"name": "pkg2", "version": "0.1.10"}
            ],
            "packages-dev": [],
            "aliases": [],
            "minimum-stability": "dev",
            "stability-flags": [],
            "platform": [],
            "platform-dev": [],
            "platform-overrides": {"foo/bar": "1.0"},
            "prefer-stable": false,
            "prefer-lowest": false,
            "plugin-api-version": PLUGIN_API_VERSION
        });
        assert_eq!(stored, expected);

        let keys: Vec<_> = stored.as_object().unwrap().keys().cloned().collect();
        let expected_keys: Vec<_> = expected.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, expected_keys);
    }

    #[test]
    fn test_set_lock_data_is_locked_and_fresh() {
        let mut locker = Locker::new(MemoryStorage::new(), MANIFEST);
        assert!(locker.set_lock_data(LockSnapshot::default()).unwrap());

        assert!(locker.is_locked().unwrap());
        assert!(locker.is_fresh().unwrap());
        assert_eq!(locker.get_plugin_api().unwrap(), PLUGIN_API_VERSION);
    }

    #[test]
    fn test_set_lock_data_unchanged() {
        let mut locker = Locker::new(MemoryStorage::new(), MANIFEST);
        let snapshot = LockSnapshot {
            packages: vec![Package::new("pkg1", "1.0.0")],
            ..Default::default()
        };

        assert!(locker.set_lock_data(snapshot.clone()).unwrap());
        assert!(!locker.set_lock_data(snapshot).unwrap());
        assert_eq!(locker.storage().writes(), 1);
    }

    #[test]
    fn test_lock_bad_packages() {
        let mut locker = Locker::new(MemoryStorage::new(), MANIFEST);

        let result = locker.set_lock_data(LockSnapshot {
            packages: vec![Package::new("pkg1", "1.0.0"), Package::new("pkg2", "")],
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(Error::InputInvariant(InvariantViolation::PackageWithoutVersion { ref name })) if name == "pkg2"
        ));
        assert_eq!(locker.storage().writes(), 0);
        assert!(!locker.is_locked().unwrap());

        let result = locker.set_lock_data(LockSnapshot {
            dev_packages: Some(vec![Package::new("", "1.0.0")]),
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(Error::InputInvariant(InvariantViolation::PackageWithoutName))
        ));
        assert_eq!(locker.storage().writes(), 0);
    }

    #[test]
    fn test_is_fresh() {
        let locker = locker_with(LockFile {
            hash: Some(MANIFEST_HASH.to_string()),
            ..Default::default()
        });
        assert!(locker.is_fresh().unwrap());
    }

    #[test]
    fn test_is_fresh_false() {
        let locker = locker_with(LockFile {
            hash: Some(OTHER_HASH.to_string()),
            ..Default::default()
        });
        assert!(!locker.is_fresh().unwrap());
    }

    #[test]
    fn test_is_fresh_with_content_hash() {
        let locker = locker_with(LockFile {
            hash: Some(legacy_hash(&format!("{}  x", MANIFEST))),
            content_hash: Some(MANIFEST_HASH.to_string()),
            ..Default::default()
        });
        assert!(locker.is_fresh().unwrap());
    }

    #[test]
    fn test_is_fresh_with_content_hash_and_no_hash() {
        let locker = locker_with(LockFile {
            content_hash: Some(MANIFEST_HASH.to_string()),
            ..Default::default()
        });
        assert!(locker.is_fresh().unwrap());
    }

    #[test]
    fn test_is_fresh_false_with_content_hash() {
        let locker = locker_with(LockFile {
            hash: Some(OTHER_HASH.to_string()),
            content_hash: Some(OTHER_HASH.to_string()),
            ..Default::default()
        });
        assert!(!locker.is_fresh().unwrap());
    }

    #[test]
    fn test_is_fresh_ignores_whitespace() {
        let mut locker = Locker::new(MemoryStorage::new(), MANIFEST);
        locker.set_lock_data(LockSnapshot::default()).unwrap();

        let reformatted = "{\n    \"name\": \"test\",\n    \"minimum-stability\": \"beta\"\n}\n\n";
        let locker = Locker::new(locker.into_storage(), reformatted);
        assert!(locker.is_fresh().unwrap());

        let legacy = Locker::new(
            MemoryStorage::with_lock(LockFile {
                hash: Some(legacy_hash(MANIFEST)),
                ..Default::default()
            }),
            format!("\n{}\t ", MANIFEST),
        );
        assert!(legacy.is_fresh().unwrap());
    }

    #[test]
    fn test_getters() {
        let mut locker = Locker::new(MemoryStorage::new(), MANIFEST);
        let mut flags = IndexMap::new();
        flags.insert("vendor/a".to_string(), 20);
        let mut platform = IndexMap::new();
        platform.insert("php".to_string(), ">=8.1".to_string());
        let mut platform_dev = IndexMap::new();
        platform_dev.insert("php".to_string(), ">=8.2".to_string());
        platform_dev.insert("ext-xdebug".to_string(), "*".to_string());

        locker
            .set_lock_data(LockSnapshot {
                minimum_stability: "beta".to_string(),
                stability_flags: flags,
                prefer_stable: true,
                platform,
                platform_dev,
                aliases: vec![LockAlias {
                    package: "vendor/a".to_string(),
                    version: "dev-main".to_string(),
                    alias: "1.0.x-dev".to_string(),
                    alias_normalized: "1.0.9999999.9999999-dev".to_string(),
                }],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(locker.get_minimum_stability().unwrap(), "beta");
        assert_eq!(locker.get_stability_flags().unwrap().get("vendor/a"), Some(&20));
        assert!(locker.get_prefer_stable().unwrap());
        assert!(!locker.get_prefer_lowest().unwrap());
        assert_eq!(locker.get_aliases().unwrap().len(), 1);
        assert!(locker.get_platform_overrides().unwrap().is_empty());

        let requirements = locker.get_platform_requirements(false).unwrap();
        assert_eq!(requirements.len(), 1);
        let requirements = locker.get_platform_requirements(true).unwrap();
        assert_eq!(requirements.get("php").map(String::as_str), Some(">=8.1"));
        assert!(requirements.contains_key("ext-xdebug"));
    }

    #[test]
    fn test_plugin_api_default() {
        let locker = locker_with(LockFile {
            packages: Some(vec![]),
            ..Default::default()
        });
        assert_eq!(locker.get_plugin_api().unwrap(), "1.1.0");
    }
}
