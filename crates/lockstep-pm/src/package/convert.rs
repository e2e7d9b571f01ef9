use super::Package;
use crate::json::LockedPackage;

/// Raw record fields that are derived, never carried through
const DERIVED_FIELDS: &[&str] = &["version_normalized"];

impl From<&LockedPackage> for Package {
    fn from(locked: &LockedPackage) -> Self {
        let mut package = Package::new(locked.name.as_str(), locked.version.as_str());
        package.require = locked.require.clone();
        package.require_dev = locked.require_dev.clone();
        package.conflict = locked.conflict.clone();
        package.provide = locked.provide.clone();
        package.replace = locked.replace.clone();
        package.package_type = locked.package_type.clone();
        package.transport_options = locked.transport_options.clone();
        package.metadata = locked
            .extra
            .iter()
            .filter(|(key, _)| !DERIVED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        package
    }
}

impl From<LockedPackage> for Package {
    fn from(locked: LockedPackage) -> Self {
        Package::from(&locked)
    }
}

impl From<&Package> for LockedPackage {
    fn from(package: &Package) -> Self {
        LockedPackage {
            name: package.name.clone(),
            version: package.pretty_version().to_string(),
            require: package.require.clone(),
            require_dev: package.require_dev.clone(),
            conflict: package.conflict.clone(),
            provide: package.provide.clone(),
            replace: package.replace.clone(),
            package_type: package.package_type.clone(),
            transport_options: package.transport_options.clone(),
            extra: package.metadata.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_locked_package_to_package() {
        let locked: LockedPackage = serde_json::from_value(json!({
            "name": "vendor/a",
            "version": "v1.2.0",
            "version_normalized": "1.2.0.0",
            "require": {"php": ">=8.1", "vendor/b": "^2.0"},
            "type": "library",
            "source": {"type": "git", "reference": "abc"}
        }))
        .unwrap();

        let package = Package::from(&locked);
        assert_eq!(package.version, "1.2.0.0");
        assert_eq!(package.pretty_version(), "v1.2.0");
        assert_eq!(package.require.get("vendor/b").map(String::as_str), Some("^2.0"));
        assert_eq!(package.package_type.as_deref(), Some("library"));
        assert_eq!(package.metadata.keys().collect::<Vec<_>>(), vec!["source"]);
    }

    #[test]
    fn test_package_to_locked_package_keeps_metadata_order() {
        let mut package = Package::new("vendor/a", "1.0.0");
        package.metadata.insert("source".into(), json!({"reference": "abc"}));
        package.metadata.insert("dist".into(), json!({"type": "zip"}));
        package.metadata.insert("autoload".into(), json!({"psr-4": {"A\\": "src/"}}));

        let locked = LockedPackage::from(&package);
        assert_eq!(locked.version, "1.0.0");

        let value = serde_json::to_value(&locked).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "version", "source", "dist", "autoload"]);

        assert_eq!(Package::from(locked), package);
    }
}
