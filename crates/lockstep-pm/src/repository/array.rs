use async_trait::async_trait;
use serde_json::Value;

use super::Repository;
use crate::json::LockedPackage;
use crate::package::Package;
use crate::{Error, Result};

/// A repository backed by a list of packages held in memory.
#[derive(Debug, Clone, Default)]
pub struct ArrayRepository {
    name: String,
    packages: Vec<Package>,
}

impl ArrayRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
        }
    }

    pub fn with_packages(name: impl Into<String>, packages: Vec<Package>) -> Self {
        Self {
            name: name.into(),
            packages,
        }
    }

    /// Load raw package records.
    ///
    /// Accepts a JSON array of records, or an object with a `packages` key
    /// holding either such an array or a `name -> [records]` /
    /// `name -> {version: record}` map.
    pub fn from_json(name: impl Into<String>, content: &str) -> Result<Self> {
        let name = name.into();
        let value: Value = serde_json::from_str(content)?;

        let mut records = Vec::new();
        match value {
            Value::Array(items) => records.extend(items),
            Value::Object(mut object) => match object.remove("packages") {
                Some(Value::Array(items)) => records.extend(items),
                Some(Value::Object(by_name)) => {
                    for (_, versions) in by_name {
                        match versions {
                            Value::Array(items) => records.extend(items),
                            Value::Object(by_version) => records.extend(by_version.into_iter().map(|(_, v)| v)),
                            other => {
                                return Err(Error::data_source(&name, format!("unexpected package entry {}", other)))
                            }
                        }
                    }
                }
                _ => return Err(Error::data_source(&name, "no packages key in repository data")),
            },
            _ => return Err(Error::data_source(&name, "repository data must be an array or an object")),
        }

        let mut packages = Vec::with_capacity(records.len());
        for record in records {
            let locked: LockedPackage = serde_json::from_value(record)
                .map_err(|e| Error::data_source(&name, format!("invalid package record: {}", e)))?;
            packages.push(Package::from(locked));
        }

        log::debug!("Loaded {} packages into repository {}", packages.len(), name);
        Ok(Self { name, packages })
    }

    pub fn add_package(&mut self, package: Package) {
        self.packages.push(package);
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn find_package(&self, name: &str, version: &str) -> Option<&Package> {
        self.packages.iter().find(|p| {
            p.name.eq_ignore_ascii_case(name) && (p.version == version || p.pretty_version() == version)
        })
    }
}

#[async_trait]
impl Repository for ArrayRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_versions(&self, name: &str) -> Result<Vec<Package>> {
        let name = name.to_lowercase();
        Ok(self
            .packages
            .iter()
            .filter(|p| p.names().contains(&name))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_array() {
        let repo = ArrayRepository::from_json(
            "local",
            r#"[
                {"name": "vendor/a", "version": "1.0.0", "require": {"vendor/b": "^1.0"}},
                {"name": "vendor/b", "version": "v1.2.0", "version_normalized": "1.2.0.0"}
            ]"#,
        )
        .unwrap();

        assert_eq!(repo.len(), 2);
        assert!(repo.find_package("vendor/a", "1.0.0").is_some());
        let b = repo.find_package("vendor/b", "v1.2.0").unwrap();
        assert_eq!(b.version, "1.2.0.0");
        assert!(b.metadata.is_empty());
    }

    #[test]
    fn test_from_json_packages_map() {
        let repo = ArrayRepository::from_json(
            "dump",
            r#"{"packages": {
                "vendor/a": [{"name": "vendor/a", "version": "1.0.0"}],
                "vendor/b": {"2.0.0": {"name": "vendor/b", "version": "2.0.0"}}
            }}"#,
        )
        .unwrap();
        assert_eq!(repo.len(), 2);
        assert!(repo.find_package("vendor/b", "2.0.0.0").is_some());
    }

    #[test]
    fn test_from_json_errors() {
        let err = ArrayRepository::from_json("broken", r#"[{"name": "vendor/a"}]"#).unwrap_err();
        assert!(matches!(err, Error::DataSource { ref repository, .. } if repository == "broken"));

        assert!(ArrayRepository::from_json("broken", r#""text""#).is_err());
        assert!(matches!(ArrayRepository::from_json("broken", "[").unwrap_err(), Error::Json(_)));
    }

    #[tokio::test]
    async fn test_fetch_versions_includes_providers() {
        let mut replacer = Package::new("vendor/fork", "1.0.0");
        replacer.replace.insert("vendor/a".to_string(), "self.version".to_string());

        let repo = ArrayRepository::with_packages(
            "local",
            vec![
                Package::new("vendor/a", "1.0.0"),
                Package::new("Vendor/A", "2.0.0"),
                Package::new("vendor/b", "1.0.0"),
                replacer,
            ],
        );

        let versions = repo.fetch_versions("vendor/a").await.unwrap();
        let names: Vec<_> = versions.iter().map(|p| p.pretty_string()).collect();
        assert_eq!(names, vec!["vendor/a 1.0.0", "Vendor/A 2.0.0", "vendor/fork 1.0.0"]);

        assert!(repo.fetch_versions("vendor/missing").await.unwrap().is_empty());
    }
}
