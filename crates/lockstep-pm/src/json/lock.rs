use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lock file document.
///
/// Field order is the on-disk order. Map fields are always written, as `[]`
/// when empty, so that diffs between successive writes stay minimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LockFile {
    #[serde(rename = "_readme", default)]
    pub readme: Vec<String>,

    /// Legacy whole-manifest hash, only present in old lock files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<Vec<LockedPackage>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages_dev: Option<Vec<LockedPackage>>,

    #[serde(default)]
    pub aliases: Vec<LockAlias>,

    #[serde(default = "default_minimum_stability")]
    pub minimum_stability: String,

    #[serde(default, with = "stability_flags")]
    pub stability_flags: IndexMap<String, u8>,

    #[serde(default, with = "empty_map")]
    pub platform: IndexMap<String, String>,

    #[serde(default, with = "empty_map")]
    pub platform_dev: IndexMap<String, String>,

    #[serde(default, with = "empty_map")]
    pub platform_overrides: IndexMap<String, Value>,

    #[serde(default)]
    pub prefer_stable: bool,

    #[serde(default)]
    pub prefer_lowest: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_api_version: Option<String>,
}

fn default_minimum_stability() -> String {
    "stable".to_string()
}

impl Default for LockFile {
    fn default() -> Self {
        Self {
            readme: Vec::new(),
            hash: None,
            content_hash: None,
            packages: None,
            packages_dev: None,
            aliases: Vec::new(),
            minimum_stability: default_minimum_stability(),
            stability_flags: IndexMap::new(),
            prefer_stable: false,
            prefer_lowest: false,
            platform: IndexMap::new(),
            platform_dev: IndexMap::new(),
            platform_overrides: IndexMap::new(),
            plugin_api_version: None,
        }
    }
}

impl LockFile {
    pub fn from_str(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    /// Whether the document carries a package list at all (even an empty one).
    pub fn has_packages(&self) -> bool {
        self.packages.is_some()
    }

    pub fn all_packages(&self) -> impl Iterator<Item = &LockedPackage> {
        self.packages
            .iter()
            .flatten()
            .chain(self.packages_dev.iter().flatten())
    }
}

/// A single package entry in the lock file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockedPackage {
    pub name: String,

    /// Pretty version as published
    pub version: String,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub require: IndexMap<String, String>,

    #[serde(rename = "require-dev", default, skip_serializing_if = "IndexMap::is_empty")]
    pub require_dev: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub conflict: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub provide: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub replace: IndexMap<String, String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,

    #[serde(rename = "transport-options", default, skip_serializing_if = "IndexMap::is_empty")]
    pub transport_options: IndexMap<String, Value>,

    /// Fields lockstep does not interpret (source, dist, autoload, ...)
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl LockedPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            require: IndexMap::new(),
            require_dev: IndexMap::new(),
            conflict: IndexMap::new(),
            provide: IndexMap::new(),
            replace: IndexMap::new(),
            package_type: None,
            transport_options: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }
}

/// Root alias entry (`"dev-main as 1.0.0"` in the manifest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockAlias {
    pub package: String,
    pub version: String,
    pub alias: String,
    pub alias_normalized: String,
}

/// Maps that PHP encodes as `[]` when empty.
mod empty_map {
    use indexmap::IndexMap;
    use serde::de::{DeserializeOwned, Error};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<V, S>(map: &IndexMap<String, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        V: Serialize,
        S: Serializer,
    {
        if map.is_empty() {
            Vec::<Value>::new().serialize(serializer)
        } else {
            map.serialize(serializer)
        }
    }

    pub fn deserialize<'de, V, D>(deserializer: D) -> Result<IndexMap<String, V>, D::Error>
    where
        V: DeserializeOwned,
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(IndexMap::new()),
            Value::Array(items) if items.is_empty() => Ok(IndexMap::new()),
            Value::Object(object) => object
                .into_iter()
                .map(|(key, value)| {
                    serde_json::from_value(value)
                        .map(|value| (key, value))
                        .map_err(D::Error::custom)
                })
                .collect(),
            other => Err(D::Error::custom(format!("expected an object, found {}", other))),
        }
    }
}

/// Stability flags, written as numeric priorities. Older files and
/// hand-edited ones may carry the stability name instead.
mod stability_flags {
    use indexmap::IndexMap;
    use lockstep_semver::Stability;
    use serde::de::Error;
    use serde::{Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(flags: &IndexMap<String, u8>, serializer: S) -> Result<S::Ok, S::Error> {
        super::empty_map::serialize(flags, serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<IndexMap<String, u8>, D::Error> {
        let raw: IndexMap<String, Value> = super::empty_map::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(name, value)| {
                let priority = match &value {
                    Value::Number(n) => n
                        .as_u64()
                        .and_then(|n| u8::try_from(n).ok())
                        .filter(|n| Stability::from_priority(*n).is_some()),
                    Value::String(s) => s.parse::<Stability>().ok().map(Stability::priority),
                    _ => None,
                };
                priority
                    .map(|p| (name.clone(), p))
                    .ok_or_else(|| D::Error::custom(format!("invalid stability flag {} for {}", value, name)))
            })
            .collect()
    }
}
