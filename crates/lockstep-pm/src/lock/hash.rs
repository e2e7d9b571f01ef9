//! Manifest fingerprints stored in the lock file.
//!
//! The content hash must match what Composer writes, so the relevant part of
//! the manifest is re-encoded the way PHP's `json_encode` does it with no
//! flags: compact, `/` escaped, non-ASCII as `\uXXXX`.

use md5::{Digest, Md5};
use serde_json::{Map, Value};

use crate::Result;

/// Top-level manifest keys that influence resolution
const RELEVANT_KEYS: &[&str] = &[
    "name",
    "version",
    "require",
    "require-dev",
    "conflict",
    "replace",
    "provide",
    "minimum-stability",
    "prefer-stable",
    "repositories",
    "extra",
];

/// Hash of the resolution-relevant parts of a manifest.
pub fn content_hash(manifest: &str) -> Result<String> {
    let content: Value = serde_json::from_str(manifest)?;
    let Value::Object(content) = content else {
        return Ok(md5_hex(b"[]"));
    };

    let mut relevant: Vec<(String, Value)> = RELEVANT_KEYS
        .iter()
        .filter_map(|key| content.get(*key).map(|value| (key.to_string(), value.clone())))
        .collect();

    if let Some(platform) = content.get("config").and_then(|config| config.get("platform")) {
        let mut config = Map::new();
        config.insert("platform".to_string(), platform.clone());
        relevant.push(("config".to_string(), Value::Object(config)));
    }

    relevant.sort_by(|a, b| a.0.cmp(&b.0));

    let mut encoded = String::from("{");
    for (i, (key, value)) in relevant.iter().enumerate() {
        if i > 0 {
            encoded.push(',');
        }
        encode_string(key, &mut encoded);
        encoded.push(':');
        encode_value(value, &mut encoded);
    }
    encoded.push('}');

    Ok(md5_hex(encoded.as_bytes()))
}

/// Hash used by lock files written before `content-hash` existed.
pub fn legacy_hash(manifest: &str) -> String {
    md5_hex(php_trim(manifest).as_bytes())
}

pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn php_trim(s: &str) -> &str {
    s.trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B'))
}

/// Encode like `json_encode($value, 0)` after `json_decode($raw, true)`.
///
/// Decoding into PHP arrays turns `{}` into `[]`, so empty objects are
/// written as empty lists.
pub fn php_json_encode(value: &Value) -> String {
    let mut out = String::new();
    encode_value(value, &mut out);
    out
}

fn encode_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => encode_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) if map.is_empty() => out.push_str("[]"),
        Value::Object(map) => {
            out.push('{');
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_string(key, out);
                out.push(':');
                encode_value(item, out);
            }
            out.push('}');
        }
    }
}

fn encode_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_content_hash_of_sorted_manifest() {
        let manifest = r#"{"minimum-stability":"beta","name":"test"}"#;
        assert_eq!(content_hash(manifest).unwrap(), "3c33c57e3c58f32e4ece539bd2ccfeef");
        assert_eq!(content_hash(manifest).unwrap(), md5_hex(manifest.as_bytes()));
    }

    #[test]
    fn test_content_hash_ignores_irrelevant_keys_and_layout() {
        let a = r#"{"name": "test", "description": "first", "minimum-stability": "beta"}"#;
        let b = "{\n    \"minimum-stability\": \"beta\",\n    \"name\": \"test\"\n}\n";
        assert_eq!(content_hash(a).unwrap(), content_hash(b).unwrap());

        let c = r#"{"name": "test2", "minimum-stability": "beta"}"#;
        assert_eq!(content_hash(c).unwrap(), "2ed41e5a10c2cf5b988ca04fbec66f67");
    }

    #[test]
    fn test_content_hash_escapes_like_php() {
        let manifest = r#"{"require": {"vendor/é": "^1.0"}, "name": "acme/app", "autoload": {}}"#;
        assert_eq!(content_hash(manifest).unwrap(), "e7dc9d1b0c476e935513cbbc84460848");
    }

    #[test]
    fn test_content_hash_keeps_only_config_platform() {
        let manifest = r#"{
            "name": "acme/app",
            "require": {},
            "config": {"platform": {"php": "8.2.0"}, "sort-packages": true}
        }"#;
        assert_eq!(content_hash(manifest).unwrap(), "213af8a5fc9488970932d2b796ad2e4b");
    }

    #[test]
    fn test_content_hash_rejects_invalid_json() {
        assert!(content_hash("{not json").is_err());
    }

    #[test]
    fn test_legacy_hash_trims_whitespace() {
        let manifest = r#"{"minimum-stability":"beta","name":"test"}"#;
        assert_eq!(legacy_hash(&format!("{}  \n", manifest)), legacy_hash(manifest));
        assert_eq!(legacy_hash(manifest), "3c33c57e3c58f32e4ece539bd2ccfeef");
    }

    #[test]
    fn test_php_json_encode() {
        let value = json!({
            "a": "x/y",
            "b": "\u{1F600}",
            "c": [1, true, null],
            "d": {},
            "e": "tab\tquote\"",
            "f": "\u{01}"
        });
        assert_eq!(
            php_json_encode(&value),
            r#"{"a":"x\/y","b":"\ud83d\ude00","c":[1,true,null],"d":[],"e":"tab\tquote\"","f":"\u0001"}"#
        );
    }
}
