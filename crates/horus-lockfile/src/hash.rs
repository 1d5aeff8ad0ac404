use serde_json::{Value, json};
use sha2::{Digest, Sha256};

use crate::Pipfile;

/// Key under `_meta.hash` in a Pipfile.lock.
pub const HASH_ALGORITHM: &str = "sha256";

/// Hex sha256 digest of a manifest, as recorded in `_meta.hash.sha256`.
pub fn pipfile_hash(pipfile: &Pipfile) -> String {
    let data = json!({
        "_meta": {
            "sources": pipfile.source,
            "requires": pipfile.requires,
        },
        "default": pipfile.packages,
        "develop": pipfile.dev_packages,
    });
    let content = canonical_json(&data);
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Compact JSON with sorted object keys and ASCII-only string escapes.
///
/// Byte-for-byte equal to Python's `json.dumps(v, sort_keys=True,
/// separators=(",", ":"))`, independent of serde_json's map ordering.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::with_capacity(256);
    write_value(value, &mut out);
    out
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_string(s, out),
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut buf = [0u16; 2];
                for unit in ch.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Requirement;

    #[test]
    fn matches_pipenv_digest() {
        let mut pipfile = Pipfile::new(Some("3.8"));
        pipfile
            .packages
            .insert("boto3".into(), Requirement::Version("*".into()));
        assert_eq!(
            pipfile_hash(&pipfile),
            "0ba145c19353da73840755ed85984b6653241c800c6ad2c772805a6089dfb424"
        );
    }

    #[test]
    fn empty_manifest_digest() {
        let pipfile = Pipfile::new(None);
        assert_eq!(
            pipfile_hash(&pipfile),
            "ebffa69a1fa192d1cef7cb42ad79231ca976565c5ce371a70160b3048d3cbc06"
        );
    }

    #[test]
    fn non_ascii_names_are_escaped() {
        let mut pipfile = Pipfile::default();
        pipfile
            .packages
            .insert("café".into(), Requirement::Version("*".into()));
        assert_eq!(
            canonical_json(&json!({"café": "*"})),
            "{\"caf\\u00e9\":\"*\"}"
        );
        assert_eq!(
            pipfile_hash(&pipfile),
            "dca26761c84d54e5728df812e43b421802f829b58c18e694b9453bff6a155508"
        );
    }

    #[test]
    fn keys_are_sorted_at_every_level() {
        let value = json!({"b": {"z": 1, "a": [true, null]}, "a": "x"});
        assert_eq!(canonical_json(&value), r#"{"a":"x","b":{"a":[true,null],"z":1}}"#);
    }
}
