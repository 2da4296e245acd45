//! Hashing - SHA-256 Fingerprints
//!
//! Deterministic hashes of sealed supply chains and of the template documents
//! they were compiled from.

use sha2::{Digest, Sha256};
use serde::Serialize;
use serde_json::{to_string, Value};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    let sorted = sort_value(&v);
    to_string(&sorted)
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Fingerprint of any serializable graph: sha256(canonical_json)
pub fn compute_fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(value)?;
    Ok(sha256_hex(canonical.as_bytes()))
}

/// source_hash = sha256(engine_version + canonical_document)
pub fn compute_source_hash(
    document: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let canonical = canonical_json(document)?;
    let combined = format!("{}:{}", engine_version, canonical);
    Ok(sha256_hex(combined.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": {"y": 1, "b": 2}});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":{"b":2,"y":1},"z":1}"#);
    }

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a = json!({"VIRTUAL_MACHINE": ["VCPU"], "CONTAINER": ["VMEM"]});
        let b = json!({"CONTAINER": ["VMEM"], "VIRTUAL_MACHINE": ["VCPU"]});
        assert_eq!(compute_fingerprint(&a).unwrap(), compute_fingerprint(&b).unwrap());
    }

    #[test]
    fn test_source_hash_depends_on_engine_version() {
        let doc = json!({"supplyChainNode": []});
        let h1 = compute_source_hash(&doc, "1.0.0").unwrap();
        let h2 = compute_source_hash(&doc, "1.1.0").unwrap();
        assert_ne!(h1, h2);
    }
}
