//! Deterministic cache keys for API requests.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Request parameters, by name.
pub type Parameters = Map<String, Value>;

/// Build the cache key for a request: `<endpoint>:<canonical JSON>`.
///
/// Object keys are sorted at every depth, so construction order does not
/// matter. The full parameter text is kept verbatim: two requests share a
/// key only if their parameters are equal. A parameter that is absent is
/// not the same as one set to `null` or `""`.
pub fn generate_key(endpoint: &str, parameters: &Parameters) -> String {
  let canonical = canonicalize_object(parameters);
  format!("{}:{}", endpoint, Value::Object(canonical))
}

fn canonicalize_object(map: &Map<String, Value>) -> Map<String, Value> {
  let mut fields: Vec<(&String, &Value)> = map.iter().collect();
  fields.sort_by(|a, b| a.0.cmp(b.0));

  fields
    .into_iter()
    .map(|(name, value)| (name.clone(), canonicalize(value)))
    .collect()
}

fn canonicalize(value: &Value) -> Value {
  match value {
    Value::Object(map) => Value::Object(canonicalize_object(map)),
    Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
    other => other.clone(),
  }
}

/// Short SHA-256 digest of a key, for log lines.
///
/// Keys embed the user's text; logs carry this instead.
pub fn fingerprint(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  let digest = hex::encode(hasher.finalize());
  digest[..12].to_string()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn params(value: Value) -> Parameters {
    match value {
      Value::Object(map) => map,
      _ => panic!("parameters must be an object"),
    }
  }

  #[test]
  fn test_key_format() {
    let key = generate_key(
      "/analyze",
      &params(json!({ "text": "Hello", "compact_mode": false })),
    );
    assert_eq!(key, r#"/analyze:{"compact_mode":false,"text":"Hello"}"#);
  }

  #[test]
  fn test_order_independent() {
    let mut a = Parameters::new();
    a.insert("text".into(), json!("a"));
    a.insert("compact_mode".into(), json!(true));

    let mut b = Parameters::new();
    b.insert("compact_mode".into(), json!(true));
    b.insert("text".into(), json!("a"));

    assert_eq!(generate_key("analyze", &a), generate_key("analyze", &b));
  }

  #[test]
  fn test_nested_objects_sorted_and_kept() {
    let a = generate_key("e", &params(json!({ "opts": { "b": 1, "a": 2 } })));
    let b = generate_key("e", &params(json!({ "opts": { "a": 2, "b": 1 } })));
    assert_eq!(a, b);
    assert_eq!(a, r#"e:{"opts":{"a":2,"b":1}}"#);
  }

  #[test]
  fn test_sensitive_to_values_and_endpoint() {
    let a = generate_key("analyze", &params(json!({ "text": "a" })));
    let b = generate_key("analyze", &params(json!({ "text": "b" })));
    let c = generate_key("translate", &params(json!({ "text": "a" })));
    assert_ne!(a, b);
    assert_ne!(a, c);
  }

  #[test]
  fn test_sensitive_to_whitespace() {
    let a = generate_key("analyze", &params(json!({ "text": "hello world" })));
    let b = generate_key("analyze", &params(json!({ "text": "hello  world" })));
    assert_ne!(a, b);
  }

  #[test]
  fn test_absent_null_and_empty_are_distinct() {
    let absent = generate_key("translate", &params(json!({ "text": "a" })));
    let null = generate_key("translate", &params(json!({ "text": "a", "source_lang": null })));
    let empty = generate_key("translate", &params(json!({ "text": "a", "source_lang": "" })));

    assert_ne!(absent, null);
    assert_ne!(absent, empty);
    assert_ne!(null, empty);
  }

  #[test]
  fn test_long_text_not_truncated() {
    let base = "x".repeat(5_000);
    let changed = format!("{}y", &base[..4_999]);

    let a = generate_key("analyze", &params(json!({ "text": base })));
    let b = generate_key("analyze", &params(json!({ "text": changed })));
    assert_ne!(a, b);
    assert!(a.len() > 5_000);
  }

  #[test]
  fn test_fingerprint_is_stable_and_short() {
    let key = generate_key("analyze", &params(json!({ "text": "a" })));
    assert_eq!(fingerprint(&key), fingerprint(&key));
    assert_eq!(fingerprint(&key).len(), 12);
    assert_ne!(fingerprint(&key), fingerprint("other"));
  }
}
