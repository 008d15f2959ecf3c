//! Helpers for the free-form `profile_data` JSON documents

use serde_json::{Map, Value};

/// Deep-merge `updates` into `target`.
///
/// Objects merge key by key, arrays are unioned (existing order first, no
/// duplicates), `null` in `updates` leaves the existing value untouched and
/// any other value overwrites.
pub fn merge_json(target: &mut Value, updates: &Value) {
    match (target, updates) {
        (_, Value::Null) => {}
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        if !value.is_null() {
                            existing.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
        }
        (Value::Array(existing), Value::Array(incoming)) => {
            for value in incoming {
                if !existing.contains(value) {
                    existing.push(value.clone());
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Flatten a JSON document into sorted `dotted.key: value` lines.
///
/// Keys starting with `_` are internal bookkeeping and are skipped, as are
/// empty strings, empty arrays and nulls.
pub fn flatten_facts(value: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Value::Object(map) = value {
        flatten_into(&mut out, "", map);
    }
    out.sort();
    out
}

fn flatten_into(out: &mut Vec<(String, String)>, prefix: &str, map: &Map<String, Value>) {
    for (key, value) in map {
        if key.starts_with('_') {
            continue;
        }
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            Value::Object(inner) => flatten_into(out, &path, inner),
            Value::Array(items) => {
                let rendered: Vec<String> = items.iter().filter_map(scalar_text).collect();
                if !rendered.is_empty() {
                    out.push((path, rendered.join(", ")));
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    out.push((path, text));
                }
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// An empty JSON object, the default for `profile_data` columns
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_recurses_into_objects() {
        let mut target = json!({"identity": {"name": "Ada", "city": "London"}});
        merge_json(&mut target, &json!({"identity": {"city": "Paris", "age": 36}}));
        assert_eq!(
            target,
            json!({"identity": {"name": "Ada", "city": "Paris", "age": 36}})
        );
    }

    #[test]
    fn merge_unions_arrays_without_duplicates() {
        let mut target = json!({"hobbies": ["chess", "piano"]});
        merge_json(&mut target, &json!({"hobbies": ["piano", "rowing"]}));
        assert_eq!(target, json!({"hobbies": ["chess", "piano", "rowing"]}));
    }

    #[test]
    fn merge_null_keeps_existing_value() {
        let mut target = json!({"name": "Ada"});
        merge_json(&mut target, &json!({"name": null, "pet": null}));
        assert_eq!(target, json!({"name": "Ada"}));
    }

    #[test]
    fn merge_overwrites_mismatched_types() {
        let mut target = json!({"children": "two"});
        merge_json(&mut target, &json!({"children": ["Sam", "Jo"]}));
        assert_eq!(target, json!({"children": ["Sam", "Jo"]}));
    }

    #[test]
    fn flatten_sorts_and_skips_internal_keys() {
        let facts = flatten_facts(&json!({
            "values": {"faith": "quaker"},
            "identity": {"name": "Ada", "nickname": ""},
            "hobbies": ["chess", "piano"],
            "_onboarding": {"answered": ["q1"]}
        }));
        assert_eq!(
            facts,
            vec![
                ("hobbies".to_string(), "chess, piano".to_string()),
                ("identity.name".to_string(), "Ada".to_string()),
                ("values.faith".to_string(), "quaker".to_string()),
            ]
        );
    }
}
