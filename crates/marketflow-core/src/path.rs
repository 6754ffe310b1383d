//! Dotted-path read, write, and merge over the JSON value model.
//!
//! Paths have the form `$` or `$.segment(.segment)*`. Numeric segments
//! address sequence positions. All write operations clone and return a new
//! root; callers rebind instead of mutating upstream data.

use serde_json::{Map, Value};
use thiserror::Error;

/// Path syntax errors.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("invalid path '{0}': must be '$' or start with '$.'")]
    BadPrefix(String),
    #[error("invalid path '{0}': empty segment")]
    EmptySegment(String),
    #[error("substitution for '{0}' must be a string path")]
    TemplateNotAString(String),
}

/// Split a path into its segments. `$` and the empty path yield no segments.
pub fn split_path(path: &str) -> Result<Vec<&str>, PathError> {
    if path.is_empty() || path == "$" {
        return Ok(Vec::new());
    }
    let Some(rest) = path.strip_prefix("$.") else {
        return Err(PathError::BadPrefix(path.to_string()));
    };
    let segments: Vec<&str> = rest.split('.').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(PathError::EmptySegment(path.to_string()));
    }
    Ok(segments)
}

/// Read the value at `path`. Missing keys, out-of-range indices, and
/// descents through scalars all yield `Value::Null`, never an error.
pub fn get_by_path(value: &Value, path: &str) -> Result<Value, PathError> {
    let segments = split_path(path)?;
    let mut cursor = value;
    for segment in segments {
        cursor = match cursor {
            Value::Object(map) => match map.get(segment) {
                Some(entry) => entry,
                None => return Ok(Value::Null),
            },
            Value::Array(items) => {
                match segment.parse::<usize>().ok().and_then(|index| items.get(index)) {
                    Some(entry) => entry,
                    None => return Ok(Value::Null),
                }
            }
            _ => return Ok(Value::Null),
        };
    }
    Ok(cursor.clone())
}

/// Write `value` at `path` into a clone of `root`, materialising
/// intermediate containers along the way: integer segments create sequences
/// (extended with nulls up to the index), other segments create maps. A `$`
/// path replaces the root entirely.
pub fn place_by_path(root: &Value, path: &str, value: Value) -> Result<Value, PathError> {
    let segments = split_path(path)?;
    if segments.is_empty() {
        return Ok(value);
    }
    let mut new_root = root.clone();
    place_segments(&mut new_root, &segments, value);
    Ok(new_root)
}

fn place_segments(cursor: &mut Value, segments: &[&str], value: Value) {
    let segment = segments[0];
    match segment.parse::<usize>() {
        Ok(index) => {
            if !cursor.is_array() {
                *cursor = Value::Array(Vec::new());
            }
            if let Value::Array(items) = cursor {
                while items.len() <= index {
                    items.push(Value::Null);
                }
                if segments.len() == 1 {
                    items[index] = value;
                } else {
                    place_segments(&mut items[index], &segments[1..], value);
                }
            }
        }
        Err(_) => {
            if !cursor.is_object() {
                *cursor = Value::Object(Map::new());
            }
            if let Value::Object(map) = cursor {
                let slot = map.entry(segment.to_string()).or_insert(Value::Null);
                if segments.len() == 1 {
                    *slot = value;
                } else {
                    place_segments(slot, &segments[1..], value);
                }
            }
        }
    }
}

/// Merge two values: null yields the other side, maps merge key-wise with
/// the right side winning scalar conflicts, sequences concatenate (left then
/// right), and anything else yields the right side.
pub fn merge_values(left: Value, right: Value) -> Value {
    match (left, right) {
        (Value::Null, right) => right,
        (left, Value::Null) => left,
        (Value::Object(mut left), Value::Object(right)) => {
            for (key, right_value) in right {
                let merged = match left.get(&key) {
                    Some(left_value) => merge_values(left_value.clone(), right_value),
                    None => right_value,
                };
                left.insert(key, merged);
            }
            Value::Object(left)
        }
        (Value::Array(mut left), Value::Array(right)) => {
            left.extend(right);
            Value::Array(left)
        }
        (_, right) => right,
    }
}

/// Narrow `value` through an optional selection path. `None`, the empty
/// path, and `$` are all the identity.
pub fn apply_path(value: &Value, path: Option<&str>) -> Result<Value, PathError> {
    match path {
        None | Some("") | Some("$") => Ok(value.clone()),
        Some(path) => get_by_path(value, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_by_path_descends_maps_and_sequences() {
        let value = json!({"a": {"b": [10, {"c": true}]}});
        assert_eq!(get_by_path(&value, "$.a.b.0").unwrap(), json!(10));
        assert_eq!(get_by_path(&value, "$.a.b.1.c").unwrap(), json!(true));
        assert_eq!(get_by_path(&value, "$").unwrap(), value);
    }

    #[test]
    fn test_get_by_path_yields_null_on_any_miss() {
        let value = json!({"a": [1, 2]});
        assert_eq!(get_by_path(&value, "$.missing").unwrap(), Value::Null);
        assert_eq!(get_by_path(&value, "$.a.7").unwrap(), Value::Null);
        assert_eq!(get_by_path(&value, "$.a.0.deeper").unwrap(), Value::Null);
    }

    #[test]
    fn test_get_by_path_rejects_malformed_paths() {
        let value = json!({});
        assert!(matches!(
            get_by_path(&value, "a.b"),
            Err(PathError::BadPrefix(_))
        ));
        assert!(matches!(
            get_by_path(&value, "$.a..b"),
            Err(PathError::EmptySegment(_))
        ));
    }

    #[test]
    fn test_place_by_path_round_trips_existing_segments() {
        let value = json!({"a": {"b": [1, {"c": "x"}]}, "d": 4});
        for path in ["$.a", "$.a.b", "$.a.b.1.c", "$.d"] {
            let read = get_by_path(&value, path).unwrap();
            let written = place_by_path(&value, path, read).unwrap();
            assert_eq!(written, value, "round-trip through {path}");
        }
    }

    #[test]
    fn test_place_by_path_materialises_intermediate_containers() {
        let placed = place_by_path(&json!({}), "$.a.2.b", json!(7)).unwrap();
        assert_eq!(placed, json!({"a": [null, null, {"b": 7}]}));
    }

    #[test]
    fn test_place_by_path_root_replaces_everything() {
        let placed = place_by_path(&json!({"old": 1}), "$", json!([1, 2])).unwrap();
        assert_eq!(placed, json!([1, 2]));
    }

    #[test]
    fn test_place_by_path_leaves_the_original_untouched() {
        let original = json!({"a": 1});
        let _ = place_by_path(&original, "$.a", json!(2)).unwrap();
        assert_eq!(original, json!({"a": 1}));
    }

    #[test]
    fn test_merge_values_maps_merge_right_biased() {
        let merged = merge_values(
            json!({"a": 1, "nested": {"x": 1, "y": 2}}),
            json!({"b": 2, "nested": {"y": 20, "z": 30}}),
        );
        assert_eq!(
            merged,
            json!({"a": 1, "nested": {"x": 1, "y": 20, "z": 30}, "b": 2})
        );
    }

    #[test]
    fn test_merge_values_sequences_concatenate() {
        assert_eq!(
            merge_values(json!([1, 2]), json!([3])),
            json!([1, 2, 3])
        );
    }

    #[test]
    fn test_merge_values_null_is_identity() {
        assert_eq!(merge_values(Value::Null, json!(5)), json!(5));
        assert_eq!(merge_values(json!({"a": 1}), Value::Null), json!({"a": 1}));
    }

    #[test]
    fn test_merge_values_scalar_conflict_takes_right() {
        assert_eq!(merge_values(json!("left"), json!("right")), json!("right"));
        assert_eq!(merge_values(json!({"k": 1}), json!("flat")), json!("flat"));
    }

    #[test]
    fn test_apply_path_identity_forms() {
        let value = json!({"a": 1});
        assert_eq!(apply_path(&value, None).unwrap(), value);
        assert_eq!(apply_path(&value, Some("")).unwrap(), value);
        assert_eq!(apply_path(&value, Some("$")).unwrap(), value);
        assert_eq!(apply_path(&value, Some("$.a")).unwrap(), json!(1));
    }
}
