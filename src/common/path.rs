//! Dotted-path access into JSON documents.
//!
//! Paths look like `parameters.options.timeout` or `rules.values.0.outputKey`.
//! A numeric segment indexes into an array when the current value is an array
//! and is treated as a plain object key otherwise.

use serde_json::{Map, Value};

/// Split a dotted path into its segments, ignoring empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Join a parent path and a child key.
pub fn join(
    parent: &str,
    key: &str,
) -> String {
    if parent.is_empty() { key.to_string() } else { format!("{}.{}", parent, key) }
}

fn child<'a>(
    value: &'a Value,
    segment: &str,
) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
        _ => None,
    }
}

fn child_mut<'a>(
    value: &'a mut Value,
    segment: &str,
) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(arr) => segment.parse::<usize>().ok().and_then(move |i| arr.get_mut(i)),
        _ => None,
    }
}

/// Get the value at `path`, if every segment resolves.
pub fn get_path<'a>(
    value: &'a Value,
    path: &str,
) -> Option<&'a Value> {
    segments(path).into_iter().try_fold(value, |current, segment| child(current, segment))
}

/// Set `new_value` at `path`, creating intermediate objects as needed.
///
/// Returns `false` when the path runs through a scalar, or through an array
/// with a segment that is not a valid index.
pub fn set_path(
    value: &mut Value,
    path: &str,
    new_value: Value,
) -> bool {
    let parts = segments(path);
    let Some((last, parents)) = parts.split_last() else {
        return false;
    };

    let mut current = value;
    for segment in parents {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let next_missing = child(current, segment).map(Value::is_null).unwrap_or(true);
        if next_missing {
            match current {
                Value::Object(map) => {
                    map.insert(segment.to_string(), Value::Object(Map::new()));
                }
                _ => return false,
            }
        }
        current = match child_mut(current, segment) {
            Some(next) => next,
            None => return false,
        };
    }

    if current.is_null() {
        *current = Value::Object(Map::new());
    }
    match current {
        Value::Object(map) => {
            map.insert(last.to_string(), new_value);
            true
        }
        Value::Array(arr) => match last.parse::<usize>() {
            Ok(i) if i < arr.len() => {
                arr[i] = new_value;
                true
            }
            Ok(i) if i == arr.len() => {
                arr.push(new_value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Remove the value at `path`, returning it when present.
pub fn remove_path(
    value: &mut Value,
    path: &str,
) -> Option<Value> {
    let parts = segments(path);
    let (last, parents) = parts.split_last()?;

    let mut current = value;
    for segment in parents {
        current = child_mut(current, segment)?;
    }
    match current {
        Value::Object(map) => map.remove(*last),
        Value::Array(arr) => {
            let i = last.parse::<usize>().ok()?;
            if i < arr.len() { Some(arr.remove(i)) } else { None }
        }
        _ => None,
    }
}
