//! Deep merge of configuration layers.
//!
//! Objects are merged key by key, recursively. Everything else (strings,
//! numbers, booleans, nulls and arrays) is replaced wholesale by the later
//! layer. Arrays are never merged element-wise.

use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};

/// Merge `source` into `target` in place, with `source` taking precedence.
///
/// - Keys missing from `target` are appended in `source` order
/// - Keys that hold objects on both sides are merged recursively
/// - Any other existing key is overwritten in place, keeping its position
/// - Keys only present in `target` are left untouched
///
/// Returns `target` for chaining.
pub fn merge(
    target: &mut Map<String, Value>,
    source: Map<String, Value>,
) -> &mut Map<String, Value> {
    for (key, source_value) in source {
        match target.get_mut(&key) {
            Some(existing) => merge_value(existing, source_value),
            None => {
                target.insert(key, source_value);
            }
        }
    }
    target
}

fn merge_value(existing: &mut Value, source_value: Value) {
    match (existing, source_value) {
        (Value::Object(target_child), Value::Object(source_child)) => {
            merge(target_child, source_child);
        }
        (existing, source_value) => *existing = source_value,
    }
}

/// Deep merge two values, with `overlay` taking precedence over `base`.
///
/// # Example
/// ```
/// use serde_json::json;
/// use layered_config::config::deep_merge;
///
/// let base = json!({
///     "db": { "host": "localhost", "port": 5432 },
///     "features": ["a", "b"]
/// });
/// let overlay = json!({
///     "db": { "port": 5433 },
///     "features": ["c"]
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result, json!({
///     "db": { "host": "localhost", "port": 5433 },
///     "features": ["c"]
/// }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            merge(&mut base_map, overlay_map);
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge multiple layers in order, with later layers taking precedence.
///
/// Equivalent to folding `deep_merge` over the list, starting from an empty object.
pub fn deep_merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values
        .into_iter()
        .fold(Value::Object(Map::new()), deep_merge)
}

/// Set `value` at the dotted `path`, creating intermediate objects as needed.
///
/// Absent or null intermediate segments are replaced by empty objects. An
/// intermediate segment holding any other non-object value cannot be navigated
/// through and is reported as a [`ConfigError::Navigation`].
pub fn add(root: &mut Map<String, Value>, path: &str, value: Value) -> ConfigResult<()> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ConfigError::navigation(path, path));
    }

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| ConfigError::navigation(path, path))?;

    let mut node = root;
    for segment in parents {
        let child = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if child.is_null() {
            *child = Value::Object(Map::new());
        }
        node = match child {
            Value::Object(map) => map,
            _ => return Err(ConfigError::navigation(path, segment)),
        };
    }

    node.insert(last.to_string(), value);
    Ok(())
}

/// Look up the node at the dotted `path`, navigating object nodes only.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(root, |node, segment| match node {
            Value::Object(map) => map.get(segment),
            _ => None,
        })
}
