//! The resolved, read-only configuration.

use super::builder::ConfigurationBuilder;
use super::merge::get_path;
use crate::format::OutputFormat;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A fully merged and resolved configuration tree.
///
/// Immutable once built. Clones share the same tree, so a configuration can be
/// handed to any number of readers.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    json: Arc<Map<String, Value>>,
}

impl Configuration {
    pub(crate) fn new(json: Map<String, Value>) -> Self {
        Self {
            json: Arc::new(json),
        }
    }

    pub fn empty() -> Self {
        Self::new(Map::new())
    }

    /// The underlying object tree.
    pub fn json(&self) -> &Map<String, Value> {
        &self.json
    }

    /// Look up the value at a dotted path.
    ///
    /// Navigates the same way `${path}` references do, so a key that itself
    /// contains a dot is not reachable.
    pub fn get(&self, path: &str) -> Option<&Value> {
        match path.split_once('.') {
            Some((first, rest)) => get_path(self.json.get(first)?, rest),
            None => self.json.get(path),
        }
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Integer at `path`. Numeric strings (as produced by substitution or
    /// properties files) are parsed too.
    pub fn get_i64(&self, path: &str) -> Option<i64> {
        match self.get(path)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        match self.get(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The named sub-object as a nested configuration, empty if absent.
    pub fn get_configuration(&self, name: &str) -> Configuration {
        match self.get(name) {
            Some(Value::Object(map)) => Configuration::new(map.clone()),
            _ => Configuration::empty(),
        }
    }

    /// The object elements of the named array as nested configurations.
    ///
    /// Returns an empty list if the key is absent or not an array.
    pub fn get_configurations(&self, name: &str) -> Vec<Configuration> {
        match self.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_object())
                .map(|map| Configuration::new(map.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// A builder seeded with a copy of this tree, for programmatic extension.
    pub fn as_builder(&self) -> ConfigurationBuilder {
        ConfigurationBuilder::from_tree(self.json.as_ref().clone())
    }

    /// Render the tree in the given output format.
    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        format.render(self.json.as_ref())
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for Configuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.json.as_ref().serialize(serializer)
    }
}

impl std::fmt::Display for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Object(self.json.as_ref().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> Configuration {
        match value {
            Value::Object(map) => Configuration::new(map),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_get_nested_paths() {
        let cfg = config(json!({"db": {"host": "h", "port": 5432, "ssl": "true"}}));
        assert_eq!(cfg.get_str("db.host"), Some("h"));
        assert_eq!(cfg.get_i64("db.port"), Some(5432));
        assert_eq!(cfg.get_bool("db.ssl"), Some(true));
        assert_eq!(cfg.get("db.missing"), None);
    }

    #[test]
    fn test_get_matches_reference_lookup() {
        let cfg = config(json!({"a.b": "x", "a": {"c": "y"}}));
        assert_eq!(cfg.get("a.b"), None);
        assert_eq!(cfg.get_str("a.c"), Some("y"));

        let mut builder = cfg.as_builder();
        builder.add_str("r", "${a.c}").unwrap();
        assert_eq!(builder.build().unwrap().get_str("r"), cfg.get_str("a.c"));
    }

    #[test]
    fn test_get_numeric_string() {
        let cfg = config(json!({"port": "8080"}));
        assert_eq!(cfg.get_i64("port"), Some(8080));
    }

    #[test]
    fn test_get_configuration() {
        let cfg = config(json!({"db": {"host": "h"}, "scalar": 1}));
        assert_eq!(cfg.get_configuration("db").get_str("host"), Some("h"));
        assert!(cfg.get_configuration("missing").json().is_empty());
        assert!(cfg.get_configuration("scalar").json().is_empty());
    }

    #[test]
    fn test_get_configurations() {
        let cfg = config(json!({"servers": [{"name": "a"}, {"name": "b"}]}));
        let servers = cfg.get_configurations("servers");
        let names: Vec<_> = servers.iter().filter_map(|s| s.get_str("name")).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(cfg.get_configurations("missing").is_empty());
    }

    #[test]
    fn test_as_builder_does_not_mutate_original() {
        let cfg = config(json!({"a": 1}));
        let mut builder = cfg.as_builder();
        builder.add_i64("b", 2).unwrap();
        let extended = builder.build().unwrap();
        assert_eq!(cfg.get("b"), None);
        assert_eq!(extended.get_i64("b"), Some(2));
        assert_eq!(extended.get_i64("a"), Some(1));
    }

    #[test]
    fn test_clones_share_tree() {
        let cfg = config(json!({"a": 1}));
        let clone = cfg.clone();
        assert!(Arc::ptr_eq(&cfg.json, &clone.json));
        assert_eq!(cfg, clone);
    }

    #[test]
    fn test_configuration_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Configuration>();
    }
}
