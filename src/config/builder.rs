//! Accumulates configuration layers before resolution.

use super::configuration::Configuration;
use super::loader::Layer;
use super::merge::{add, merge};
use super::parse::{into_object, parse_properties, parse_yaml};
use super::resolve::resolve;
use crate::error::ConfigResult;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Mutable accumulator for configuration layers.
///
/// Layers are merged in the order they are added; later layers win. Nothing
/// is resolved until [`ConfigurationBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationBuilder {
    tree: Map<String, Value>,
    layers: Vec<String>,
}

impl ConfigurationBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder seeded with an existing tree.
    pub fn from_tree(tree: Map<String, Value>) -> Self {
        Self {
            tree,
            layers: Vec::new(),
        }
    }

    /// Set `value` at the dotted `path`, creating intermediate objects.
    pub fn add(&mut self, path: &str, value: impl Into<Value>) -> ConfigResult<&mut Self> {
        add(&mut self.tree, path, value.into())?;
        Ok(self)
    }

    pub fn add_str(&mut self, path: &str, value: &str) -> ConfigResult<&mut Self> {
        self.add(path, Value::String(value.to_string()))
    }

    pub fn add_i64(&mut self, path: &str, value: i64) -> ConfigResult<&mut Self> {
        self.add(path, Value::from(value))
    }

    /// Deep merge a fragment into the accumulated tree.
    pub fn merge(&mut self, fragment: Map<String, Value>) -> &mut Self {
        merge(&mut self.tree, fragment);
        self
    }

    /// Deep merge an arbitrary value, which must be an object (or null).
    pub fn merge_value(&mut self, fragment: Value, source_name: &str) -> ConfigResult<&mut Self> {
        let fragment = into_object(fragment, source_name)?;
        Ok(self.merge(fragment))
    }

    /// Merge a named layer and remember its name.
    pub fn add_layer(&mut self, layer: Layer) -> &mut Self {
        debug!(layer = %layer.name, tier = %layer.tier, keys = layer.tree.len(), "Merging layer");
        self.layers.push(layer.name);
        self.merge(layer.tree)
    }

    pub fn add_yaml(&mut self, text: &str) -> ConfigResult<&mut Self> {
        let fragment = parse_yaml(text, "<yaml>")?;
        Ok(self.merge(fragment))
    }

    pub fn add_properties(&mut self, text: &str) -> ConfigResult<&mut Self> {
        let fragment = parse_properties(text, "<properties>")?;
        Ok(self.merge(fragment))
    }

    /// Set `node` to a flat object of system properties.
    ///
    /// Property names have `.` replaced with `_`, so `user.home` is
    /// referenced as `${SYSTEM.user_home}`.
    pub fn add_system_properties<I, K, V>(&mut self, node: &str, properties: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.tree.insert(node.to_string(), flat_fragment(properties));
        self
    }

    /// Set `node` to a flat object of environment variables.
    pub fn add_environment_variables<I, K, V>(&mut self, node: &str, vars: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.tree.insert(node.to_string(), flat_fragment(vars));
        self
    }

    /// The accumulated, unresolved tree.
    pub fn tree(&self) -> &Map<String, Value> {
        &self.tree
    }

    /// Names of the layers merged so far, in order.
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Resolve all references and freeze the result.
    pub fn build(self) -> ConfigResult<Configuration> {
        let resolved = resolve(Value::Object(self.tree))?;
        let tree = into_object(resolved, "<resolved>")?;
        Ok(Configuration::new(tree))
    }
}

/// Flat object with keys sorted so output is stable across runs.
fn flat_fragment<I, K, V>(entries: I) -> Value
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let sorted: BTreeMap<String, String> = entries
        .into_iter()
        .map(|(k, v)| (k.as_ref().replace('.', "_"), v.into()))
        .collect();
    Value::Object(
        sorted
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}
