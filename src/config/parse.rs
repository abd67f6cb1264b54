//! Parsers turning source text into configuration fragments.
//!
//! Two formats are supported: nested YAML and flat Java-style properties with
//! dotted keys. Both produce a `serde_json` object ready to be merged.

use super::merge::add;
use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::path::Path;

/// Text format of a configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Properties,
}

impl SourceFormat {
    /// Sniff the format from a file extension.
    ///
    /// Returns `None` for anything that is not `.yaml`, `.yml` or `.properties`.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Some(SourceFormat::Yaml),
            "properties" => Some(SourceFormat::Properties),
            _ => None,
        }
    }

    /// Parse `text` in this format. `source_name` is used in error messages.
    pub fn parse(self, text: &str, source_name: &str) -> ConfigResult<Map<String, Value>> {
        match self {
            SourceFormat::Yaml => parse_yaml(text, source_name),
            SourceFormat::Properties => parse_properties(text, source_name),
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Yaml => write!(f, "yaml"),
            SourceFormat::Properties => write!(f, "properties"),
        }
    }
}

/// Parse a YAML document into an object fragment.
///
/// An empty document yields an empty object.
pub fn parse_yaml(text: &str, source_name: &str) -> ConfigResult<Map<String, Value>> {
    let blank = text
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#') || line == "---");
    if blank {
        return Ok(Map::new());
    }

    let value: Value =
        serde_yaml::from_str(text).map_err(|e| ConfigError::parse(source_name, e))?;
    into_object(value, source_name)
}

/// Accept an object (or nothing at all) as a fragment.
pub fn into_object(value: Value, source_name: &str) -> ConfigResult<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ConfigError::not_an_object(source_name)),
    }
}

/// Parse a properties document into a nested object fragment.
///
/// `server.port=8080` becomes `{"server": {"port": "8080"}}`. Values are kept
/// as strings; later duplicates win. A node whose keys are all numeric
/// indexes becomes an array ordered by index, so `hosts.1=a` and `hosts.2=b`
/// give `{"hosts": ["a", "b"]}`.
pub fn parse_properties(text: &str, source_name: &str) -> ConfigResult<Map<String, Value>> {
    let mut root = Map::new();
    for (key, value) in logical_lines(text)
        .iter()
        .filter_map(|line| split_property(line))
    {
        add(&mut root, &key, Value::String(value)).map_err(|e| match e {
            ConfigError::Navigation { path, segment } => ConfigError::Navigation {
                path: format!("{source_name}: {path}"),
                segment,
            },
            other => other,
        })?;
    }
    Ok(root
        .into_iter()
        .map(|(key, value)| (key, index_arrays(value)))
        .collect())
}

/// Turn objects keyed only by indexes into arrays, bottom-up.
fn index_arrays(value: Value) -> Value {
    let Value::Object(map) = value else {
        return value;
    };
    let map: Map<String, Value> = map
        .into_iter()
        .map(|(key, child)| (key, index_arrays(child)))
        .collect();
    if map.is_empty() || !map.keys().all(|key| index_of(key).is_some()) {
        return Value::Object(map);
    }

    let mut items: Vec<(u64, Value)> = map
        .into_iter()
        .filter_map(|(key, child)| index_of(&key).map(|index| (index, child)))
        .collect();
    items.sort_by_key(|(index, _)| *index);
    Value::Array(items.into_iter().map(|(_, child)| child).collect())
}

fn index_of(key: &str) -> Option<u64> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// Join continuation lines and drop blanks and comments.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pending: Option<String> = None;

    for raw in text.lines() {
        let line = raw.trim_start();
        let mut current = match pending.take() {
            Some(mut acc) => {
                acc.push_str(line);
                acc
            }
            None => {
                if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                    continue;
                }
                line.to_string()
            }
        };

        if ends_with_continuation(&current) {
            current.pop();
            pending = Some(current);
        } else {
            lines.push(current);
        }
    }

    if let Some(rest) = pending {
        lines.push(rest);
    }
    lines
}

/// A trailing backslash continues the line unless it is itself escaped.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line into an unescaped key and value.
fn split_property(line: &str) -> Option<(String, String)> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut key_end = chars.len();
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' | ' ' | '\t' => {
                key_end = i;
                break;
            }
            _ => i += 1,
        }
    }
    let key_end = key_end.min(chars.len());

    // Skip whitespace, at most one separator, then whitespace again
    let mut j = key_end;
    while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
        j += 1;
    }
    if j < chars.len() && (chars[j] == '=' || chars[j] == ':') {
        j += 1;
    }
    while j < chars.len() && (chars[j] == ' ' || chars[j] == '\t') {
        j += 1;
    }

    let key = unescape(&chars[..key_end].iter().collect::<String>());
    if key.is_empty() {
        return None;
    }
    let value = unescape(&chars[j..].iter().collect::<String>());
    Some((key, value))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('u');
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
