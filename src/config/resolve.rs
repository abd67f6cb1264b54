//! Variable resolution for merged configuration trees.
//!
//! String values may embed `${path}` or `${path:-default}` references to any
//! other scalar in the tree, e.g. `"jdbc://${db.host}:${db.port}"` or
//! `"${ENV.HOME}"`. References are resolved after all layers are merged, so a
//! value from an early layer may point at a key only a later layer supplies.

use super::merge::get_path;
use crate::error::{ConfigError, ConfigResult};
use regex_lite::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::trace;

/// Opening of `${path}` or `${path:-default}`. The default clause may hold
/// nested placeholders, so its closing brace is found by brace matching.
static PLACEHOLDER_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z0-9_.-]+)(\}|:-)").expect("placeholder pattern is valid")
});

/// Upper bound on substitution passes over a single string.
pub const MAX_PASSES: usize = 32;

/// One `${path}` or `${path:-default}` occurrence inside a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placeholder<'t> {
    start: usize,
    end: usize,
    path: &'t str,
    default: Option<&'t str>,
}

/// First well-formed placeholder starting at or after byte offset `from`.
fn find_placeholder(text: &str, mut from: usize) -> Option<Placeholder<'_>> {
    while let Some(caps) = PLACEHOLDER_HEAD.captures_at(text, from) {
        let head = caps.get(0)?;
        let path = caps.get(1)?.as_str();
        if &caps[2] == "}" {
            return Some(Placeholder {
                start: head.start(),
                end: head.end(),
                path,
                default: None,
            });
        }
        if let Some(close) = closing_brace(text, head.end()) {
            return Some(Placeholder {
                start: head.start(),
                end: close + 1,
                path,
                default: Some(&text[head.end()..close]),
            });
        }
        // Unbalanced default clause; keep scanning after this `$`
        from = head.start() + 1;
    }
    None
}

/// Byte offset of the `}` closing a clause that opened just before `from`.
fn closing_brace(text: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, byte) in text.as_bytes()[from..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Resolve every reference in `root` against `root` itself.
pub fn resolve(root: Value) -> ConfigResult<Value> {
    let source = root.clone();
    VariableResolver::new(&source).apply(root)
}

/// Resolve every reference in `target`, looking values up in `source`.
pub fn resolve_against(target: Value, source: &Value) -> ConfigResult<Value> {
    VariableResolver::new(source).apply(target)
}

/// Whether `text` contains at least one reference.
pub fn has_placeholders(text: &str) -> bool {
    find_placeholder(text, 0).is_some()
}

/// The outermost paths referenced by `text`, in order of appearance.
///
/// Paths nested inside default clauses are not included.
pub fn references(text: &str) -> Vec<&str> {
    let mut paths = Vec::new();
    let mut from = 0;
    while let Some(placeholder) = find_placeholder(text, from) {
        paths.push(placeholder.path);
        from = placeholder.end;
    }
    paths
}

/// Resolves references against a fixed source tree.
///
/// Resolved string targets are memoised by path. The stack of paths currently
/// being resolved turns self-dependent references into a [`ConfigError::Cycle`]
/// instead of unbounded recursion.
pub struct VariableResolver<'a> {
    source: &'a Value,
    resolved: HashMap<String, String>,
    in_progress: Vec<String>,
}

impl<'a> VariableResolver<'a> {
    pub fn new(source: &'a Value) -> Self {
        Self {
            source,
            resolved: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Rewrite every string in `target` with its references substituted.
    pub fn apply(mut self, target: Value) -> ConfigResult<Value> {
        self.resolve_value(target, "")
    }

    fn resolve_value(&mut self, value: Value, path: &str) -> ConfigResult<Value> {
        match value {
            Value::String(text) => {
                if has_placeholders(&text) {
                    Ok(Value::String(self.substitute(&text, path, &text)?))
                } else {
                    Ok(Value::String(text))
                }
            }
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    let child_path = if path.is_empty() {
                        key.clone()
                    } else {
                        format!("{path}.{key}")
                    };
                    let child = self.resolve_value(child, &child_path)?;
                    out.insert(key, child);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| self.resolve_value(item, &format!("{path}[{i}]")))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Array),
            other @ (Value::Null | Value::Bool(_) | Value::Number(_)) => Ok(other),
        }
    }

    /// Substitute `text` repeatedly until no reference is left.
    ///
    /// `original` is the string the substitution started from, for error
    /// reporting.
    fn substitute(&mut self, text: &str, path: &str, original: &str) -> ConfigResult<String> {
        let mut current = text.to_string();
        for _ in 0..MAX_PASSES {
            if !has_placeholders(&current) {
                return Ok(current);
            }
            current = self.substitute_once(&current, path, original)?;
        }
        if has_placeholders(&current) {
            return Err(ConfigError::Unconverged {
                path: path.to_string(),
                passes: MAX_PASSES,
            });
        }
        Ok(current)
    }

    /// Replace each placeholder in `text` once, left to right.
    ///
    /// The default clause is only expanded when the primary path has no value.
    fn substitute_once(&mut self, text: &str, path: &str, original: &str) -> ConfigResult<String> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        while let Some(placeholder) = find_placeholder(text, last) {
            let replacement = match self.lookup(placeholder.path)? {
                Some(value) => value,
                None => match placeholder.default {
                    Some(default) => self.substitute(default, path, original)?,
                    None => {
                        return Err(ConfigError::missing_reference(placeholder.path, original));
                    }
                },
            };
            out.push_str(&text[last..placeholder.start]);
            out.push_str(&replacement);
            last = placeholder.end;
        }
        out.push_str(&text[last..]);
        Ok(out)
    }

    /// Textual value of the scalar at `path`, or `None` if absent or null.
    fn lookup(&mut self, path: &str) -> ConfigResult<Option<String>> {
        if let Some(done) = self.resolved.get(path) {
            return Ok(Some(done.clone()));
        }

        let source = self.source;
        let text = match get_path(source, path) {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::Bool(b)) => return Ok(Some(b.to_string())),
            Some(Value::Number(n)) => return Ok(Some(n.to_string())),
            Some(Value::Object(_) | Value::Array(_)) => {
                return Err(ConfigError::NonScalarReference {
                    path: path.to_string(),
                });
            }
            Some(Value::String(text)) => text,
        };

        if let Some(start) = self.in_progress.iter().position(|p| p == path) {
            let mut paths = self.in_progress[start..].to_vec();
            paths.push(path.to_string());
            return Err(ConfigError::Cycle { paths });
        }

        self.in_progress.push(path.to_string());
        let result = self.substitute(text, path, text);
        self.in_progress.pop();
        let value = result?;

        trace!(path, value = %value, "Resolved reference");
        self.resolved.insert(path.to_string(), value.clone());
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::merge::deep_merge_all;
    use serde_json::json;

    #[test]
    fn test_reference_to_later_layer() {
        let merged = deep_merge_all(vec![
            json!({"greeting": "Hello, ${name}"}),
            json!({"name": "World"}),
        ]);
        let resolved = resolve(merged).unwrap();
        assert_eq!(resolved, json!({"greeting": "Hello, World", "name": "World"}));
    }

    #[test]
    fn test_multiple_references_keep_literal_text() {
        let root = json!({
            "db": {"host": "localhost", "port": 5432},
            "url": "jdbc://${db.host}:${db.port}/app?ssl=${ssl}",
            "ssl": true
        });
        let resolved = resolve(root).unwrap();
        assert_eq!(resolved["url"], json!("jdbc://localhost:5432/app?ssl=true"));
    }

    #[test]
    fn test_transitive_references() {
        let root = json!({
            "a": "${b}/a",
            "b": "${c}/b",
            "c": "root"
        });
        let resolved = resolve(root).unwrap();
        assert_eq!(resolved["a"], json!("root/b/a"));
        assert_eq!(resolved["b"], json!("root/b"));
    }

    #[test]
    fn test_two_node_cycle() {
        let err = resolve(json!({"a": "${b}", "b": "${a}"})).unwrap_err();
        match err {
            ConfigError::Cycle { paths } => {
                assert_eq!(paths.first(), paths.last());
                assert!(paths.contains(&"a".to_string()));
                assert!(paths.contains(&"b".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_reference_is_cycle() {
        let err = resolve(json!({"x": {"y": "prefix ${x.y}"}})).unwrap_err();
        assert!(matches!(err, ConfigError::Cycle { .. }));
    }

    #[test]
    fn test_default_used_when_missing() {
        let resolved = resolve(json!({"port": "${MISSING:-8080}"})).unwrap();
        assert_eq!(resolved, json!({"port": "8080"}));
    }

    #[test]
    fn test_empty_default() {
        let resolved = resolve(json!({"suffix": "[${nope:-}]"})).unwrap();
        assert_eq!(resolved["suffix"], json!("[]"));
    }

    #[test]
    fn test_default_ignored_when_present() {
        let resolved = resolve(json!({"port": "${p:-8080}", "p": 9090})).unwrap();
        assert_eq!(resolved["port"], json!("9090"));
    }

    #[test]
    fn test_null_target_uses_default() {
        let resolved = resolve(json!({"v": "${n:-fallback}", "n": null})).unwrap();
        assert_eq!(resolved["v"], json!("fallback"));
    }

    #[test]
    fn test_nested_default_reference() {
        let resolved = resolve(json!({"v": "${missing:-${fallback}}", "fallback": "fb"})).unwrap();
        assert_eq!(resolved["v"], json!("fb"));
    }

    #[test]
    fn test_default_not_expanded_when_target_present() {
        let resolved = resolve(json!({"v": "${a:-${b}}", "a": "x"})).unwrap();
        assert_eq!(resolved["v"], json!("x"));
    }

    #[test]
    fn test_missing_reference_inside_default_reports_whole_string() {
        let err = resolve(json!({"v": "pre ${a:-${b}} post"})).unwrap_err();
        match err {
            ConfigError::MissingReference {
                path,
                source_string,
            } => {
                assert_eq!(path, "b");
                assert_eq!(source_string, "pre ${a:-${b}} post");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_deeply_nested_defaults() {
        let mut text = "end".to_string();
        for i in 0..40 {
            text = format!("${{m{i}:-{text}}}");
        }
        let resolved = resolve(json!({ "v": text.clone() })).unwrap();
        assert_eq!(resolved["v"], json!("end"));

        let resolved = resolve(json!({ "v": text, "m20": "found" })).unwrap();
        assert_eq!(resolved["v"], json!("found"));
    }

    #[test]
    fn test_assembled_placeholders_resolve_in_later_passes() {
        let text = format!("{}z{}", "${open}".repeat(5), "}".repeat(5));
        let resolved = resolve(json!({"open": "${", "z": "z", "v": text})).unwrap();
        assert_eq!(resolved["v"], json!("z"));
        assert_eq!(resolved["open"], json!("${"));
    }

    #[test]
    fn test_non_converging_substitution_fails() {
        let depth = MAX_PASSES + 8;
        let text = format!("{}z{}", "${open}".repeat(depth), "}".repeat(depth));
        let err = resolve(json!({"open": "${", "z": "z", "v": text})).unwrap_err();
        match err {
            ConfigError::Unconverged { path, passes } => {
                assert_eq!(path, "v");
                assert_eq!(passes, MAX_PASSES);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unbalanced_default_left_as_text() {
        let root = json!({"v": "${a:-{never closed"});
        assert_eq!(resolve(root.clone()).unwrap(), root);
        assert!(!has_placeholders("${a:-{never closed"));
    }

    #[test]
    fn test_missing_reference_reports_path_and_string() {
        let err = resolve(json!({"url": "http://${server.host}/"})).unwrap_err();
        match err {
            ConfigError::MissingReference {
                path,
                source_string,
            } => {
                assert_eq!(path, "server.host");
                assert_eq!(source_string, "http://${server.host}/");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_scalar_reference_fails() {
        let err = resolve(json!({"v": "${db}", "db": {"host": "h"}})).unwrap_err();
        assert!(matches!(err, ConfigError::NonScalarReference { path } if path == "db"));

        let err = resolve(json!({"v": "${list}", "list": [1, 2]})).unwrap_err();
        assert!(matches!(err, ConfigError::NonScalarReference { .. }));
    }

    #[test]
    fn test_strings_in_arrays_are_resolved() {
        let root = json!({
            "host": "example.org",
            "servers": ["${host}:80", {"url": "https://${host}"}]
        });
        let resolved = resolve(root).unwrap();
        assert_eq!(
            resolved["servers"],
            json!(["example.org:80", {"url": "https://example.org"}])
        );
    }

    #[test]
    fn test_env_namespace() {
        let root = json!({
            "ENV": {"FOO_BAR": "baz"},
            "value": "${ENV.FOO_BAR}"
        });
        let resolved = resolve(root).unwrap();
        assert_eq!(resolved["value"], json!("baz"));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let root = json!({
            "a": "${b}-${c:-x}",
            "b": "${d}",
            "d": 1.5,
            "list": ["${a}"]
        });
        let once = resolve(root).unwrap();
        let twice = resolve(once.clone()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once["a"], json!("1.5-x"));
    }

    #[test]
    fn test_resolve_against_other_source() {
        let source = json!({"name": "other"});
        let target = json!({"greeting": "hi ${name}", "name": "ignored"});
        let resolved = resolve_against(target, &source).unwrap();
        assert_eq!(resolved["greeting"], json!("hi other"));
        assert_eq!(resolved["name"], json!("ignored"));
    }

    #[test]
    fn test_text_without_placeholder_syntax_untouched() {
        let root = json!({"a": "$notref ${ not-a-ref } {b} $", "n": 3});
        let resolved = resolve(root.clone()).unwrap();
        assert_eq!(resolved, root);
    }

    #[test]
    fn test_key_order_preserved() {
        let root = json!({"z": "${a}", "a": "1", "m": 2});
        let resolved = resolve(root).unwrap();
        let keys: Vec<&str> = resolved
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_references() {
        assert_eq!(
            references("${a.b} and ${c:-d} and ${ bad }"),
            vec!["a.b", "c"]
        );
        assert_eq!(references("${a:-${b}}-${c}"), vec!["a", "c"]);
    }
}
