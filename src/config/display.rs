//! Rendering of the merged configuration for `config show`.

use serde_json::{Map, Value};

use super::error::ConfigError;
use super::keys::{self, SEPARATOR};
use super::view::ConfigurationView;

/// Placeholder printed instead of sensitive values.
pub const REDACTED: &str = ":REDACTED:";

const SENSITIVE_SEGMENTS: &[&str] = &["password", "secret", "token"];

/// How much of the configuration `config show` reveals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayLevel {
    /// Every value as merged.
    Full,
    /// Sensitive values replaced with a placeholder.
    #[default]
    Redacted,
}

/// Returns `true` if the value under `key` must not be shown when redacting.
#[must_use]
pub fn is_sensitive(key: &str) -> bool {
    if keys::fold(key) == keys::fold(keys::API_KEY_HASH) {
        return true;
    }
    let last = key.rsplit(SEPARATOR).next().unwrap_or(key);
    let last = keys::fold(last);
    SENSITIVE_SEGMENTS.iter().any(|s| last.contains(s))
}

/// Renders the view as an indented JSON document.
///
/// Hierarchical keys become nested objects. When a key holds a value and
/// also has children, the children win.
///
/// # Errors
///
/// Returns [`ConfigError::Serialize`] if serialization fails.
pub fn render(view: &ConfigurationView, level: DisplayLevel) -> Result<String, ConfigError> {
    let mut root = Map::new();
    for (key, value) in view.iter() {
        let shown = if level == DisplayLevel::Redacted && is_sensitive(key) {
            REDACTED
        } else {
            value
        };
        insert(&mut root, &key.split(SEPARATOR).collect::<Vec<_>>(), shown);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(root))?)
}

fn insert(map: &mut Map<String, Value>, path: &[&str], value: &str) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    // Sections merge case-insensitively under the first spelling seen.
    let name = map
        .keys()
        .find(|k| k.eq_ignore_ascii_case(first))
        .cloned()
        .unwrap_or_else(|| (*first).to_string());

    if rest.is_empty() {
        map.entry(name).or_insert_with(|| Value::String(value.to_string()));
        return;
    }

    let child = map
        .entry(name)
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(child) = child {
        insert(child, rest, value);
    }
}
