//! Immutable merged configuration snapshots.

use std::collections::BTreeMap;
use std::str::FromStr;

use super::error::ConfigError;
use super::keys::{self, SEPARATOR};
use super::layer::{LayerData, LayerKind};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: String,
    layer: LayerKind,
}

/// An immutable snapshot of the merged key/value configuration.
///
/// Lookups are case-insensitive. Each value remembers which layer supplied
/// it, which is what `config show` and the tests rely on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationView {
    entries: BTreeMap<String, Entry>,
    generation: u64,
}

impl ConfigurationView {
    /// Returns the value for `key`, if any layer defines it.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&keys::fold(key)).map(|e| e.value.as_str())
    }

    /// Returns the value for `key` if it is present and not blank.
    #[must_use]
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Parses the value for `key`.
    ///
    /// Returns `Ok(None)` when the key is absent or blank.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the value does not parse.
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get_non_empty(key)
            .map(|raw| raw.parse::<T>().map_err(|e| ConfigError::invalid(key, raw, e.to_string())))
            .transpose()
    }

    /// Parses a boolean value (`true`/`false`, any case).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for anything else.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        self.get_non_empty(key)
            .map(|raw| {
                if raw.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else if raw.eq_ignore_ascii_case("false") {
                    Ok(false)
                } else {
                    Err(ConfigError::invalid(key, raw, "expected 'true' or 'false'"))
                }
            })
            .transpose()
    }

    /// Returns the layer that supplied `key`.
    #[must_use]
    pub fn source_of(&self, key: &str) -> Option<LayerKind> {
        self.entries.get(&keys::fold(key)).map(|e| e.layer)
    }

    /// Returns `true` if any key lives under `prefix`.
    #[must_use]
    pub fn has_section(&self, prefix: &str) -> bool {
        self.section(prefix).next().is_some()
    }

    /// Iterates `(key, value)` pairs whose key lives under `prefix`.
    ///
    /// Keys are yielded with their original spelling.
    pub fn section<'a>(&'a self, prefix: &str) -> impl Iterator<Item = (&'a str, &'a str)> + use<'a> {
        let folded = format!("{}{SEPARATOR}", keys::fold(prefix));
        self.entries
            .range(folded.clone()..)
            .take_while(move |(k, _)| k.starts_with(&folded))
            .map(|(_, e)| (e.key.as_str(), e.value.as_str()))
    }

    /// Iterates every `(key, value)` pair in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|e| (e.key.as_str(), e.value.as_str()))
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no layer contributed anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Monotonic counter incremented on every published change.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if both views hold the same keys, values and sources.
    #[must_use]
    pub fn same_contents(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

/// Merges layer contents into a view.
///
/// Layers are applied in precedence order no matter how they are passed in,
/// so the result depends only on the contents of each layer. Within a
/// single layer, keys that differ only in case resolve to the last one in
/// key order.
#[must_use]
pub fn merge<'a, I>(layers: I, generation: u64) -> ConfigurationView
where
    I: IntoIterator<Item = (LayerKind, &'a LayerData)>,
{
    let mut ordered: Vec<_> = layers.into_iter().collect();
    // Lowest precedence first, so higher layers overwrite.
    ordered.sort_by(|a, b| b.0.cmp(&a.0));

    let mut entries = BTreeMap::new();
    for (layer, data) in ordered {
        for (key, value) in data {
            entries.insert(
                keys::fold(key),
                Entry {
                    key: key.clone(),
                    value: value.clone(),
                    layer,
                },
            );
        }
    }
    ConfigurationView {
        entries,
        generation,
    }
}
