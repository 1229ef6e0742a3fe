//! Configuration layers and the sources that fill them.
//!
//! Every layer is a flat map from hierarchical key to string value. A
//! [`LayerSource`] knows how to (re)load its layer and how to cheaply tell
//! whether its backing storage changed since the last load.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde_json::Value;

use super::keys::{self, SEPARATOR};

/// Flat key/value contents of one layer.
pub type LayerData = BTreeMap<String, String>;

/// The kind of a layer, which also fixes its precedence.
///
/// Variants are declared from highest to lowest precedence, so the derived
/// ordering sorts the most authoritative layer first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LayerKind {
    /// Values synthesized at startup that must always win (e.g. the hash of a
    /// temporary API key).
    InMemoryOverrides,
    /// Values the operator passed explicitly on the command line.
    CommandLine,
    /// The per-user settings file.
    UserFile,
    /// The machine-wide settings file.
    SharedFile,
    /// One file per key, typically a mounted secret volume.
    KeyPerFile,
    /// Prefixed environment variables.
    Environment,
    /// Built-in defaults.
    Defaults,
}

impl LayerKind {
    /// Returns a human-readable label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::InMemoryOverrides => "in-memory overrides",
            Self::CommandLine => "command line",
            Self::UserFile => "user settings file",
            Self::SharedFile => "shared settings file",
            Self::KeyPerFile => "key-per-file directory",
            Self::Environment => "environment",
            Self::Defaults => "defaults",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of loading one layer.
///
/// Explicitly models all valid states so a broken layer never becomes an
/// error for the whole configuration:
/// - Successfully loaded contents
/// - Backing storage does not exist (optional layers)
/// - Backing storage exists but could not be read or parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerLoad {
    /// Contents were loaded.
    Loaded(LayerData),

    /// The backing file or directory does not exist.
    Missing,

    /// The backing storage could not be read or parsed.
    /// The resolver keeps the previous contents of the layer.
    Malformed {
        /// Reason for the failure (for logging).
        reason: String,
    },
}

/// Cheap change detector for file-backed layers.
///
/// Captures name, length and modification time of every file the layer
/// reads. An absent file or directory yields an empty fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fingerprint(Vec<(String, u64, Option<SystemTime>)>);

impl Fingerprint {
    fn of_files<'a>(files: impl IntoIterator<Item = (String, &'a Path)>) -> Self {
        let mut entries: Vec<_> = files
            .into_iter()
            .filter_map(|(name, path)| {
                std::fs::metadata(path)
                    .ok()
                    .map(|meta| (name, meta.len(), meta.modified().ok()))
            })
            .collect();
        entries.sort();
        Self(entries)
    }
}

/// A source of configuration for one layer.
pub trait LayerSource: Send + Sync + fmt::Debug {
    /// The layer this source fills.
    fn kind(&self) -> LayerKind;

    /// Loads the current contents.
    fn load(&self) -> LayerLoad;

    /// Returns the current fingerprint of the backing storage, or `None` if
    /// the source never changes after construction.
    fn fingerprint(&self) -> Option<Fingerprint> {
        None
    }
}

/// An immutable in-memory layer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    kind: LayerKind,
    data: LayerData,
}

impl MemorySource {
    /// Creates an in-memory source for the given layer.
    #[must_use]
    pub const fn new(kind: LayerKind, data: LayerData) -> Self {
        Self { kind, data }
    }
}

impl LayerSource for MemorySource {
    fn kind(&self) -> LayerKind {
        self.kind
    }

    fn load(&self) -> LayerLoad {
        LayerLoad::Loaded(self.data.clone())
    }
}

/// An optional JSON settings document.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    kind: LayerKind,
    path: PathBuf,
}

impl JsonFileSource {
    /// Creates a JSON file source for the given layer.
    #[must_use]
    pub fn new(kind: LayerKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Returns the path of the settings document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LayerSource for JsonFileSource {
    fn kind(&self) -> LayerKind {
        self.kind
    }

    fn load(&self) -> LayerLoad {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return LayerLoad::Missing,
            Err(e) => {
                return LayerLoad::Malformed {
                    reason: format!("Failed to read '{}': {e}", self.path.display()),
                };
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => {
                let mut data = LayerData::new();
                for (name, value) in &map {
                    flatten_json(name, value, &mut data);
                }
                LayerLoad::Loaded(data)
            }
            Ok(_) => LayerLoad::Malformed {
                reason: format!(
                    "'{}' must contain a JSON object at the top level",
                    self.path.display()
                ),
            },
            Err(e) => LayerLoad::Malformed {
                reason: format!("Invalid JSON in '{}': {e}", self.path.display()),
            },
        }
    }

    fn fingerprint(&self) -> Option<Fingerprint> {
        Some(Fingerprint::of_files([(String::new(), self.path.as_path())]))
    }
}

/// A directory where each regular file is one key and its trimmed content the
/// value. `__` in a file name maps to the hierarchy separator.
///
/// Hidden entries (names starting with `.`) and subdirectories are skipped,
/// which also skips the bookkeeping entries of orchestrated volume mounts.
#[derive(Debug, Clone)]
pub struct KeyPerFileSource {
    directory: PathBuf,
    ignored: Vec<String>,
}

impl KeyPerFileSource {
    /// Creates a key-per-file source reading from `directory`.
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ignored: Vec::new(),
        }
    }

    /// Skips the file called `name` (compared case-insensitively).
    #[must_use]
    pub fn ignoring(mut self, name: &str) -> Self {
        self.ignored.push(keys::fold(name));
        self
    }

    /// Returns the directory this source reads.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Lists `(key file name, path)` for every candidate file.
    fn entries(&self) -> std::io::Result<Vec<(String, PathBuf)>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with('.') || self.ignored.contains(&keys::fold(&name)) {
                continue;
            }
            let path = entry.path();
            // Follows symlinks, so mounted links to files count as files.
            if std::fs::metadata(&path).is_ok_and(|m| m.is_file()) {
                entries.push((name, path));
            }
        }
        entries.sort();
        Ok(entries)
    }
}

impl LayerSource for KeyPerFileSource {
    fn kind(&self) -> LayerKind {
        LayerKind::KeyPerFile
    }

    fn load(&self) -> LayerLoad {
        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return LayerLoad::Missing,
            Err(e) => {
                return LayerLoad::Malformed {
                    reason: format!(
                        "Failed to list '{}': {e}",
                        self.directory.display()
                    ),
                };
            }
        };

        let mut data = LayerData::new();
        for (name, path) in entries {
            match std::fs::read_to_string(&path) {
                Ok(content) => {
                    data.insert(name.replace("__", ":"), content.trim().to_string());
                }
                Err(e) => {
                    return LayerLoad::Malformed {
                        reason: format!("Failed to read '{}': {e}", path.display()),
                    };
                }
            }
        }
        LayerLoad::Loaded(data)
    }

    fn fingerprint(&self) -> Option<Fingerprint> {
        let entries = self.entries().unwrap_or_default();
        Some(Fingerprint::of_files(
            entries.iter().map(|(name, path)| (name.clone(), path.as_path())),
        ))
    }
}

/// Environment variables carrying a fixed prefix.
///
/// The prefix is matched case-insensitively and stripped; `__` in the rest
/// of the name maps to the hierarchy separator. Variables are captured once
/// at construction.
#[derive(Debug, Clone)]
pub struct EnvironmentSource {
    data: LayerData,
}

impl EnvironmentSource {
    /// Captures matching variables from the process environment.
    ///
    /// Variables whose name or value is not valid Unicode are ignored.
    #[must_use]
    pub fn from_process(prefix: &str) -> Self {
        Self::from_vars(
            prefix,
            std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?))),
        )
    }

    /// Captures matching variables from the given list.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: &str, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let folded_prefix = keys::fold(prefix);
        let data = vars
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name.as_ref();
                let rest = name.get(prefix.len()..)?;
                let matches = keys::fold(&name[..prefix.len()]) == folded_prefix;
                (matches && !rest.is_empty())
                    .then(|| (rest.replace("__", ":"), value.as_ref().to_string()))
            })
            .collect();
        Self { data }
    }
}

impl LayerSource for EnvironmentSource {
    fn kind(&self) -> LayerKind {
        LayerKind::Environment
    }

    fn load(&self) -> LayerLoad {
        LayerLoad::Loaded(self.data.clone())
    }
}

/// Flattens a JSON value into `key -> text` entries.
///
/// Objects contribute `parent:child` keys, arrays `parent:0`, `parent:1`,
/// scalars their text form and `null` an empty string.
pub fn flatten_json(key: &str, value: &Value, out: &mut LayerData) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                flatten_json(&format!("{key}{SEPARATOR}{name}"), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_json(&format!("{key}{SEPARATOR}{index}"), child, out);
            }
        }
        Value::String(s) => {
            out.insert(key.to_string(), s.clone());
        }
        Value::Null => {
            out.insert(key.to_string(), String::new());
        }
        Value::Bool(_) | Value::Number(_) => {
            out.insert(key.to_string(), value.to_string());
        }
    }
}
