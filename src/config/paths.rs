//! Host-dependent locations of configuration sources.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable redirecting the shared configuration directory.
pub const SHARED_DIRECTORY_OVERRIDE: &str = "DiagmonTestSettings__SharedConfigDirectoryOverride";

/// Environment variable redirecting the user configuration directory.
pub const USER_DIRECTORY_OVERRIDE: &str = "DiagmonTestSettings__UserConfigDirectoryOverride";

/// Presence of this variable means the process runs under an orchestrator.
pub const ORCHESTRATOR_MARKER: &str = "KUBERNETES_SERVICE_HOST";

/// Name of the settings document in both the shared and user directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Atomic-swap target directory used by orchestrated volume mounts.
pub const ORCHESTRATOR_DATA_DIR: &str = "..data";

const APP_DIR: &str = "diagmon";

/// Locations of the shared and user configuration directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    shared: PathBuf,
    user: Option<PathBuf>,
}

impl ConfigPaths {
    /// Creates paths from explicit directories.
    #[must_use]
    pub fn new(shared: impl Into<PathBuf>, user: Option<PathBuf>) -> Self {
        Self {
            shared: shared.into(),
            user,
        }
    }

    /// Returns the platform default locations.
    ///
    /// The user directory is `None` when the platform reports no home or
    /// configuration directory.
    #[must_use]
    pub fn platform_default() -> Self {
        Self {
            shared: default_shared_dir(),
            user: default_user_dir(),
        }
    }

    /// Applies the test override variables found in `vars`.
    #[must_use]
    pub fn with_overrides(mut self, vars: &BTreeMap<String, String>) -> Self {
        if let Some(dir) = non_empty(vars, SHARED_DIRECTORY_OVERRIDE) {
            self.shared = PathBuf::from(dir);
        }
        if let Some(dir) = non_empty(vars, USER_DIRECTORY_OVERRIDE) {
            self.user = Some(PathBuf::from(dir));
        }
        self
    }

    /// Shared configuration directory.
    #[must_use]
    pub fn shared_dir(&self) -> &Path {
        &self.shared
    }

    /// User configuration directory, if known.
    #[must_use]
    pub fn user_dir(&self) -> Option<&Path> {
        self.user.as_deref()
    }

    /// Path of the shared settings document.
    #[must_use]
    pub fn shared_settings(&self) -> PathBuf {
        self.shared.join(SETTINGS_FILE_NAME)
    }

    /// Path of the user settings document, if the user directory is known.
    #[must_use]
    pub fn user_settings(&self) -> Option<PathBuf> {
        self.user.as_ref().map(|dir| dir.join(SETTINGS_FILE_NAME))
    }

    /// Directory read by the key-per-file layer.
    ///
    /// Under an orchestrator on Linux, the `..data` target of the shared
    /// directory is preferred when it exists.
    #[must_use]
    pub fn key_per_file_dir(&self, in_orchestrator: bool) -> PathBuf {
        if cfg!(target_os = "linux") && in_orchestrator {
            let data = self.shared.join(ORCHESTRATOR_DATA_DIR);
            if data.is_dir() {
                return data;
            }
        }
        self.shared.clone()
    }
}

/// Snapshot of the host facts the resolver depends on.
#[derive(Debug, Clone)]
pub struct HostEnvironment {
    /// Configuration directories after overrides.
    pub paths: ConfigPaths,
    /// Process environment variables (Unicode ones only).
    pub variables: BTreeMap<String, String>,
    /// Whether an orchestrator marker is present.
    pub in_orchestrator: bool,
}

impl HostEnvironment {
    /// Captures the environment of the current process.
    #[must_use]
    pub fn from_process() -> Self {
        let variables: BTreeMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self::from_vars(ConfigPaths::platform_default(), variables)
    }

    /// Builds a host environment from explicit variables.
    #[must_use]
    pub fn from_vars(paths: ConfigPaths, variables: BTreeMap<String, String>) -> Self {
        let in_orchestrator = variables.contains_key(ORCHESTRATOR_MARKER);
        Self {
            paths: paths.with_overrides(&variables),
            variables,
            in_orchestrator,
        }
    }

    /// Looks up a variable by exact name, ignoring blank values.
    #[must_use]
    pub fn var(&self, name: &str) -> Option<&str> {
        non_empty(&self.variables, name)
    }
}

fn non_empty<'a>(vars: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    vars.get(name)
        .map(String::as_str)
        .filter(|v| !v.trim().is_empty())
}

#[cfg(windows)]
fn default_shared_dir() -> PathBuf {
    std::env::var_os("ProgramData")
        .map_or_else(|| PathBuf::from(r"C:\ProgramData"), PathBuf::from)
        .join(APP_DIR)
}

#[cfg(not(windows))]
fn default_shared_dir() -> PathBuf {
    Path::new("/etc").join(APP_DIR)
}

#[cfg(windows)]
fn default_user_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(format!(".{APP_DIR}")))
}

#[cfg(not(windows))]
fn default_user_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}
