//! Configuration layer for diagmon.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - Layer sources and their load outcomes ([`LayerSource`], [`LayerLoad`])
//! - Merging and live reloading ([`ConfigurationResolver`], [`ConfigurationView`])
//! - Typed option sections ([`MetricsOptions`], [`DiagnosticPortOptions`], ...)
//! - The `config show` writer ([`render`])
//! - Default values ([`defaults`]) and well-known keys ([`keys`])
//!
//! # Priority
//!
//! Values are resolved with the following priority (highest to lowest):
//!
//! 1. **In-memory overrides** - values synthesized at startup
//! 2. **Command line** - values explicitly passed by the operator
//! 3. **User settings file**
//! 4. **Shared settings file**
//! 5. **Key-per-file directory**
//! 6. **Environment** - variables prefixed with `DIAGMON_`
//! 7. **Built-in defaults**
//!
//! A layer that fails to load never fails the whole configuration: it is
//! skipped on startup and keeps its previous contents on reload.

mod cli;
pub mod defaults;
mod display;
mod error;
pub mod keys;
mod layer;
mod options;
mod paths;
mod resolver;
mod startup;
mod view;

#[cfg(test)]
mod layer_tests;
#[cfg(test)]
mod resolver_tests;

pub use cli::{Cli, Command, ConfigAction, DisplayLevelArg, StartupArgs};
pub use display::{DisplayLevel, REDACTED, is_sensitive, render};
pub use error::ConfigError;
pub use layer::{
    EnvironmentSource, Fingerprint, JsonFileSource, KeyPerFileSource, LayerData, LayerKind,
    LayerLoad, LayerSource, MemorySource, flatten_json,
};
pub use options::{
    ConnectionMode, DiagnosticPortOptions, MetricsOptions, ShutdownOptions, StorageOptions,
    split_urls,
};
pub use paths::{ConfigPaths, HostEnvironment};
pub use resolver::{ChangeEvent, ConfigHandle, ConfigurationResolver};
pub use startup::{StartupSettings, defaults_layer};
pub use view::{ConfigurationView, merge};
