//! Layered configuration resolution with change watching.
//!
//! [`ConfigurationResolver`] owns every [`LayerSource`], merges them into an
//! immutable [`ConfigurationView`] and republishes a new view whenever a
//! reloadable layer changes on disk. Readers never block: the current view
//! lives in an [`ArcSwap`] and is handed out as `Arc<ConfigurationView>`.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use super::defaults::{self, ENV_PREFIX};
use super::layer::{
    EnvironmentSource, Fingerprint, JsonFileSource, KeyPerFileSource, LayerData, LayerKind,
    LayerLoad, LayerSource, MemorySource,
};
use super::paths::{HostEnvironment, SETTINGS_FILE_NAME};
use super::view::{ConfigurationView, merge};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// Notification that a new configuration view was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Layers whose contents changed, highest precedence first.
    pub layers: Vec<LayerKind>,
    /// Generation of the newly published view.
    pub generation: u64,
}

#[derive(Debug)]
struct Slot {
    source: Box<dyn LayerSource>,
    data: LayerData,
    fingerprint: Option<Fingerprint>,
}

impl Slot {
    fn load(source: Box<dyn LayerSource>) -> Self {
        let fingerprint = source.fingerprint();
        let data = match source.load() {
            LayerLoad::Loaded(data) => data,
            LayerLoad::Missing => LayerData::new(),
            LayerLoad::Malformed { reason } => {
                tracing::warn!("Ignoring {} ({reason})", source.kind());
                LayerData::new()
            }
        };
        Self {
            source,
            data,
            fingerprint,
        }
    }

    /// Re-reads the layer if its fingerprint moved. Returns `true` if the
    /// layer contents changed.
    fn refresh(&mut self) -> bool {
        let Some(current) = self.source.fingerprint() else {
            return false;
        };
        if self.fingerprint.as_ref() == Some(&current) {
            return false;
        }
        self.fingerprint = Some(current);

        let next = match self.source.load() {
            LayerLoad::Loaded(data) => data,
            LayerLoad::Missing => LayerData::new(),
            LayerLoad::Malformed { reason } => {
                tracing::warn!(
                    "Keeping previous contents of {} ({reason})",
                    self.source.kind()
                );
                return false;
            }
        };
        if next == self.data {
            return false;
        }
        self.data = next;
        true
    }
}

/// Cloneable read handle onto the live configuration.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<ArcSwap<ConfigurationView>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl ConfigHandle {
    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ConfigurationView> {
        self.current.load_full()
    }

    /// Returns a stream of change events published after this call.
    pub fn watch(&self) -> impl Stream<Item = ChangeEvent> + Send + use<> {
        BroadcastStream::new(self.changes.subscribe()).filter_map(Result::ok)
    }
}

/// Merges configuration layers and keeps the merged view current.
#[derive(Debug)]
pub struct ConfigurationResolver {
    slots: Vec<Slot>,
    handle: ConfigHandle,
    poll_interval: Duration,
}

impl ConfigurationResolver {
    /// Loads every source once and publishes the first view.
    ///
    /// Registration order does not matter; precedence comes from
    /// [`LayerSource::kind`].
    #[must_use]
    pub fn new(sources: Vec<Box<dyn LayerSource>>) -> Self {
        let slots: Vec<Slot> = sources.into_iter().map(Slot::load).collect();
        let view = merge(slots.iter().map(|s| (s.source.kind(), &s.data)), 0);
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            slots,
            handle: ConfigHandle {
                current: Arc::new(ArcSwap::from_pointee(view)),
                changes,
            },
            poll_interval: defaults::watch_interval(),
        }
    }

    /// Builds the resolver with the standard layer set for this host.
    ///
    /// `overrides` carries synthesized values (such as a temporary key
    /// hash), `command_line` only what the operator passed explicitly.
    #[must_use]
    pub fn standard(
        overrides: LayerData,
        command_line: LayerData,
        defaults: LayerData,
        host: &HostEnvironment,
    ) -> Self {
        let paths = &host.paths;
        let mut sources: Vec<Box<dyn LayerSource>> = vec![
            Box::new(MemorySource::new(LayerKind::InMemoryOverrides, overrides)),
            Box::new(MemorySource::new(LayerKind::CommandLine, command_line)),
            Box::new(JsonFileSource::new(
                LayerKind::SharedFile,
                paths.shared_settings(),
            )),
            Box::new(
                KeyPerFileSource::new(paths.key_per_file_dir(host.in_orchestrator))
                    .ignoring(SETTINGS_FILE_NAME),
            ),
            Box::new(EnvironmentSource::from_vars(ENV_PREFIX, &host.variables)),
            Box::new(MemorySource::new(LayerKind::Defaults, defaults)),
        ];
        if let Some(user) = paths.user_settings() {
            sources.push(Box::new(JsonFileSource::new(LayerKind::UserFile, user)));
        }

        tracing::debug!(
            "Configuration sources: shared '{}', user {:?}",
            paths.shared_dir().display(),
            paths.user_dir()
        );
        Self::new(sources)
    }

    /// Sets how often reloadable layers are checked for changes.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Returns the current merged view.
    #[must_use]
    pub fn resolve(&self) -> Arc<ConfigurationView> {
        self.handle.snapshot()
    }

    /// Returns a cloneable handle that outlives the resolver.
    #[must_use]
    pub fn handle(&self) -> ConfigHandle {
        self.handle.clone()
    }

    /// Returns a stream of change events published after this call.
    pub fn watch(&self) -> impl Stream<Item = ChangeEvent> + Send + use<> {
        self.handle.watch()
    }

    /// Checks every reloadable layer once and publishes a new view if the
    /// merged result changed.
    pub fn reload(&mut self) -> Option<ChangeEvent> {
        let changed: Vec<LayerKind> = self
            .slots
            .iter_mut()
            .filter_map(|slot| slot.refresh().then(|| slot.source.kind()))
            .collect();
        if changed.is_empty() {
            return None;
        }

        let previous = self.handle.current.load();
        let generation = previous.generation() + 1;
        let view = merge(self.slots.iter().map(|s| (s.source.kind(), &s.data)), generation);
        if view.same_contents(&previous) {
            return None;
        }
        drop(previous);

        let mut layers = changed;
        layers.sort();
        layers.dedup();
        self.handle.current.store(Arc::new(view));

        let event = ChangeEvent { layers, generation };
        tracing::info!(
            "Configuration reloaded (generation {generation}) from: {}",
            event
                .layers
                .iter()
                .map(|l| l.label())
                .collect::<Vec<_>>()
                .join(", ")
        );
        // No subscribers is fine.
        let _ = self.handle.changes.send(event.clone());
        Some(event)
    }

    /// Polls for changes until `cancel` fires.
    ///
    /// File IO runs on the blocking pool so the reactor never stalls on a
    /// slow mount.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial load already ran.
        ticker.tick().await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match tokio::task::spawn_blocking(move || {
                self.reload();
                self
            })
            .await
            {
                Ok(resolver) => self = resolver,
                Err(e) => {
                    tracing::error!("Configuration watcher stopped: {e}");
                    return;
                }
            }
        }
        tracing::debug!("Configuration watcher stopped");
    }

    /// Spawns [`run`](Self::run) on the current runtime.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
