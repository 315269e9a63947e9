//! Application assembly and the event loop.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use wavesense_core::{Module, ModuleKey};
use wavesense_csi::{
    CaptureWriter, CsiStore, Filter, ReaderStats, ReaderTask, ReplaySource, SampleSource, SourceControl,
    SyntheticSource,
};
use wavesense_har::{HarModel, InferenceScheduler};
use wavesense_modules::{
    LoadReport, ManifestWatcher, ModuleError, ModuleRegistry, ModuleResult, ReloadOutcome, FILTER_CAPABILITY,
    MODEL_CAPABILITY, PLUGIN_CAPABILITY,
};

use crate::config::{AppConfig, SourceConfig};
use crate::plugin::{Plugin, PluginContext, PluginHost};
use crate::plugins;

/// What a finished run did.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reader: ReaderStats,
    /// Predictions produced by the scheduler during the run
    pub predictions: usize,
    /// Plugin render rounds
    pub render_ticks: u64,
    /// Manifest changes handled
    pub changes: usize,
}

/// The store, the three registries, the scheduler and the plugin host.
pub struct App {
    config: AppConfig,
    store: Arc<CsiStore>,
    filters: Arc<ModuleRegistry<dyn Filter>>,
    models: Arc<ModuleRegistry<dyn HarModel>>,
    plugins: Arc<ModuleRegistry<dyn Plugin>>,
    scheduler: Arc<InferenceScheduler>,
    host: PluginHost,
    control: SourceControl,
}

impl App {
    /// Wire everything together. Modules are not loaded yet.
    pub fn build(config: AppConfig) -> anyhow::Result<Self> {
        let root = config.modules.root.clone();
        let store = Arc::new(CsiStore::new(config.store.mask.mask(), config.store.window));

        let filters = Arc::new(
            ModuleRegistry::new(FILTER_CAPABILITY, wavesense_csi::filters::catalog())
                .with_project_root(root.clone())
                .with_observer(store.clone()),
        );

        let classes = config.inference.classes.clone();
        anyhow::ensure!(!classes.is_empty(), "inference.classes must not be empty");
        let models = Arc::new(
            ModuleRegistry::new(MODEL_CAPABILITY, wavesense_har::models::catalog(classes.len()))
                .with_project_root(root.clone()),
        );

        let scheduler = Arc::new(InferenceScheduler::new(store.clone(), models.clone()).with_classes(classes));
        scheduler.set("interval_ms", config.inference.interval_ms)?;
        scheduler.set("consensus_window", config.inference.consensus_window)?;
        scheduler.set("min_confidence", config.inference.min_confidence)?;

        let context = PluginContext {
            store: store.clone(),
            scheduler: scheduler.clone(),
        };
        let plugins = Arc::new(
            ModuleRegistry::new(PLUGIN_CAPABILITY, plugins::catalog(context)).with_project_root(root),
        );
        let host = PluginHost::new(plugins.clone());

        Ok(Self {
            config,
            store,
            filters,
            models,
            plugins,
            scheduler,
            host,
            control: SourceControl::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CsiStore> {
        &self.store
    }

    pub fn filters(&self) -> &Arc<ModuleRegistry<dyn Filter>> {
        &self.filters
    }

    pub fn models(&self) -> &Arc<ModuleRegistry<dyn HarModel>> {
        &self.models
    }

    pub fn plugins(&self) -> &Arc<ModuleRegistry<dyn Plugin>> {
        &self.plugins
    }

    pub fn scheduler(&self) -> &Arc<InferenceScheduler> {
        &self.scheduler
    }

    pub fn host(&self) -> &PluginHost {
        &self.host
    }

    /// Pause/resume/clear handle of the reader.
    pub fn control(&self) -> &SourceControl {
        &self.control
    }

    /// Scan the filter, model and plugin directories and pick the model.
    ///
    /// Returns the number of manifests that failed to load.
    pub fn load_modules(&self) -> usize {
        let modules = &self.config.modules;
        let failures = load_dir(&self.filters, &modules.filters_dir()).failures.len()
            + load_dir(&self.models, &modules.models_dir()).failures.len()
            + load_dir(&self.plugins, &modules.plugins_dir()).failures.len();

        match &self.config.inference.model {
            Some(key) => self.models.select(ModuleKey::new(key.as_str())),
            None => {
                if let Some(first) = self.models.keys().into_iter().next() {
                    self.models.select(first);
                }
            }
        }

        match self.models.selected_key() {
            Some(key) if self.models.contains(&key) => tracing::info!("Using model {}", key),
            Some(key) => tracing::warn!("Selected model {} is not loaded", key),
            None => tracing::warn!("No HAR model available"),
        }

        if self.config.inference.autostart {
            self.scheduler.start();
        }
        failures
    }

    /// Build the configured sample source.
    pub async fn open_source(&self) -> anyhow::Result<Box<dyn SampleSource>> {
        match &self.config.source {
            SourceConfig::Synthetic {
                devices,
                rate_hz,
                subcarriers,
                limit,
                seed,
            } => {
                let mut source = SyntheticSource::new(devices.clone(), *rate_hz).with_subcarriers(*subcarriers);
                if let Some(limit) = limit {
                    source = source.with_limit(*limit);
                }
                if let Some(seed) = seed {
                    source = source.with_seed(*seed);
                }
                Ok(Box::new(source))
            }
            SourceConfig::Replay { path, simulate_time } => {
                let source = ReplaySource::open(path, *simulate_time)
                    .await
                    .with_context(|| format!("opening capture {}", path.display()))?;
                Ok(Box::new(source))
            }
        }
    }

    /// Route a changed manifest to the registry owning its directory.
    ///
    /// `None` when the path is outside every module directory.
    pub fn handle_change(&self, path: &Path) -> Option<ModuleResult<ReloadOutcome>> {
        let modules = &self.config.modules;
        let outcome = if path.starts_with(modules.filters_dir()) {
            self.filters.reload(path)
        } else if path.starts_with(modules.models_dir()) {
            let outcome = self.models.reload(path);
            if let Ok(ReloadOutcome::Loaded(key)) = &outcome {
                if self.models.selected_key().is_none() {
                    self.models.select(key.clone());
                }
            }
            outcome
        } else if path.starts_with(modules.plugins_dir()) {
            self.plugins.reload(path)
        } else {
            tracing::debug!("Ignoring change outside module directories: {}", path.display());
            return None;
        };

        match &outcome {
            Ok(ReloadOutcome::Reloaded(key)) => tracing::info!("Reloaded {}", key),
            Ok(ReloadOutcome::Loaded(key)) => tracing::info!("Loaded {}", key),
            Ok(ReloadOutcome::Unloaded) => tracing::info!("Unloaded {}", path.display()),
            Ok(ReloadOutcome::Skipped) => {}
            // already reported by the registry
            Err(ModuleError::UnsupportedHotReload { .. }) => {}
            Err(e) => tracing::error!("Failed to reload {}: {}", path.display(), e),
        }
        Some(outcome)
    }

    /// Select the first device if none is, then render due plugins.
    pub fn render(&self) {
        if self.config.render.auto_select_device && self.store.selected_device().is_none() {
            if let Some(first) = self.store.devices().into_iter().next() {
                if self.store.select_device(&first) {
                    tracing::info!("Selected device {}", first);
                }
            }
        }
        self.host.render();
    }

    /// Drive inference, rendering and hot reload until `shutdown` resolves or
    /// the source ends, then deactivate every module.
    pub async fn run<F>(&self, source: Box<dyn SampleSource>, shutdown: F) -> anyhow::Result<RunSummary>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);

        let scheduler = self.scheduler.clone();
        let mut reader = ReaderTask::new(source, self.store.clone(), self.control.clone())
            .with_clear_hook(move || scheduler.clear_predictions());
        if let Some(path) = &self.config.record_to {
            reader = reader.with_recorder(CaptureWriter::create(path)?);
        }
        let mut reader = reader.spawn(stop_rx);

        let (change_tx, mut changes) = mpsc::channel::<PathBuf>(64);
        let watcher = if self.config.modules.hot_reload {
            let modules = &self.config.modules;
            let roots: Vec<PathBuf> = [modules.filters_dir(), modules.models_dir(), modules.plugins_dir()]
                .into_iter()
                .filter(|dir| dir.is_dir())
                .collect();
            tracing::info!("Watching {} module directories for changes", roots.len());
            let watcher = ManifestWatcher::new(roots).with_debounce(Duration::from_millis(modules.debounce_ms));
            Some(watcher.spawn(Duration::from_millis(modules.poll_interval_ms.max(1)), change_tx))
        } else {
            drop(change_tx);
            None
        };

        let mut inference = self.scheduler.timer();
        let mut render = tokio::time::interval(Duration::from_millis(self.config.render.interval_ms.max(1)));
        render.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut summary = RunSummary::default();
        let finished = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested");
                    break None;
                }
                joined = &mut reader => break Some(joined),
                _ = inference.tick() => {
                    if self.scheduler.tick().is_some() {
                        summary.predictions += 1;
                    }
                }
                _ = render.tick() => self.render(),
                Some(path) = changes.recv() => {
                    if self.handle_change(&path).is_some() {
                        summary.changes += 1;
                    }
                }
            }
        };

        let joined = match finished {
            Some(joined) => {
                // one last pass over whatever the source delivered
                if self.scheduler.tick().is_some() {
                    summary.predictions += 1;
                }
                self.render();
                joined
            }
            None => {
                let _ = stop_tx.send(true);
                reader.await
            }
        };

        if let Some(watcher) = watcher {
            watcher.abort();
        }
        summary.render_ticks = self.host.tick();
        self.deactivate_all();

        summary.reader = joined.context("reader task failed")??;
        Ok(summary)
    }

    /// Unload every plugin, model and filter.
    pub fn deactivate_all(&self) {
        self.scheduler.stop();
        self.plugins.unload_all();
        self.models.unload_all();
        self.filters.unload_all();
        tracing::info!("All modules deactivated");
    }
}

fn load_dir<T: ?Sized + Module + 'static>(registry: &ModuleRegistry<T>, dir: &Path) -> LoadReport {
    if !dir.is_dir() {
        tracing::warn!("No {} directory at {}", registry.capability(), dir.display());
        return LoadReport::default();
    }

    let report = registry.load_all(dir);
    tracing::info!(
        "Loaded {} {} module(s) from {} ({} failed)",
        report.loaded.len(),
        registry.capability(),
        dir.display(),
        report.failures.len()
    );
    report
}
