//! Periodic evaluation of the selected model.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use wavesense_core::{ConfigSet, Result};
use wavesense_csi::CsiStore;
use wavesense_modules::ModuleRegistry;

use crate::consensus::{apply_consensus, ConsensusParams};
use crate::model::HarModel;
use crate::prediction::{default_classes, Prediction};
use crate::timer::InferenceTimer;

/// Settings group name shown on the settings surface.
pub const PREDICTION_SETTINGS: &str = "Predictions";

/// Whether ticks evaluate anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
}

/// Runs the selected [`HarModel`] over the store's selected device.
///
/// Keeps every prediction whose `ts_to` is still inside the store window and
/// never evaluates the same newest timestamp twice. Owners drive it by
/// calling [`InferenceScheduler::tick`] from an [`InferenceTimer`].
pub struct InferenceScheduler {
    store: Arc<CsiStore>,
    models: Arc<ModuleRegistry<dyn HarModel>>,
    classes: Vec<String>,
    predictions: RwLock<Vec<Prediction>>,
    last_evaluated: Mutex<Option<f64>>,
    state: Mutex<SchedulerState>,
    settings: Mutex<ConfigSet>,
    period: Arc<watch::Sender<Duration>>,
}

impl InferenceScheduler {
    pub fn new(store: Arc<CsiStore>, models: Arc<ModuleRegistry<dyn HarModel>>) -> Self {
        let settings = ConfigSet::new()
            .with("interval_ms", 500.0, 250.0, 10_000.0)
            .with("consensus_window", 1.0, 1.0, 100.0)
            .with("min_confidence", 0.1, 0.0, 1.0);

        let (period, _) = watch::channel(Duration::from_millis(500));
        let period = Arc::new(period);

        let scheduler = Self {
            store,
            models,
            classes: default_classes(),
            predictions: RwLock::new(Vec::new()),
            last_evaluated: Mutex::new(None),
            state: Mutex::new(SchedulerState::Idle),
            settings: Mutex::new(settings),
            period,
        };
        scheduler.install_listener();
        scheduler
    }

    /// Replace the class labels (confidence-vector order).
    pub fn with_classes(mut self, classes: Vec<String>) -> Self {
        self.classes = classes;
        self
    }

    fn install_listener(&self) {
        let period = self.period.clone();
        self.settings.lock().on_change(move |key, _old, new| {
            if key == "interval_ms" {
                period.send_replace(Duration::from_millis(new as u64));
            }
        });
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn store(&self) -> &Arc<CsiStore> {
        &self.store
    }

    pub fn models(&self) -> &Arc<ModuleRegistry<dyn HarModel>> {
        &self.models
    }

    /// Current evaluation period.
    pub fn period(&self) -> Duration {
        *self.period.borrow()
    }

    /// A timer following this scheduler's `interval_ms`.
    pub fn timer(&self) -> InferenceTimer {
        InferenceTimer::new(self.period.subscribe())
    }

    pub fn start(&self) {
        let mut state = self.state.lock();
        if *state != SchedulerState::Scheduled {
            *state = SchedulerState::Scheduled;
            tracing::info!("Inference scheduled every {:?}", self.period());
        }
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        if *state != SchedulerState::Idle {
            *state = SchedulerState::Idle;
            tracing::info!("Inference stopped");
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Evaluate the selected model once if there is new data.
    ///
    /// The new prediction is appended before predictions ending at or before
    /// the earliest buffered timestamp are dropped. Returns it if it was kept;
    /// `None` when idle, without a selected model, on an empty store, when the
    /// newest timestamp was already evaluated, or when the model failed.
    pub fn tick(&self) -> Option<Prediction> {
        if self.state() != SchedulerState::Scheduled {
            return None;
        }
        let model = self.models.selected()?;

        let snapshot = self.store.snapshot();
        let earliest = *snapshot.ts.first()?;
        let newest = *snapshot.ts.last()?;

        {
            let mut last = self.last_evaluated.lock();
            if *last == Some(newest) {
                return None;
            }
            *last = Some(newest);
        }

        let result = {
            let mut model = model.lock();
            model
                .evaluate(snapshot.amp.view(), &snapshot.ts)
                .map_err(|e| (model.name().to_string(), e))
        };

        let mut predictions = self.predictions.write();
        let fresh = match result {
            Ok(prediction) if prediction.confidence.len() != self.classes.len() => {
                tracing::warn!(
                    "Discarding prediction with {} scores for {} classes",
                    prediction.confidence.len(),
                    self.classes.len()
                );
                None
            }
            Ok(prediction) => {
                tracing::debug!(
                    "Predicted {} ({:.2}) for {:.3}..{:.3}",
                    prediction.label(&self.classes).unwrap_or("?"),
                    prediction.max_confidence(),
                    prediction.ts_from,
                    prediction.ts_to
                );
                predictions.push(prediction.clone());
                Some(prediction)
            }
            Err((name, e)) => {
                tracing::warn!("Model {} failed: {}", name, e);
                None
            }
        };

        predictions.retain(|p| p.ts_to > earliest);
        fresh.filter(|p| p.ts_to > earliest)
    }

    /// Predictions still inside the store window, oldest first.
    pub fn predictions(&self) -> Vec<Prediction> {
        self.predictions.read().clone()
    }

    /// [`InferenceScheduler::predictions`] smoothed with the current
    /// consensus settings.
    pub fn consensus_predictions(&self) -> Vec<Prediction> {
        let params = self.consensus_params();
        let predictions = self.predictions.read();
        apply_consensus(&predictions, params)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn consensus_params(&self) -> ConsensusParams {
        let settings = self.settings.lock();
        ConsensusParams {
            window: settings.get("consensus_window").unwrap_or(1.0) as usize,
            min_confidence: settings.get("min_confidence").unwrap_or(0.0),
        }
    }

    /// Drop every prediction and forget the last evaluated timestamp.
    pub fn clear_predictions(&self) {
        self.predictions.write().clear();
        *self.last_evaluated.lock() = None;
    }

    pub fn name(&self) -> &str {
        PREDICTION_SETTINGS
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.settings.lock().get(key)
    }

    /// Store a clamped setting; `interval_ms` also retimes the inference timer.
    pub fn set(&self, key: &str, value: f64) -> Result<f64> {
        self.settings.lock().set(key, value)
    }

    pub fn config_constraints(&self) -> BTreeMap<String, (f64, f64)> {
        self.settings.lock().constraints()
    }

    /// Current `(key, value)` pairs.
    pub fn values(&self) -> Vec<(String, f64)> {
        self.settings
            .lock()
            .values()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}
