//! Logs the current activity.

use std::sync::Arc;

use wavesense_core::Module;
use wavesense_har::InferenceScheduler;

use crate::plugin::Plugin;

/// Reports each change of the newest consensus-filtered label.
pub struct ActivityReporter {
    scheduler: Arc<InferenceScheduler>,
    current: Option<String>,
    changes: u64,
}

impl ActivityReporter {
    pub fn new(scheduler: Arc<InferenceScheduler>) -> Self {
        Self {
            scheduler,
            current: None,
            changes: 0,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Label transitions seen so far.
    pub fn changes(&self) -> u64 {
        self.changes
    }
}

impl Module for ActivityReporter {
    fn name(&self) -> &str {
        "Activity"
    }
}

impl Plugin for ActivityReporter {
    fn render(&mut self, _tick: u64) {
        let predictions = self.scheduler.consensus_predictions();
        let Some(latest) = predictions.last() else {
            return;
        };
        let Some(label) = latest.label(self.scheduler.classes()) else {
            return;
        };

        if self.current.as_deref() != Some(label) {
            tracing::info!(
                "Activity: {} ({:.0}%) at {:.3}",
                label,
                latest.max_confidence() * 100.0,
                latest.ts_to
            );
            self.current = Some(label.to_string());
            self.changes += 1;
        }
    }

    fn render_schedule(&self) -> Option<u64> {
        Some(1)
    }
}
