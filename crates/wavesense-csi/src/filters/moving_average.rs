use ndarray::{s, ArrayViewMut2, Axis};

use wavesense_core::{ConfigSet, Configurable, Module, Result};

use super::Filter;

/// Replaces the newest row by the per-subcarrier mean of the trailing `window` rows.
#[derive(Debug)]
pub struct MovingAverage {
    settings: ConfigSet,
    enabled: bool,
}

impl MovingAverage {
    pub fn new() -> Self {
        Self {
            settings: ConfigSet::new().with("window", 5.0, 1.0, 64.0),
            enabled: false,
        }
    }

    fn window(&self) -> usize {
        self.settings.get("window").unwrap_or(5.0).round().max(1.0) as usize
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for MovingAverage {
    fn name(&self) -> &str {
        "Moving Average"
    }

    fn deactivate(&mut self) {
        tracing::debug!("Moving average released");
    }

    fn supports_hot_reload(&self) -> bool {
        true
    }
}

impl Configurable for MovingAverage {
    fn settings(&self) -> &ConfigSet {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut ConfigSet {
        &mut self.settings
    }
}

impl Filter for MovingAverage {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn apply(
        &mut self,
        mut amp: ArrayViewMut2<'_, f64>,
        _phase: ArrayViewMut2<'_, f64>,
        _ts: &[f64],
    ) -> Result<()> {
        let rows = amp.nrows();
        if rows == 0 {
            return Ok(());
        }

        let start = rows - self.window().min(rows);
        if let Some(mean) = amp.slice(s![start.., ..]).mean_axis(Axis(0)) {
            amp.row_mut(rows - 1).assign(&mean);
        }
        Ok(())
    }
}
