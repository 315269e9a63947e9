//! Per-subcarrier signal-to-noise monitor.

use std::sync::Arc;

use ndarray::{ArrayView2, Axis};

use wavesense_core::{ConfigSet, Configurable, DeviceId, Module};
use wavesense_csi::CsiStore;

use crate::plugin::Plugin;

/// Reported for subcarriers whose amplitude barely moves (null carriers).
pub const NULL_CARRIER_SNR: f64 = 0.1;

/// SNR of every retained subcarrier over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct SnrReport {
    pub device: Option<DeviceId>,
    pub rows: usize,
    /// μ/σ per subcarrier
    pub snr: Vec<f64>,
    pub peak: f64,
    /// Subcarriers under `weak_ratio × peak`
    pub weak: usize,
}

/// μ/σ per column of `amp`. Columns with variance below `null_variance`
/// report [`NULL_CARRIER_SNR`]. `None` for an empty window.
pub fn compute_snr(amp: ArrayView2<'_, f64>, null_variance: f64, weak_ratio: f64) -> Option<SnrReport> {
    let mean = amp.mean_axis(Axis(0))?;
    let std = amp.std_axis(Axis(0), 0.0);

    let snr: Vec<f64> = mean
        .iter()
        .zip(std.iter())
        .map(|(&mu, &sigma)| {
            if sigma * sigma < null_variance {
                NULL_CARRIER_SNR
            } else {
                mu / (sigma + 1e-9)
            }
        })
        .collect();

    let peak = snr.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = weak_ratio * peak;
    let weak = snr.iter().filter(|&&value| value < threshold).count();

    Some(SnrReport {
        device: None,
        rows: amp.nrows(),
        snr,
        peak,
        weak,
    })
}

/// Logs the subcarrier quality of the selected device.
pub struct SnrMonitor {
    settings: ConfigSet,
    store: Arc<CsiStore>,
    latest: Option<SnrReport>,
}

impl SnrMonitor {
    pub fn new(store: Arc<CsiStore>) -> Self {
        Self {
            settings: ConfigSet::new()
                .with("min_rows", 256.0, 2.0, 8192.0)
                .with("null_variance", 2.0, 0.0, 100.0)
                .with("weak_ratio", 0.15, 0.0, 1.0)
                .with("render_every", 33.0, 1.0, 10_000.0),
            store,
            latest: None,
        }
    }

    pub fn latest(&self) -> Option<&SnrReport> {
        self.latest.as_ref()
    }

    fn setting(&self, key: &str, fallback: f64) -> f64 {
        self.settings.get(key).unwrap_or(fallback)
    }
}

impl Module for SnrMonitor {
    fn name(&self) -> &str {
        "SNR"
    }

    fn deactivate(&mut self) {
        self.latest = None;
    }

    fn supports_hot_reload(&self) -> bool {
        true
    }
}

impl Configurable for SnrMonitor {
    fn settings(&self) -> &ConfigSet {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut ConfigSet {
        &mut self.settings
    }
}

impl Plugin for SnrMonitor {
    fn render(&mut self, _tick: u64) {
        let snapshot = self.store.snapshot();
        if snapshot.ts.len() < self.setting("min_rows", 256.0) as usize {
            self.latest = None;
            return;
        }

        let report = compute_snr(
            snapshot.amp.view(),
            self.setting("null_variance", 2.0),
            self.setting("weak_ratio", 0.15),
        )
        .map(|report| SnrReport {
            device: snapshot.device,
            ..report
        });

        if let Some(report) = &report {
            let previous_weak = self.latest.as_ref().map(|r| r.weak);
            if previous_weak != Some(report.weak) {
                tracing::info!(
                    "SNR on {}: {} of {} subcarriers weak (peak {:.1})",
                    report.device.as_deref().unwrap_or("?"),
                    report.weak,
                    report.snr.len(),
                    report.peak
                );
            }
        }
        self.latest = report;
    }

    fn render_schedule(&self) -> Option<u64> {
        Some(self.setting("render_every", 33.0) as u64)
    }
}
