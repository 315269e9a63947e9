//! Gaussian perturbation of the newest amplitude row.

use ndarray::ArrayViewMut2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use wavesense_core::{ConfigSet, Configurable, Error, Module, Result};

use super::Filter;

/// Adds `N(mean, std)` noise (in dB) to every subcarrier of the last row.
///
/// Useful to check how downstream filters and models cope with a degraded link.
#[derive(Debug)]
pub struct NoiseFilter {
    settings: ConfigSet,
    enabled: bool,
    rng: StdRng,
}

impl NoiseFilter {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Reproducible noise sequence.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            settings: ConfigSet::new()
                .with("mean", 0.0, -20.0, 20.0)
                .with("std", 10.0, 0.0, 100.0),
            enabled: false,
            rng,
        }
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for NoiseFilter {
    fn name(&self) -> &str {
        "Noise"
    }
}

impl Configurable for NoiseFilter {
    fn settings(&self) -> &ConfigSet {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut ConfigSet {
        &mut self.settings
    }
}

impl Filter for NoiseFilter {
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
        let Some(last) = amp.nrows().checked_sub(1) else {
            return Ok(());
        };

        let mean = self.settings.get("mean").unwrap_or(0.0);
        let std = self.settings.get("std").unwrap_or(0.0);
        let normal = Normal::new(mean, std).map_err(|e| Error::Filter(format!("noise: {e}")))?;

        for value in amp.row_mut(last).iter_mut() {
            *value += normal.sample(&mut self.rng);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_zero_std_shifts_by_mean() {
        let mut filter = NoiseFilter::with_seed(1);
        filter.set("mean", 3.0).unwrap();
        filter.set("std", 0.0).unwrap();

        let mut amp = Array2::zeros((2, 4));
        let mut phase = Array2::zeros((2, 4));
        filter.apply(amp.view_mut(), phase.view_mut(), &[0.0, 1.0]).unwrap();

        assert!(amp.row(0).iter().all(|&v| v == 0.0));
        assert!(amp.row(1).iter().all(|&v| (v - 3.0).abs() < 1e-12));
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let mut a = NoiseFilter::with_seed(42);
        let mut b = NoiseFilter::with_seed(42);

        let mut amp_a = Array2::zeros((1, 8));
        let mut amp_b = Array2::zeros((1, 8));
        let mut phase = Array2::zeros((1, 8));
        a.apply(amp_a.view_mut(), phase.view_mut(), &[]).unwrap();
        b.apply(amp_b.view_mut(), phase.view_mut(), &[]).unwrap();

        assert_eq!(amp_a, amp_b);
        assert!(amp_a.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_noise_does_not_support_hot_reload() {
        assert!(!NoiseFilter::with_seed(0).supports_hot_reload());
    }
}
