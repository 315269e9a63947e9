//! Adaptive Kalman smoothing, one scalar state per subcarrier.

use ndarray::{Array1, ArrayView1, ArrayViewMut2};

use wavesense_core::{ConfigSet, Configurable, Module, Result};

use super::Filter;

const INITIAL_PROCESS_VARIANCE: f64 = 1.0;
const INITIAL_MEASUREMENT_VARIANCE: f64 = 1.0;
const EPSILON: f64 = 1e-10;

/// Random-walk Kalman filter whose process and measurement variances track
/// the signal through exponential moving averages with factor `alpha`.
#[derive(Debug)]
pub struct AdaptiveKalman {
    settings: ConfigSet,
    enabled: bool,
    state: Option<KalmanState>,
}

#[derive(Debug, Clone)]
struct KalmanState {
    /// State estimate, seeded from the first measurement
    x: Option<Array1<f64>>,
    /// Error covariance
    p: Array1<f64>,
    /// Process variance
    q: Array1<f64>,
    /// Measurement variance
    r: Array1<f64>,
    prev_x: Option<Array1<f64>>,
}

impl KalmanState {
    fn new(dim: usize) -> Self {
        Self {
            x: None,
            p: Array1::ones(dim),
            q: Array1::from_elem(dim, INITIAL_PROCESS_VARIANCE),
            r: Array1::from_elem(dim, INITIAL_MEASUREMENT_VARIANCE),
            prev_x: None,
        }
    }

    fn dim(&self) -> usize {
        self.p.len()
    }

    fn update(&mut self, z: ArrayView1<'_, f64>, alpha: f64) -> Array1<f64> {
        // Predict
        let x_pred = self.x.take().unwrap_or_else(|| z.to_owned());
        let p_pred = &self.p + &self.q;

        // Update
        let residual = &z - &x_pred;
        let gain = &p_pred / &(&p_pred + &self.r + EPSILON);
        let x = &x_pred + &(&gain * &residual);
        self.p = (1.0 - &gain) * &p_pred;

        // Adapt variances
        if let Some(prev_x) = &self.prev_x {
            let dx = &x - prev_x;
            self.q = &self.q * (1.0 - alpha) + &(dx.mapv(|v| v * v) * alpha);
            self.r = &self.r * (1.0 - alpha) + &(residual.mapv(|v| v * v) * alpha);
        }

        self.prev_x = Some(x.clone());
        self.x = Some(x.clone());
        x
    }
}

impl AdaptiveKalman {
    pub fn new() -> Self {
        Self {
            settings: ConfigSet::new().with("alpha", 0.5, 0.0, 1.0),
            enabled: false,
            state: None,
        }
    }

    /// Subcarrier count of the current state, if initialised.
    pub fn dimension(&self) -> Option<usize> {
        self.state.as_ref().map(KalmanState::dim)
    }
}

impl Default for AdaptiveKalman {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for AdaptiveKalman {
    fn name(&self) -> &str {
        "Adaptive Kalman"
    }

    fn deactivate(&mut self) {
        self.state = None;
    }

    fn supports_hot_reload(&self) -> bool {
        true
    }
}

impl Configurable for AdaptiveKalman {
    fn settings(&self) -> &ConfigSet {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut ConfigSet {
        &mut self.settings
    }
}

impl Filter for AdaptiveKalman {
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
        let dim = amp.ncols();

        if self.dimension() != Some(dim) {
            tracing::debug!("Kalman state (re)initialised for {} subcarriers", dim);
            self.state = Some(KalmanState::new(dim));
        }
        let alpha = self.settings.get("alpha").unwrap_or(0.5);

        if let Some(state) = self.state.as_mut() {
            let filtered = state.update(amp.row(last), alpha);
            amp.row_mut(last).assign(&filtered);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn run(filter: &mut AdaptiveKalman, amp: &mut Array2<f64>) {
        let mut phase = Array2::zeros(amp.raw_dim());
        filter.apply(amp.view_mut(), phase.view_mut(), &[]).unwrap();
    }

    #[test]
    fn test_first_measurement_passes_through() {
        let mut filter = AdaptiveKalman::new();
        let mut amp = array![[3.0, -4.0]];
        run(&mut filter, &mut amp);
        assert_eq!(amp, array![[3.0, -4.0]]);
    }

    #[test]
    fn test_step_is_attenuated_by_gain() {
        let mut filter = AdaptiveKalman::new();

        let mut amp = array![[0.0]];
        run(&mut filter, &mut amp);

        // P = 2/3 after the first update; P_pred = 5/3, K = 5/8
        let mut amp = array![[0.0], [10.0]];
        run(&mut filter, &mut amp);
        assert!((amp[[1, 0]] - 6.25).abs() < 1e-6);
        assert_eq!(amp[[0, 0]], 0.0);
    }

    #[test]
    fn test_only_last_row_is_written() {
        let mut filter = AdaptiveKalman::new();
        let mut amp = array![[1.0, 1.0], [2.0, 2.0]];
        run(&mut filter, &mut amp);
        let mut amp2 = array![[7.0, 7.0], [9.0, 9.0]];
        run(&mut filter, &mut amp2);
        assert_eq!(amp2.row(0), array![7.0, 7.0]);
    }

    #[test]
    fn test_reinitialises_on_width_change() {
        let mut filter = AdaptiveKalman::new();
        run(&mut filter, &mut Array2::ones((1, 4)));
        assert_eq!(filter.dimension(), Some(4));

        let mut wider = Array2::from_elem((1, 6), 5.0);
        run(&mut filter, &mut wider);
        assert_eq!(filter.dimension(), Some(6));
        assert_eq!(wider, Array2::from_elem((1, 6), 5.0));
    }

    #[test]
    fn test_empty_window_is_ignored() {
        let mut filter = AdaptiveKalman::new();
        run(&mut filter, &mut Array2::zeros((0, 3)));
        assert_eq!(filter.dimension(), None);
    }
}
