//! Window statistics fed to a small perceptron.

use std::path::Path;

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use wavesense_core::{ConfigSet, Configurable, Error, Module, Result};

use crate::model::HarModel;
use crate::prediction::Prediction;

/// Length of the feature vector computed from a window.
pub const FEATURE_COUNT: usize = 6;

/// Serialized perceptron parameters.
///
/// `hidden_weights` is `hidden × FEATURE_COUNT`, `output_weights` is
/// `classes × hidden`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpWeights {
    pub hidden_weights: Vec<Vec<f64>>,
    pub hidden_bias: Vec<f64>,
    pub output_weights: Vec<Vec<f64>>,
    pub output_bias: Vec<f64>,
}

impl MlpWeights {
    /// Reproducible random initialisation scaled by `1/sqrt(fan_in)`.
    pub fn seeded(seed: u64, hidden: usize, classes: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layer = |rows: usize, cols: usize| -> Vec<Vec<f64>> {
            let scale = 1.0 / (cols.max(1) as f64).sqrt();
            (0..rows)
                .map(|_| {
                    (0..cols)
                        .map(|_| rng.sample::<f64, _>(StandardNormal) * scale)
                        .collect()
                })
                .collect()
        };

        let hidden_weights = layer(hidden, FEATURE_COUNT);
        let output_weights = layer(classes, hidden);
        Self {
            hidden_weights,
            hidden_bias: vec![0.0; hidden],
            output_weights,
            output_bias: vec![0.0; classes],
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn hidden(&self) -> usize {
        self.hidden_bias.len()
    }
}

fn matrix(rows: &[Vec<f64>], cols: usize, what: &str) -> Result<Array2<f64>> {
    if let Some(row) = rows.iter().find(|row| row.len() != cols) {
        return Err(Error::Shape(format!(
            "{what}: expected rows of {cols}, found one of {}",
            row.len()
        )));
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Ok(Array2::from_shape_vec((rows.len(), cols), flat)?)
}

/// Classifier over summary statistics of the trailing `lookback_s` seconds.
///
/// Six features are computed from the amplitude window (level, spread, mean
/// and peak row-to-row change, drift, covered duration), squashed with `tanh`
/// and fed to a one-hidden-layer perceptron (ReLU, softmax output).
pub struct StatisticsMlp {
    settings: ConfigSet,
    num_classes: usize,
    hidden_weights: Array2<f64>,
    hidden_bias: Array1<f64>,
    output_weights: Array2<f64>,
    output_bias: Array1<f64>,
}

impl StatisticsMlp {
    pub fn new(num_classes: usize, weights: MlpWeights) -> Result<Self> {
        let hidden = weights.hidden();
        if hidden == 0 {
            return Err(Error::Shape("hidden layer is empty".into()));
        }
        if weights.hidden_weights.len() != hidden {
            return Err(Error::Shape(format!(
                "{} hidden weight rows for {} hidden biases",
                weights.hidden_weights.len(),
                hidden
            )));
        }
        if weights.output_weights.len() != num_classes || weights.output_bias.len() != num_classes {
            return Err(Error::Shape(format!(
                "output layer has {} rows and {} biases, expected {}",
                weights.output_weights.len(),
                weights.output_bias.len(),
                num_classes
            )));
        }

        Ok(Self {
            settings: ConfigSet::new().with("lookback_s", 3.0, 0.5, 30.0),
            num_classes,
            hidden_weights: matrix(&weights.hidden_weights, FEATURE_COUNT, "hidden_weights")?,
            hidden_bias: Array1::from(weights.hidden_bias),
            output_weights: matrix(&weights.output_weights, hidden, "output_weights")?,
            output_bias: Array1::from(weights.output_bias),
        })
    }

    fn lookback(&self) -> f64 {
        self.settings.get("lookback_s").unwrap_or(3.0)
    }
}

/// Summary statistics of `window` (rows oldest first), each squashed to (-1, 1).
fn features(window: ArrayView2<'_, f64>, duration: f64, lookback: f64) -> Array1<f64> {
    let rows = window.nrows();
    let level = window.mean().unwrap_or(0.0);
    let spread = window
        .std_axis(Axis(0), 0.0)
        .mean()
        .unwrap_or(0.0);

    let (mean_change, peak_change, drift) = if rows >= 2 {
        let change = (&window.slice(s![1.., ..]) - &window.slice(s![..-1, ..])).mapv(f64::abs);
        let peak = change.iter().copied().fold(0.0, f64::max);
        let first = window.row(0).mean().unwrap_or(0.0);
        let last = window.row(rows - 1).mean().unwrap_or(0.0);
        (change.mean().unwrap_or(0.0), peak, last - first)
    } else {
        (0.0, 0.0, 0.0)
    };

    Array1::from(vec![
        (level / 20.0).tanh(),
        (spread / 5.0).tanh(),
        (mean_change / 5.0).tanh(),
        (peak_change / 20.0).tanh(),
        (drift / 10.0).tanh(),
        (duration / lookback.max(f64::EPSILON)).tanh(),
    ])
}

fn softmax(logits: &Array1<f64>) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|v| v / sum).collect()
}

impl Module for StatisticsMlp {
    fn name(&self) -> &str {
        "Statistical MLP"
    }

    fn deactivate(&mut self) {
        tracing::debug!("{} released", self.name());
    }

    fn supports_hot_reload(&self) -> bool {
        true
    }
}

impl Configurable for StatisticsMlp {
    fn settings(&self) -> &ConfigSet {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut ConfigSet {
        &mut self.settings
    }
}

impl HarModel for StatisticsMlp {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn evaluate(&mut self, amp: ArrayView2<'_, f64>, ts: &[f64]) -> Result<Prediction> {
        let Some(&ts_to) = ts.last() else {
            return Err(Error::InsufficientData {
                required: 1,
                available: 0,
            });
        };
        if amp.nrows() != ts.len() {
            return Err(Error::Shape(format!(
                "{} amplitude rows for {} timestamps",
                amp.nrows(),
                ts.len()
            )));
        }

        let lookback = self.lookback();
        let start = ts.partition_point(|&t| t < ts_to - lookback);
        let ts_from = ts[start];
        let window = amp.slice(s![start.., ..]);

        let input = features(window, ts_to - ts_from, lookback);
        let hidden = (self.hidden_weights.dot(&input) + &self.hidden_bias).mapv(|v| v.max(0.0));
        let logits = self.output_weights.dot(&hidden) + &self.output_bias;

        Ok(Prediction::new(ts_from, ts_to, softmax(&logits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn model(seed: u64) -> StatisticsMlp {
        StatisticsMlp::new(5, MlpWeights::seeded(seed, 8, 5)).unwrap()
    }

    fn window(rows: usize) -> (Array2<f64>, Vec<f64>) {
        let amp = Array2::from_shape_fn((rows, 4), |(r, c)| 30.0 + ((r * 3 + c) % 7) as f64);
        let ts = (0..rows).map(|r| r as f64).collect();
        (amp, ts)
    }

    #[test]
    fn test_lookback_selects_trailing_window() {
        let (amp, ts) = window(11);
        let prediction = model(1).evaluate(amp.view(), &ts).unwrap();

        assert_eq!(prediction.ts_from, 7.0);
        assert_eq!(prediction.ts_to, 10.0);
    }

    #[test]
    fn test_short_window_starts_at_first_row() {
        let (amp, ts) = window(2);
        let prediction = model(1).evaluate(amp.view(), &ts).unwrap();
        assert_eq!(prediction.ts_from, 0.0);
    }

    #[test]
    fn test_confidence_is_a_distribution() {
        let (amp, ts) = window(20);
        let prediction = model(2).evaluate(amp.view(), &ts).unwrap();

        assert_eq!(prediction.confidence.len(), 5);
        let total: f64 = prediction.confidence.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(prediction.confidence.iter().all(|&c| c > 0.0));
    }

    #[test]
    fn test_same_seed_same_output() {
        let (amp, ts) = window(20);
        let a = model(9).evaluate(amp.view(), &ts).unwrap();
        let b = model(9).evaluate(amp.view(), &ts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_lookback_is_configurable() {
        let (amp, ts) = window(11);
        let mut model = model(1);
        model.set("lookback_s", 5.0).unwrap();

        let prediction = model.evaluate(amp.view(), &ts).unwrap();
        assert_eq!(prediction.ts_from, 5.0);
    }

    #[test]
    fn test_empty_window_is_rejected() {
        let amp = Array2::<f64>::zeros((0, 4));
        let err = model(1).evaluate(amp.view(), &[]).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
    }

    #[test]
    fn test_mismatched_timestamps_are_rejected() {
        let (amp, _) = window(4);
        let err = model(1).evaluate(amp.view(), &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::Shape(_)));
    }

    #[test]
    fn test_ragged_weights_are_rejected() {
        let mut weights = MlpWeights::seeded(0, 4, 5);
        weights.hidden_weights[2].pop();
        assert!(StatisticsMlp::new(5, weights).is_err());
    }
}
