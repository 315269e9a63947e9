//! Read-side smoothing of prediction lists.

use crate::prediction::Prediction;

/// Parameters of [`apply_consensus`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusParams {
    /// Consecutive same-class predictions required before one is surfaced
    pub window: usize,
    /// Predictions below this max confidence are ignored entirely
    pub min_confidence: f64,
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self {
            window: 1,
            min_confidence: 0.0,
        }
    }
}

impl ConsensusParams {
    /// Whether the filter would return its input unchanged.
    pub fn is_passthrough(&self) -> bool {
        self.window <= 1 && self.min_confidence <= 0.0
    }
}

/// Suppress low-confidence predictions and class flips that do not persist.
///
/// Scans in time order, skipping predictions below `min_confidence`. The run
/// length counts consecutive retained predictions of the same class; a
/// prediction is emitted once its run reaches `window`. The input is never
/// modified.
pub fn apply_consensus(predictions: &[Prediction], params: ConsensusParams) -> Vec<&Prediction> {
    if params.is_passthrough() {
        return predictions.iter().collect();
    }

    let mut result = Vec::new();
    let mut run = 0usize;
    let mut previous: Option<usize> = None;

    for prediction in predictions {
        if prediction.max_confidence() < params.min_confidence {
            continue;
        }

        let class = prediction.class_index();
        run = if class.is_some() && class == previous { run + 1 } else { 1 };
        previous = class;

        if run >= params.window {
            result.push(prediction);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: [f64; 2] = [0.9, 0.1];
    const B: [f64; 2] = [0.1, 0.9];

    fn p(from: f64, to: f64, confidence: [f64; 2]) -> Prediction {
        Prediction::new(from, to, confidence.to_vec())
    }

    #[test]
    fn test_run_must_reach_window() {
        let predictions = vec![p(0.0, 1.0, A), p(1.0, 2.0, A), p(2.0, 3.0, B)];
        let params = ConsensusParams {
            window: 2,
            min_confidence: 0.5,
        };

        let smoothed = apply_consensus(&predictions, params);
        assert_eq!(smoothed, vec![&predictions[1]]);
    }

    #[test]
    fn test_window_one_passes_everything() {
        let predictions = vec![p(0.0, 1.0, A), p(1.0, 2.0, A), p(2.0, 3.0, B)];
        let params = ConsensusParams {
            window: 1,
            min_confidence: 0.0,
        };
        assert_eq!(apply_consensus(&predictions, params).len(), 3);
    }

    #[test]
    fn test_low_confidence_is_dropped_without_breaking_run() {
        let weak = [0.4, 0.3];
        let predictions = vec![p(0.0, 1.0, A), p(1.0, 2.0, weak), p(2.0, 3.0, A)];
        let params = ConsensusParams {
            window: 2,
            min_confidence: 0.5,
        };

        let smoothed = apply_consensus(&predictions, params);
        assert_eq!(smoothed, vec![&predictions[2]]);
    }

    #[test]
    fn test_flip_resets_run() {
        let predictions = vec![
            p(0.0, 1.0, A),
            p(1.0, 2.0, B),
            p(2.0, 3.0, A),
            p(3.0, 4.0, A),
            p(4.0, 5.0, A),
        ];
        let params = ConsensusParams {
            window: 2,
            min_confidence: 0.0,
        };

        let kept: Vec<f64> = apply_consensus(&predictions, params)
            .iter()
            .map(|p| p.ts_to)
            .collect();
        assert_eq!(kept, vec![4.0, 5.0]);
    }

    #[test]
    fn test_min_confidence_alone_filters() {
        let predictions = vec![p(0.0, 1.0, [0.45, 0.55]), p(1.0, 2.0, A)];
        let params = ConsensusParams {
            window: 1,
            min_confidence: 0.6,
        };
        assert_eq!(apply_consensus(&predictions, params), vec![&predictions[1]]);
    }
}
