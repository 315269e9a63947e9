//! Time-stamped classifier output.

use serde::{Deserialize, Serialize};

/// Activity classes understood by the bundled models, in confidence-vector order.
pub const DEFAULT_CLASSES: [&str; 5] = ["fall", "quiet", "sit_down", "stand_up", "walk"];

/// One evaluation of a model over `[ts_from, ts_to]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub ts_from: f64,
    pub ts_to: f64,
    /// One score per class
    pub confidence: Vec<f64>,
}

impl Prediction {
    pub fn new(ts_from: f64, ts_to: f64, confidence: Vec<f64>) -> Self {
        Self {
            ts_from,
            ts_to,
            confidence,
        }
    }

    /// Arg-max of the confidence vector; the first one wins ties.
    pub fn class_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, &score) in self.confidence.iter().enumerate() {
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((index, score)),
            }
        }
        best.map(|(index, _)| index)
    }

    pub fn max_confidence(&self) -> f64 {
        self.class_index()
            .map(|index| self.confidence[index])
            .unwrap_or(0.0)
    }

    /// Label of the predicted class.
    pub fn label<'a, S: AsRef<str>>(&self, classes: &'a [S]) -> Option<&'a str> {
        self.class_index()
            .and_then(|index| classes.get(index))
            .map(AsRef::as_ref)
    }
}

/// `DEFAULT_CLASSES` as owned strings.
pub fn default_classes() -> Vec<String> {
    DEFAULT_CLASSES.iter().map(|c| c.to_string()).collect()
}
