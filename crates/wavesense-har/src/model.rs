//! Classifier contract.

use ndarray::ArrayView2;

use wavesense_core::{Module, Result};

use crate::prediction::Prediction;

/// A hot-swappable activity classifier.
///
/// `amp` is the selected device's amplitude window (rows oldest first) and
/// `ts` the matching timestamps in seconds. The model picks the part of the
/// window it looks at and reports it in the returned prediction's
/// `ts_from..=ts_to`.
pub trait HarModel: Module {
    /// Length of the confidence vectors this model produces.
    fn num_classes(&self) -> usize;

    fn evaluate(&mut self, amp: ArrayView2<'_, f64>, ts: &[f64]) -> Result<Prediction>;
}
