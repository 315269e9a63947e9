//! Stateful amplitude/phase filters applied on every accepted sample.

mod kalman;
mod moving_average;
mod noise;

pub use kalman::AdaptiveKalman;
pub use moving_average::MovingAverage;
pub use noise::NoiseFilter;

use ndarray::ArrayViewMut2;

use wavesense_core::{Configurable, Module, Result};
use wavesense_modules::{Catalog, ModuleResult, ModuleSpec};

/// Catalog kind of [`AdaptiveKalman`].
pub const ADAPTIVE_KALMAN: &str = "adaptive_kalman";
/// Catalog kind of [`NoiseFilter`].
pub const NOISE: &str = "noise";
/// Catalog kind of [`MovingAverage`].
pub const MOVING_AVERAGE: &str = "moving_average";

/// A stage of the filter pipeline.
///
/// `amp` and `phase` are the device's full window (rows oldest first,
/// one column per retained subcarrier); `ts` holds the matching timestamps.
/// Filters usually rewrite only the last row.
pub trait Filter: Module + Configurable {
    fn is_enabled(&self) -> bool;

    fn set_enabled(&mut self, enabled: bool);

    fn apply(
        &mut self,
        amp: ArrayViewMut2<'_, f64>,
        phase: ArrayViewMut2<'_, f64>,
        ts: &[f64],
    ) -> Result<()>;
}

/// Every compiled-in filter, keyed by manifest kind.
pub fn catalog() -> Catalog<dyn Filter> {
    Catalog::new()
        .with(ADAPTIVE_KALMAN, |spec| configure(spec, AdaptiveKalman::new()))
        .with(MOVING_AVERAGE, |spec| configure(spec, MovingAverage::new()))
        .with(NOISE, |spec| {
            let filter = match spec.parsed_option::<u64>("seed")? {
                Some(seed) => NoiseFilter::with_seed(seed),
                None => NoiseFilter::new(),
            };
            configure(spec, filter)
        })
}

/// Apply manifest overrides and the initial enabled state (off unless declared).
fn configure<F: Filter + 'static>(spec: &ModuleSpec, mut filter: F) -> ModuleResult<Box<dyn Filter>> {
    spec.apply_config(filter.settings_mut())?;
    filter.set_enabled(spec.enabled.unwrap_or(false));
    Ok(Box::new(filter))
}
