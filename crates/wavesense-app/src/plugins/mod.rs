//! Compiled-in plugins.

mod activity;
mod snr;

pub use activity::ActivityReporter;
pub use snr::{compute_snr, SnrMonitor, SnrReport, NULL_CARRIER_SNR};

use wavesense_core::Configurable;
use wavesense_modules::Catalog;

use crate::plugin::{Plugin, PluginContext};

/// Catalog kind of [`SnrMonitor`].
pub const SNR_MONITOR: &str = "snr_monitor";
/// Catalog kind of [`ActivityReporter`].
pub const ACTIVITY_REPORTER: &str = "activity_reporter";

/// Every compiled-in plugin, built against `context`.
pub fn catalog(context: PluginContext) -> Catalog<dyn Plugin> {
    let snr = context.clone();
    Catalog::new()
        .with(SNR_MONITOR, move |spec| {
            let mut plugin = SnrMonitor::new(snr.store.clone());
            spec.apply_config(plugin.settings_mut())?;
            Ok(Box::new(plugin) as Box<dyn Plugin>)
        })
        .with(ACTIVITY_REPORTER, move |_| {
            Ok(Box::new(ActivityReporter::new(context.scheduler.clone())) as Box<dyn Plugin>)
        })
}
