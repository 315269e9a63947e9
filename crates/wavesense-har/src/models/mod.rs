//! Compiled-in classifiers.

mod statistics;

pub use statistics::{MlpWeights, StatisticsMlp, FEATURE_COUNT};

use wavesense_core::Configurable;
use wavesense_modules::{Catalog, ModuleError};

use crate::model::HarModel;

/// Catalog kind of [`StatisticsMlp`].
pub const STATISTICS_MLP: &str = "statistics_mlp";

/// Hidden layer width used when a manifest does not say otherwise.
pub const DEFAULT_HIDDEN: usize = 16;

/// Every compiled-in model, built for `num_classes` outputs.
///
/// `statistics_mlp` options: `weights` (JSON file, relative to the manifest),
/// or `seed` and `hidden` for a randomly initialised network.
pub fn catalog(num_classes: usize) -> Catalog<dyn HarModel> {
    Catalog::new().with(STATISTICS_MLP, move |spec| {
        let weights = match spec.path_option("weights") {
            Some(path) => MlpWeights::load(&path).map_err(|e| {
                ModuleError::instantiation(&spec.kind, format!("{}: {}", path.display(), e))
            })?,
            None => {
                let seed = spec.parsed_option::<u64>("seed")?.unwrap_or(0);
                let hidden = spec.parsed_option::<usize>("hidden")?.unwrap_or(DEFAULT_HIDDEN);
                MlpWeights::seeded(seed, hidden, num_classes)
            }
        };

        let mut model = StatisticsMlp::new(num_classes, weights)
            .map_err(|e| ModuleError::instantiation(&spec.kind, e))?;
        spec.apply_config(model.settings_mut())?;
        Ok(Box::new(model) as Box<dyn HarModel>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use wavesense_modules::{ModuleSpec, MODEL_CAPABILITY};

    #[test]
    fn test_catalog_builds_seeded_model() {
        let spec = ModuleSpec::new(MODEL_CAPABILITY, STATISTICS_MLP)
            .with_option("seed", "11")
            .with_config("lookback_s", 5.0);

        let model = catalog(5).get(STATISTICS_MLP).unwrap()(&spec).unwrap();
        assert_eq!(model.num_classes(), 5);
        assert!(model.supports_hot_reload());
    }

    #[test]
    fn test_weights_file_is_loaded_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let weights = MlpWeights::seeded(4, 3, 2);
        std::fs::write(dir.path().join("w.json"), serde_json::to_string(&weights).unwrap()).unwrap();

        let mut spec = ModuleSpec::new(MODEL_CAPABILITY, STATISTICS_MLP).with_option("weights", "w.json");
        spec.source = dir.path().join("model.toml");

        let model = catalog(2).get(STATISTICS_MLP).unwrap()(&spec).unwrap();
        assert_eq!(model.num_classes(), 2);
    }

    #[test]
    fn test_missing_weights_fail_instantiation() {
        let mut spec = ModuleSpec::new(MODEL_CAPABILITY, STATISTICS_MLP).with_option("weights", "absent.json");
        spec.source = PathBuf::from("/nonexistent/model.toml");

        let err = catalog(5).get(STATISTICS_MLP).unwrap()(&spec).err().expect("missing weights rejected");
        assert!(matches!(err, ModuleError::Instantiation { .. }));
    }

    #[test]
    fn test_weights_for_other_class_count_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let weights = MlpWeights::seeded(4, 3, 2);
        std::fs::write(dir.path().join("w.json"), serde_json::to_string(&weights).unwrap()).unwrap();

        let mut spec = ModuleSpec::new(MODEL_CAPABILITY, STATISTICS_MLP).with_option("weights", "w.json");
        spec.source = dir.path().join("model.toml");

        assert!(catalog(5).get(STATISTICS_MLP).unwrap()(&spec).is_err());
    }
}
