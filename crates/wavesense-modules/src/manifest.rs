//! Module manifest format.
//!
//! ```toml
//! [[module]]
//! capability = "filter"
//! kind = "adaptive_kalman"
//! enabled = true
//!
//! [module.config]
//! alpha = 0.5
//!
//! [module.options]
//! seed = "7"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wavesense_core::ConfigSet;

use crate::error::{ModuleError, ModuleResult};

/// File extension of module manifests.
pub const MANIFEST_EXTENSION: &str = "toml";

/// Capability tag used in manifests for filters.
pub const FILTER_CAPABILITY: &str = "filter";
/// Capability tag used in manifests for HAR models.
pub const MODEL_CAPABILITY: &str = "model";
/// Capability tag used in manifests for plugins.
pub const PLUGIN_CAPABILITY: &str = "plugin";

/// Parsed content of one manifest file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModuleManifest {
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleSpec>,
}

/// One implementation declared by a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// Capability implemented (`filter`, `model`, `plugin`)
    pub capability: String,

    /// Catalog key of the implementation
    pub kind: String,

    /// Initial enabled state, for capabilities that have one
    #[serde(default)]
    pub enabled: Option<bool>,

    /// Numeric overrides applied through the implementation's `ConfigSet`
    #[serde(default)]
    pub config: BTreeMap<String, f64>,

    /// Free-form string options
    #[serde(default)]
    pub options: BTreeMap<String, String>,

    /// Manifest this entry was read from
    #[serde(skip)]
    pub source: PathBuf,
}

impl ModuleManifest {
    /// Read and parse a manifest file.
    pub fn from_file(path: &Path) -> ModuleResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ModuleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Parse manifest text; `path` is recorded as the source of every spec.
    pub fn parse(text: &str, path: &Path) -> ModuleResult<Self> {
        let invalid = |e: config::ConfigError| ModuleError::Manifest {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut manifest: ModuleManifest = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .map_err(invalid)?
            .try_deserialize()
            .map_err(invalid)?;

        for spec in &mut manifest.modules {
            spec.source = path.to_path_buf();
        }
        Ok(manifest)
    }

    /// Declarations implementing `capability`.
    pub fn declarations<'a>(&'a self, capability: &'a str) -> impl Iterator<Item = &'a ModuleSpec> {
        self.modules.iter().filter(move |spec| spec.capability == capability)
    }
}

impl ModuleSpec {
    pub fn new(capability: &str, kind: &str) -> Self {
        Self {
            capability: capability.to_string(),
            kind: kind.to_string(),
            enabled: None,
            config: BTreeMap::new(),
            options: BTreeMap::new(),
            source: PathBuf::new(),
        }
    }

    pub fn with_config(mut self, key: &str, value: f64) -> Self {
        self.config.insert(key.to_string(), value);
        self
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    /// Apply the numeric overrides; unknown keys fail the instantiation.
    pub fn apply_config(&self, settings: &mut ConfigSet) -> ModuleResult<()> {
        for (key, &value) in &self.config {
            settings
                .set(key, value)
                .map_err(|e| ModuleError::instantiation(&self.kind, e))?;
        }
        Ok(())
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Parse an option, failing the instantiation when it does not parse.
    pub fn parsed_option<T: std::str::FromStr>(&self, key: &str) -> ModuleResult<Option<T>>
    where
        T::Err: std::fmt::Display,
    {
        self.option(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    ModuleError::instantiation(&self.kind, format!("option '{key}': {e}"))
                })
            })
            .transpose()
    }

    /// Resolve a path option relative to the manifest's directory.
    pub fn path_option(&self, key: &str) -> Option<PathBuf> {
        let raw = Path::new(self.option(key)?);
        if raw.is_absolute() {
            Some(raw.to_path_buf())
        } else {
            let base = self.source.parent().unwrap_or_else(|| Path::new(""));
            Some(base.join(raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KALMAN: &str = r#"
        [[module]]
        capability = "filter"
        kind = "adaptive_kalman"
        enabled = true

        [module.config]
        alpha = 0.25

        [module.options]
        note = "smoothing"
    "#;

    #[test]
    fn test_parse_single_declaration() {
        let manifest = ModuleManifest::parse(KALMAN, Path::new("filters/kalman.toml")).unwrap();
        assert_eq!(manifest.modules.len(), 1);

        let spec = &manifest.modules[0];
        assert_eq!(spec.kind, "adaptive_kalman");
        assert_eq!(spec.enabled, Some(true));
        assert_eq!(spec.config["alpha"], 0.25);
        assert_eq!(spec.option("note"), Some("smoothing"));
        assert_eq!(spec.source, PathBuf::from("filters/kalman.toml"));
    }

    #[test]
    fn test_declarations_filter_by_capability() {
        let text = r#"
            [[module]]
            capability = "filter"
            kind = "noise"

            [[module]]
            capability = "plugin"
            kind = "snr_monitor"
        "#;
        let manifest = ModuleManifest::parse(text, Path::new("mixed.toml")).unwrap();
        assert_eq!(manifest.declarations(FILTER_CAPABILITY).count(), 1);
        assert_eq!(manifest.declarations(PLUGIN_CAPABILITY).count(), 1);
        assert_eq!(manifest.declarations(MODEL_CAPABILITY).count(), 0);
    }

    #[test]
    fn test_empty_manifest_has_no_declarations() {
        let manifest = ModuleManifest::parse("# nothing here\n", Path::new("empty.toml")).unwrap();
        assert!(manifest.modules.is_empty());
    }

    #[test]
    fn test_invalid_manifest_is_reported() {
        let err = ModuleManifest::parse("[[module]]\nkind = ", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ModuleError::Manifest { .. }));
    }

    #[test]
    fn test_apply_config_rejects_unknown_key() {
        let spec = ModuleSpec::new(FILTER_CAPABILITY, "noise").with_config("sigma", 2.0);
        let mut settings = ConfigSet::new().with("std", 10.0, 0.0, 100.0);
        let err = spec.apply_config(&mut settings).unwrap_err();
        assert!(matches!(err, ModuleError::Instantiation { .. }));
    }

    #[test]
    fn test_path_option_is_relative_to_manifest() {
        let mut spec = ModuleSpec::new(MODEL_CAPABILITY, "statistics_mlp").with_option("weights", "w.json");
        spec.source = PathBuf::from("/srv/models/stats/model.toml");
        assert_eq!(
            spec.path_option("weights"),
            Some(PathBuf::from("/srv/models/stats/w.json"))
        );
    }
}
