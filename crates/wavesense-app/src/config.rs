//! Runtime configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use wavesense_core::SubcarrierMask;
use wavesense_csi::DEFAULT_WINDOW;
use wavesense_har::default_classes;

/// Prefix of environment overrides, e.g. `WAVESENSE_STORE__WINDOW=4096`.
pub const ENV_PREFIX: &str = "WAVESENSE";

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// CSI store
    pub store: StoreConfig,

    /// Module directories and hot reload
    pub modules: ModulesConfig,

    /// Inference scheduler
    pub inference: InferenceConfig,

    /// Plugin render loop
    pub render: RenderConfig,

    /// Where samples come from
    pub source: SourceConfig,

    /// Capture every sample to this JSON-lines file
    pub record_to: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskPreset {
    /// Keep all 256 subcarriers
    #[default]
    All,
    /// 802.11ac 80 MHz usable subcarriers
    Nexmon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Rows kept per device
    pub window: usize,

    pub mask: MaskPreset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Module keys are relative to this directory
    pub root: PathBuf,

    /// Filter manifests (relative to `root`)
    pub filters: PathBuf,

    /// Model manifests (relative to `root`)
    pub models: PathBuf,

    /// Plugin manifests (relative to `root`)
    pub plugins: PathBuf,

    /// Watch the module directories and reload changed manifests
    pub hot_reload: bool,

    /// Watcher scan period (milliseconds)
    pub poll_interval_ms: u64,

    /// Per-file reload debounce (milliseconds)
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub interval_ms: f64,

    pub consensus_window: f64,

    pub min_confidence: f64,

    /// Class labels in confidence-vector order
    pub classes: Vec<String>,

    /// Key of the model to select; the first loaded model otherwise
    pub model: Option<String>,

    /// Schedule inference as soon as the runtime starts
    pub autostart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Plugin render period (milliseconds)
    pub interval_ms: u64,

    /// Select the first device seen when nothing is selected
    pub auto_select_device: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Mock multi-device generator
    Synthetic {
        #[serde(default = "default_devices")]
        devices: Vec<String>,
        #[serde(default = "default_rate_hz")]
        rate_hz: f64,
        #[serde(default = "default_subcarriers")]
        subcarriers: usize,
        /// Stop after this many samples
        #[serde(default)]
        limit: Option<u64>,
        #[serde(default)]
        seed: Option<u64>,
    },
    /// JSON-lines capture
    Replay {
        path: PathBuf,
        /// Pace replay with the recorded inter-frame gaps
        #[serde(default)]
        simulate_time: bool,
    },
}

fn default_devices() -> Vec<String> {
    vec!["00:11:22:33:44:55".to_string()]
}

fn default_rate_hz() -> f64 {
    100.0
}

fn default_subcarriers() -> usize {
    wavesense_core::SUBCARRIER_SLOTS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            mask: MaskPreset::All,
        }
    }
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            filters: PathBuf::from("modules/filters"),
            models: PathBuf::from("modules/models"),
            plugins: PathBuf::from("modules/plugins"),
            hot_reload: true,
            poll_interval_ms: 500,
            debounce_ms: 1000,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500.0,
            consensus_window: 1.0,
            min_confidence: 0.1,
            classes: default_classes(),
            model: None,
            autostart: true,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30,
            auto_select_device: true,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Synthetic {
            devices: default_devices(),
            rate_hz: default_rate_hz(),
            subcarriers: default_subcarriers(),
            limit: None,
            seed: None,
        }
    }
}

impl MaskPreset {
    pub fn mask(self) -> SubcarrierMask {
        match self {
            MaskPreset::All => SubcarrierMask::all(),
            MaskPreset::Nexmon => SubcarrierMask::nexmon(),
        }
    }
}

impl ModulesConfig {
    pub fn filters_dir(&self) -> PathBuf {
        self.root.join(&self.filters)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join(&self.models)
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join(&self.plugins)
    }
}

impl AppConfig {
    /// Load from an optional TOML file, then `WAVESENSE_*` environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse TOML text (no environment overrides)
    pub fn from_toml(text: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.store.window, 2048);
        assert_eq!(config.store.mask, MaskPreset::All);
        assert_eq!(config.inference.interval_ms, 500.0);
        assert_eq!(config.inference.classes.len(), 5);
        assert_eq!(config.render.interval_ms, 30);
        assert!(matches!(config.source, SourceConfig::Synthetic { .. }));
        assert_eq!(config.modules.filters_dir(), PathBuf::from("./modules/filters"));
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.modules.debounce_ms, 1000);
        assert!(config.record_to.is_none());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = AppConfig::from_toml(
            r#"
            record_to = "captures/session.jsonl"

            [store]
            window = 512
            mask = "nexmon"

            [inference]
            consensus_window = 3
            model = "modules/models/statistics.toml"

            [source]
            kind = "replay"
            path = "captures/walk.jsonl"
            simulate_time = true
            "#,
        )
        .unwrap();

        assert_eq!(config.store.window, 512);
        assert_eq!(config.store.mask.mask().count(), 228);
        assert_eq!(config.inference.consensus_window, 3.0);
        assert_eq!(config.inference.min_confidence, 0.1);
        assert_eq!(
            config.inference.model.as_deref(),
            Some("modules/models/statistics.toml")
        );
        assert_eq!(
            config.source,
            SourceConfig::Replay {
                path: PathBuf::from("captures/walk.jsonl"),
                simulate_time: true,
            }
        );
        assert_eq!(config.record_to, Some(PathBuf::from("captures/session.jsonl")));
    }

    #[test]
    fn test_synthetic_source_fields_default() {
        let config = AppConfig::from_toml(
            r#"
            [source]
            kind = "synthetic"
            devices = ["aa", "bb"]
            "#,
        )
        .unwrap();

        match config.source {
            SourceConfig::Synthetic {
                devices,
                rate_hz,
                subcarriers,
                limit,
                ..
            } => {
                assert_eq!(devices, vec!["aa", "bb"]);
                assert_eq!(rate_hz, 100.0);
                assert_eq!(subcarriers, 256);
                assert_eq!(limit, None);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/wavesense.toml"))).is_err());
    }
}
