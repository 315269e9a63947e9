//! Bounded numeric parameters exposed to a settings surface.
//!
//! Filters, plugins and the inference scheduler register their tunables in a
//! [`ConfigSet`]. Every parameter carries a `(min, max)` bound; writes are
//! clamped into it and reported to an optional change listener.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};

/// Callback invoked with `(key, old_value, new_value)` after a successful `set`.
pub type ChangeListener = Box<dyn Fn(&str, f64, f64) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Parameter {
    value: f64,
    min: f64,
    max: f64,
}

/// Ordered collection of bounded parameters.
#[derive(Default)]
pub struct ConfigSet {
    parameters: BTreeMap<String, Parameter>,
    listener: Option<ChangeListener>,
}

impl ConfigSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ConfigSet::add`].
    pub fn with(mut self, key: &str, value: f64, min: f64, max: f64) -> Self {
        self.add(key, value, min, max);
        self
    }

    /// Register a parameter. The initial value is clamped into `[min, max]`.
    pub fn add(&mut self, key: &str, value: f64, min: f64, max: f64) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.parameters.insert(
            key.to_string(),
            Parameter {
                value: value.clamp(min, max),
                min,
                max,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.parameters.get(key).map(|p| p.value)
    }

    /// Store `value` clamped to the bound registered for `key`.
    ///
    /// Returns the stored value and notifies the change listener.
    pub fn set(&mut self, key: &str, value: f64) -> Result<f64> {
        let parameter = self
            .parameters
            .get_mut(key)
            .ok_or_else(|| Error::UnknownConfigKey(key.to_string()))?;

        if value.is_nan() {
            return Err(Error::InvalidInput(format!("NaN for '{key}'")));
        }

        let old = parameter.value;
        parameter.value = value.clamp(parameter.min, parameter.max);
        let new = parameter.value;

        tracing::debug!("Config '{}' changed from {} to {}", key, old, new);
        if let Some(listener) = &self.listener {
            listener(key, old, new);
        }
        Ok(new)
    }

    /// Key → `(min, max)` for every registered parameter.
    pub fn constraints(&self) -> BTreeMap<String, (f64, f64)> {
        self.parameters
            .iter()
            .map(|(key, p)| (key.clone(), (p.min, p.max)))
            .collect()
    }

    /// Current `(key, value)` pairs in key order.
    pub fn values(&self) -> impl Iterator<Item = (&str, f64)> {
        self.parameters.iter().map(|(key, p)| (key.as_str(), p.value))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }

    /// Install the change listener, replacing any previous one.
    pub fn on_change<F>(&mut self, listener: F)
    where
        F: Fn(&str, f64, f64) + Send + Sync + 'static,
    {
        self.listener = Some(Box::new(listener));
    }
}

impl fmt::Debug for ConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigSet")
            .field("parameters", &self.parameters)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// Anything exposing a [`ConfigSet`] to the settings surface.
pub trait Configurable {
    fn settings(&self) -> &ConfigSet;

    fn settings_mut(&mut self) -> &mut ConfigSet;

    fn get(&self, key: &str) -> Option<f64> {
        self.settings().get(key)
    }

    fn set(&mut self, key: &str, value: f64) -> Result<f64> {
        self.settings_mut().set(key, value)
    }

    fn config_constraints(&self) -> BTreeMap<String, (f64, f64)> {
        self.settings().constraints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_set_clamps_to_bounds() {
        let mut config = ConfigSet::new().with("alpha", 0.5, 0.0, 1.0);

        assert_eq!(config.set("alpha", 3.0).unwrap(), 1.0);
        assert_eq!(config.get("alpha"), Some(1.0));

        assert_eq!(config.set("alpha", -2.0).unwrap(), 0.0);
        assert_eq!(config.get("alpha"), Some(0.0));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let mut config = ConfigSet::new();
        assert!(matches!(
            config.set("missing", 1.0),
            Err(Error::UnknownConfigKey(key)) if key == "missing"
        ));
    }

    #[test]
    fn test_listener_sees_old_and_clamped_value() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();

        let mut config = ConfigSet::new().with("interval_ms", 500.0, 250.0, 10_000.0);
        config.on_change(move |key, old, new| {
            assert_eq!(key, "interval_ms");
            assert_eq!(old, 500.0);
            assert_eq!(new, 250.0);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        config.set("interval_ms", 10.0).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_constraints_and_initial_clamp() {
        let config = ConfigSet::new()
            .with("mean", 0.0, -20.0, 20.0)
            .with("std", 500.0, 0.0, 100.0);

        assert_eq!(config.get("std"), Some(100.0));

        let constraints = config.constraints();
        assert_eq!(constraints["mean"], (-20.0, 20.0));
        assert_eq!(constraints["std"], (0.0, 100.0));
    }
}
