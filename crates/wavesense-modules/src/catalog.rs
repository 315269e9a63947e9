//! Compiled-in implementations available to manifests.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ModuleResult;
use crate::manifest::ModuleSpec;

/// Constructor for one implementation kind.
///
/// Construction context (class count, store handles, ...) is captured by the
/// closure when the kind is registered.
pub type Factory<T> = Box<dyn Fn(&ModuleSpec) -> ModuleResult<Box<T>> + Send + Sync>;

/// Named constructors for one capability.
pub struct Catalog<T: ?Sized> {
    factories: BTreeMap<String, Factory<T>>,
}

impl<T: ?Sized> Catalog<T> {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: &str, factory: F) -> &mut Self
    where
        F: Fn(&ModuleSpec) -> ModuleResult<Box<T>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Box::new(factory));
        self
    }

    /// Builder form of [`Catalog::register`].
    pub fn with<F>(mut self, kind: &str, factory: F) -> Self
    where
        F: Fn(&ModuleSpec) -> ModuleResult<Box<T>> + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }

    pub fn get(&self, kind: &str) -> Option<&Factory<T>> {
        self.factories.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl<T: ?Sized> Default for Catalog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Catalog<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
