//! Registry of live module instances keyed by manifest path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use walkdir::WalkDir;
use wavesense_core::{share, Module, ModuleKey, SharedModule};

use crate::catalog::Catalog;
use crate::error::{ModuleError, ModuleResult};
use crate::manifest::{ModuleManifest, ModuleSpec, MANIFEST_EXTENSION};

/// Notified whenever an instance enters or leaves a registry.
///
/// Callbacks run while the registry is locked; they must not call back into it.
pub trait RegistryObserver<T: ?Sized>: Send + Sync {
    fn registered(&self, key: &ModuleKey, module: &SharedModule<T>);

    fn unregistered(&self, key: &ModuleKey);
}

/// A loaded instance together with the declaration it was built from.
pub struct RegisteredModule<T: ?Sized> {
    pub key: ModuleKey,
    pub path: PathBuf,
    pub spec: ModuleSpec,
    pub instance: SharedModule<T>,
}

impl<T: ?Sized> Clone for RegisteredModule<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            path: self.path.clone(),
            spec: self.spec.clone(),
            instance: Arc::clone(&self.instance),
        }
    }
}

/// Summary of a directory scan.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<ModuleKey>,
    pub failures: Vec<(PathBuf, ModuleError)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// What a reload did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The old instance was replaced by a fresh one
    Reloaded(ModuleKey),
    /// Nothing was registered before; the file now yields an instance
    Loaded(ModuleKey),
    /// The old instance was removed and the file no longer yields one
    Unloaded,
    /// Nothing registered before, nothing now
    Skipped,
}

struct RegistryState<T: ?Sized> {
    modules: Vec<RegisteredModule<T>>,
    selected: Option<ModuleKey>,
}

impl<T: ?Sized> RegistryState<T> {
    fn position(&self, key: &ModuleKey) -> Option<usize> {
        self.modules.iter().position(|m| &m.key == key)
    }
}

/// Owns the lifecycle of every instance of one capability.
pub struct ModuleRegistry<T: ?Sized + Module> {
    capability: String,
    project_root: PathBuf,
    catalog: Catalog<T>,
    observers: Vec<Arc<dyn RegistryObserver<T>>>,
    state: Mutex<RegistryState<T>>,
}

impl<T: ?Sized + Module + 'static> ModuleRegistry<T> {
    /// Keys are derived relative to the current directory unless
    /// [`ModuleRegistry::with_project_root`] says otherwise.
    pub fn new(capability: &str, catalog: Catalog<T>) -> Self {
        Self {
            capability: capability.to_string(),
            project_root: std::env::current_dir().unwrap_or_default(),
            catalog,
            observers: Vec::new(),
            state: Mutex::new(RegistryState {
                modules: Vec::new(),
                selected: None,
            }),
        }
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RegistryObserver<T>>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn catalog(&self) -> &Catalog<T> {
        &self.catalog
    }

    pub fn key_for(&self, path: &Path) -> ModuleKey {
        ModuleKey::from_path(&self.project_root, path)
    }

    /// Recursively load every manifest under `root`.
    ///
    /// A failing file is logged and recorded; the scan continues.
    pub fn load_all(&self, root: &Path) -> LoadReport {
        let mut report = LoadReport::default();

        let walker = WalkDir::new(root).sort_by_file_name().into_iter();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_manifest(entry.path()) {
                continue;
            }

            match self.load_one(entry.path()) {
                Ok(Some(key)) => report.loaded.push(key),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Failed to load {} from {}: {}", self.capability, entry.path().display(), e);
                    report.failures.push((entry.path().to_path_buf(), e));
                }
            }
        }

        report
    }

    /// Load a single manifest.
    ///
    /// Returns `Ok(None)` when the file declares no implementation of this
    /// registry's capability. A file declaring several is rejected whole. An
    /// instance already registered under the same key is replaced in its slot.
    pub fn load_one(&self, path: &Path) -> ModuleResult<Option<ModuleKey>> {
        let Some((spec, instance)) = self.build(path)? else {
            return Ok(None);
        };

        let key = self.key_for(path);
        let mut state = self.state.lock();
        let slot = self.remove_locked(&mut state, &key);
        self.insert_locked(&mut state, key.clone(), path, spec, instance, slot);
        Ok(Some(key))
    }

    /// Deactivate and drop the instance registered under `key`.
    pub fn unload(&self, key: &ModuleKey) -> bool {
        let mut state = self.state.lock();
        self.unload_locked(&mut state, key)
    }

    /// Replace the instance built from `path` with a fresh one.
    ///
    /// Refused with [`ModuleError::UnsupportedHotReload`] when the running
    /// instance cannot be deactivated; it then keeps running unchanged. When
    /// re-instantiation fails the old instance stays unloaded.
    pub fn reload(&self, path: &Path) -> ModuleResult<ReloadOutcome> {
        let key = self.key_for(path);
        let mut state = self.state.lock();

        let slot = match state.position(&key) {
            Some(index) => {
                let hot = state.modules[index].instance.lock().supports_hot_reload();
                if !hot {
                    tracing::warn!(
                        "{} {} does not support hot-reloading. Restart to apply changes.",
                        self.capability,
                        key
                    );
                    return Err(ModuleError::UnsupportedHotReload { key });
                }
                self.remove_locked(&mut state, &key)
            }
            None => None,
        };

        let built = if path.exists() { self.build(path) } else { Ok(None) };

        match built {
            Ok(Some((spec, instance))) => {
                let was_loaded = slot.is_some();
                self.insert_locked(&mut state, key.clone(), path, spec, instance, slot);
                Ok(if was_loaded {
                    ReloadOutcome::Reloaded(key)
                } else {
                    ReloadOutcome::Loaded(key)
                })
            }
            Ok(None) if slot.is_some() => {
                self.notify_unregistered(&key);
                Ok(ReloadOutcome::Unloaded)
            }
            Ok(None) => Ok(ReloadOutcome::Skipped),
            Err(e) => {
                if slot.is_some() {
                    self.notify_unregistered(&key);
                }
                Err(e)
            }
        }
    }

    /// Unload everything, in registration order.
    pub fn unload_all(&self) {
        let mut state = self.state.lock();
        let keys: Vec<ModuleKey> = state.modules.iter().map(|m| m.key.clone()).collect();
        for key in keys {
            self.unload_locked(&mut state, &key);
        }
    }

    pub fn supports_hot_reload(&self, key: &ModuleKey) -> Option<bool> {
        self.get(key).map(|module| module.lock().supports_hot_reload())
    }

    pub fn get(&self, key: &ModuleKey) -> Option<SharedModule<T>> {
        let state = self.state.lock();
        state
            .position(key)
            .map(|index| Arc::clone(&state.modules[index].instance))
    }

    pub fn entry(&self, key: &ModuleKey) -> Option<RegisteredModule<T>> {
        let state = self.state.lock();
        state.position(key).map(|index| state.modules[index].clone())
    }

    /// Snapshot of `(key, instance)` in registration order.
    pub fn modules(&self) -> Vec<(ModuleKey, SharedModule<T>)> {
        self.state
            .lock()
            .modules
            .iter()
            .map(|m| (m.key.clone(), Arc::clone(&m.instance)))
            .collect()
    }

    pub fn keys(&self) -> Vec<ModuleKey> {
        self.state.lock().modules.iter().map(|m| m.key.clone()).collect()
    }

    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.state.lock().position(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.state.lock().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark `key` as the active module. The key need not be loaded yet.
    pub fn select(&self, key: impl Into<ModuleKey>) {
        self.state.lock().selected = Some(key.into());
    }

    pub fn clear_selection(&self) {
        self.state.lock().selected = None;
    }

    pub fn selected_key(&self) -> Option<ModuleKey> {
        self.state.lock().selected.clone()
    }

    /// The active instance, if the selected key is currently loaded.
    pub fn selected(&self) -> Option<SharedModule<T>> {
        let state = self.state.lock();
        let key = state.selected.as_ref()?;
        state
            .position(key)
            .map(|index| Arc::clone(&state.modules[index].instance))
    }

    /// Parse `path` and instantiate its single declaration, if any.
    fn build(&self, path: &Path) -> ModuleResult<Option<(ModuleSpec, SharedModule<T>)>> {
        let manifest = ModuleManifest::from_file(path)?;
        let declared: Vec<&ModuleSpec> = manifest.declarations(&self.capability).collect();

        let spec = match declared.as_slice() {
            [] => return Ok(None),
            [spec] => *spec,
            many => {
                return Err(ModuleError::Ambiguous {
                    path: path.to_path_buf(),
                    capability: self.capability.clone(),
                    kinds: many.iter().map(|s| s.kind.clone()).collect(),
                })
            }
        };

        let factory = self
            .catalog
            .get(&spec.kind)
            .ok_or_else(|| ModuleError::UnknownKind {
                path: path.to_path_buf(),
                capability: self.capability.clone(),
                kind: spec.kind.clone(),
            })?;

        let instance = share(factory(spec)?);
        Ok(Some((spec.clone(), instance)))
    }

    fn insert_locked(
        &self,
        state: &mut RegistryState<T>,
        key: ModuleKey,
        path: &Path,
        spec: ModuleSpec,
        instance: SharedModule<T>,
        slot: Option<usize>,
    ) {
        tracing::info!("Loaded {} {} ({})", self.capability, key, spec.kind);

        for observer in &self.observers {
            observer.registered(&key, &instance);
        }

        let entry = RegisteredModule {
            key,
            path: path.to_path_buf(),
            spec,
            instance,
        };
        match slot {
            Some(index) => state.modules.insert(index, entry),
            None => state.modules.push(entry),
        }
    }

    /// Deactivate and remove without telling observers; returns the freed slot.
    fn remove_locked(&self, state: &mut RegistryState<T>, key: &ModuleKey) -> Option<usize> {
        let index = state.position(key)?;
        let removed = state.modules.remove(index);
        removed.instance.lock().deactivate();
        tracing::info!("Unloaded {} {}", self.capability, key);
        Some(index)
    }

    fn unload_locked(&self, state: &mut RegistryState<T>, key: &ModuleKey) -> bool {
        if self.remove_locked(state, key).is_none() {
            return false;
        }
        self.notify_unregistered(key);
        true
    }

    fn notify_unregistered(&self, key: &ModuleKey) {
        for observer in &self.observers {
            observer.unregistered(key);
        }
    }
}

/// Whether `path` has the manifest extension.
pub fn is_manifest(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(MANIFEST_EXTENSION)
}
