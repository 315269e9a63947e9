//! Lifecycle contract shared by filters, models and plugins.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A loaded instance shared between its registry and its consumer.
pub type SharedModule<T> = Arc<Mutex<Box<T>>>;

/// Wrap a freshly built instance for sharing.
pub fn share<T: ?Sized>(instance: Box<T>) -> SharedModule<T> {
    Arc::new(Mutex::new(instance))
}

/// Base trait for every hot-swappable implementation.
pub trait Module: Send {
    /// Display name
    fn name(&self) -> &str;

    /// Release resources before the instance is dropped by its registry.
    ///
    /// Called at most once per instance.
    fn deactivate(&mut self) {}

    /// Whether a changed source may replace this instance at runtime.
    ///
    /// Implementations that override [`Module::deactivate`] return `true`.
    fn supports_hot_reload(&self) -> bool {
        false
    }
}

/// Canonical identity of a module: its source path relative to the project
/// root, `/`-separated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleKey(String);

impl ModuleKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key of `path` relative to `root`.
    ///
    /// Relative paths are resolved against the current directory. `.` and `..`
    /// components are folded lexically so the file does not need to exist.
    pub fn from_path(root: &Path, path: &Path) -> Self {
        let absolute = normalize(&absolutize(path));
        let root = normalize(&absolutize(root));

        let relative = absolute.strip_prefix(&root).unwrap_or(&absolute);
        let key = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("/");

        if relative.is_absolute() {
            Self(format!("/{key}"))
        } else {
            Self(key)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
