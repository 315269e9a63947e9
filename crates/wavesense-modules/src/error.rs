//! Module loading errors.

use std::path::PathBuf;

use wavesense_core::ModuleKey;

/// Result type for module operations
pub type ModuleResult<T> = Result<T, ModuleError>;

/// Module error types
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("Failed to read module {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid manifest {path}: {reason}")]
    Manifest { path: PathBuf, reason: String },

    #[error("Multiple {capability} implementations found in {path}: {}", kinds.join(", "))]
    Ambiguous {
        path: PathBuf,
        capability: String,
        kinds: Vec<String>,
    },

    #[error("Unknown {capability} kind '{kind}' in {path}")]
    UnknownKind {
        path: PathBuf,
        capability: String,
        kind: String,
    },

    #[error("Failed to instantiate '{kind}': {reason}")]
    Instantiation { kind: String, reason: String },

    #[error("Module {key} does not support hot-reloading; restart to apply changes")]
    UnsupportedHotReload { key: ModuleKey },

    #[error("Module {0} is not registered")]
    NotRegistered(ModuleKey),
}

impl ModuleError {
    pub fn instantiation(kind: &str, reason: impl ToString) -> Self {
        Self::Instantiation {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}
