//! # Wavesense-Modules
//!
//! Discovery and lifecycle management of hot-swappable implementations.
//!
//! A module is a TOML manifest on disk declaring which implementation of a
//! capability (`filter`, `model` or `plugin`) to build and how to configure it.
//! Implementations themselves are compiled in and registered by name in a
//! [`Catalog`]; the [`ModuleRegistry`] maps manifests to live instances.
//!
//! ## Flow
//!
//! ```text
//! modules/**/*.toml ──load_all──▶ ModuleRegistry ──▶ observers (filter pipeline, ...)
//!        │                              ▲
//!  ManifestWatcher ──Debouncer──▶ mpsc ─┘ reload(path)
//! ```

pub mod catalog;
pub mod error;
pub mod manifest;
pub mod registry;
pub mod watch;

pub use catalog::*;
pub use error::{ModuleError, ModuleResult};
pub use manifest::*;
pub use registry::*;
pub use watch::*;
