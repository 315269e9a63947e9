//! # Wavesense-App
//!
//! Wires the CSI store, the three module registries, the inference scheduler
//! and the plugin host into one headless runtime.
//!
//! ## Layout
//!
//! - [`config`]: `AppConfig`, loaded from TOML and `WAVESENSE__*` variables
//! - [`plugin`]: the `Plugin` capability and its host
//! - [`plugins`]: compiled-in plugins
//! - [`runtime`]: assembly (`App`) and the event loop

pub mod config;
pub mod plugin;
pub mod plugins;
pub mod runtime;

pub use config::*;
pub use plugin::*;
pub use runtime::*;
