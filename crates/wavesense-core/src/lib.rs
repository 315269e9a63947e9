//! # Wavesense-Core
//!
//! Core types and utilities shared by the wavesense crates: a live WiFi CSI
//! store with a filter pipeline, hot-swappable filter/model/plugin modules and a
//! periodic human-activity-recognition (HAR) scheduler.

pub mod config;
pub mod error;
pub mod module;
pub mod perf;
pub mod types;

pub use config::*;
pub use error::{Error, Result};
pub use module::*;
pub use perf::*;
pub use types::*;
