//! # Wavesense-HAR
//!
//! Human-activity recognition on top of the live CSI store.
//!
//! The [`InferenceScheduler`] asks the currently selected [`HarModel`] to
//! evaluate the store window on a fixed cadence and keeps the predictions
//! that are still inside the window. [`apply_consensus`] smooths that list for
//! display without touching it.

pub mod consensus;
pub mod model;
pub mod models;
pub mod prediction;
pub mod scheduler;
pub mod timer;

pub use consensus::*;
pub use model::*;
pub use models::{MlpWeights, StatisticsMlp};
pub use prediction::*;
pub use scheduler::*;
pub use timer::*;
