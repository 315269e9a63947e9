//! # Wavesense-CSI
//!
//! Live Channel State Information (CSI) handling for WiFi activity sensing.
//!
//! Each transmitting device gets a bounded time series of raw complex CSI,
//! amplitude in dB and phase. Every accepted sample runs through an ordered
//! pipeline of stateful filters while the store lock is held, so readers
//! always observe the filtered, co-indexed window.
//!
//! ## Data flow
//!
//! 1. **Source**: a [`SampleSource`] yields `(timestamp, csi, device_id)` samples
//! 2. **Reader**: [`ReaderTask`] pulls samples, honours pause/clear and records captures
//! 3. **Store**: [`CsiStore::push`] masks, converts and appends, then truncates to the window
//! 4. **Filters**: [`FilterPipeline::apply`] mutates the trailing rows in place

pub mod buffer;
pub mod capture;
pub mod filters;
pub mod pipeline;
pub mod reader;
pub mod sample;
pub mod source;
pub mod store;

pub use buffer::*;
pub use capture::*;
pub use filters::{AdaptiveKalman, Filter, MovingAverage, NoiseFilter};
pub use pipeline::*;
pub use reader::*;
pub use sample::*;
pub use source::*;
pub use store::*;
