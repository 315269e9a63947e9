//! Concurrent per-device CSI window.

use std::collections::HashMap;

use ndarray::{Array2, ArrayViewMut2};
use num_complex::Complex;
use parking_lot::Mutex;

use wavesense_core::{DeviceId, Error, ModuleKey, Result, SharedModule, SubcarrierMask};
use wavesense_modules::RegistryObserver;

use crate::buffer::WindowBuffer;
use crate::filters::Filter;
use crate::pipeline::FilterPipeline;
use crate::sample::{amplitude_db, CsiSample};

/// Rows kept per device unless configured otherwise.
pub const DEFAULT_WINDOW: usize = 2048;

/// Co-indexed series of one device. All four always hold the same number of rows.
#[derive(Debug, Clone)]
pub struct CsiEntry {
    raw: WindowBuffer<Complex<f64>>,
    amp: WindowBuffer<f64>,
    phase: WindowBuffer<f64>,
    ts: WindowBuffer<f64>,
}

impl CsiEntry {
    fn new(width: usize, window: usize) -> Self {
        Self {
            raw: WindowBuffer::new(width, window),
            amp: WindowBuffer::new(width, window),
            phase: WindowBuffer::new(width, window),
            ts: WindowBuffer::new(1, window),
        }
    }

    pub fn len(&self) -> usize {
        self.ts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }

    fn append(&mut self, row: &[Complex<f64>], ts: f64) -> Result<()> {
        self.raw.push_row(row.iter().copied())?;
        self.amp.push_row(row.iter().map(|&c| amplitude_db(c)))?;
        self.phase.push_row(row.iter().map(|c| c.arg()))?;
        self.ts.push_row([ts])
    }

    /// Exclusive views handed to the filter pipeline.
    fn filter_views(&mut self) -> Result<(ArrayViewMut2<'_, f64>, ArrayViewMut2<'_, f64>, &[f64])> {
        Ok((self.amp.view_mut()?, self.phase.view_mut()?, self.ts.as_slice()))
    }
}

/// Owned copy of the selected device's window.
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    pub device: Option<DeviceId>,
    pub amp: Array2<f64>,
    pub phase: Array2<f64>,
    pub ts: Vec<f64>,
}

impl StoreSnapshot {
    pub fn is_empty(&self) -> bool {
        self.ts.is_empty()
    }
}

struct StoreState {
    mask: SubcarrierMask,
    entries: HashMap<DeviceId, CsiEntry>,
    /// Devices in order of first arrival
    arrival: Vec<DeviceId>,
    selected: Option<DeviceId>,
    pipeline: FilterPipeline,
}

impl StoreState {
    fn selected_entry(&self) -> Option<&CsiEntry> {
        self.selected.as_ref().and_then(|id| self.entries.get(id))
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.arrival.clear();
        self.selected = None;
    }
}

/// Device → bounded CSI window, plus the filter pipeline run on every push.
///
/// One lock guards every entry, the selection and the pipeline; `push` holds
/// it across append, truncation and filtering so readers never see a torn row.
/// Readers get owned copies.
pub struct CsiStore {
    window: usize,
    state: Mutex<StoreState>,
}

impl CsiStore {
    pub fn new(mask: SubcarrierMask, window: usize) -> Self {
        tracing::info!("CSI mask set. Number of subcarriers: {}", mask.count());
        Self {
            window: window.max(1),
            state: Mutex::new(StoreState {
                mask,
                entries: HashMap::new(),
                arrival: Vec::new(),
                selected: None,
                pipeline: FilterPipeline::new(),
            }),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn mask(&self) -> SubcarrierMask {
        self.state.lock().mask.clone()
    }

    pub fn subcarrier_count(&self) -> usize {
        self.state.lock().mask.count()
    }

    /// Replace the mask; all device data and the selection are dropped.
    pub fn set_mask(&self, mask: SubcarrierMask) {
        let mut state = self.state.lock();
        tracing::info!("CSI mask set. Number of subcarriers: {}", mask.count());
        state.mask = mask;
        state.reset();
    }

    /// Append one frame for `device`.
    ///
    /// A vector whose length differs from the mask is dropped with
    /// [`Error::MalformedFrame`] and leaves the store untouched.
    pub fn push(&self, device: &str, csi: &[Complex<f64>], ts: f64) -> Result<()> {
        let mut state = self.state.lock();

        if csi.len() != state.mask.len() {
            tracing::warn!(
                "Skipping frame from {}: mismatched shape {} vs {}",
                device,
                csi.len(),
                state.mask.len()
            );
            return Err(Error::MalformedFrame {
                expected: state.mask.len(),
                actual: csi.len(),
            });
        }

        let row: Vec<Complex<f64>> = state.mask.select(csi).copied().collect();
        let window = self.window;

        let StoreState {
            entries,
            arrival,
            pipeline,
            ..
        } = &mut *state;

        let entry = entries.entry(device.to_string()).or_insert_with(|| {
            tracing::info!("New device: {}", device);
            arrival.push(device.to_string());
            CsiEntry::new(row.len(), window)
        });

        entry.append(&row, ts)?;
        let (amp, phase, ts) = entry.filter_views()?;
        pipeline.apply(amp, phase, ts);
        Ok(())
    }

    pub fn push_sample(&self, sample: &CsiSample) -> Result<()> {
        self.push(&sample.device_id, &sample.csi, sample.unix_seconds())
    }

    /// Amplitudes (dB) of the selected device; `0 × subcarrier_count` if none.
    pub fn get_amp(&self) -> Array2<f64> {
        let state = self.state.lock();
        copy_or_empty(state.selected_entry().map(|e| &e.amp), state.mask.count())
    }

    pub fn get_phase(&self) -> Array2<f64> {
        let state = self.state.lock();
        copy_or_empty(state.selected_entry().map(|e| &e.phase), state.mask.count())
    }

    pub fn get_raw(&self) -> Array2<Complex<f64>> {
        let state = self.state.lock();
        copy_or_empty(state.selected_entry().map(|e| &e.raw), state.mask.count())
    }

    pub fn get_ts(&self) -> Vec<f64> {
        let state = self.state.lock();
        state
            .selected_entry()
            .map(|e| e.ts.as_slice().to_vec())
            .unwrap_or_default()
    }

    /// Amplitude, phase and timestamps of the selected device from a single
    /// lock acquisition.
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock();
        let width = state.mask.count();
        let entry = state.selected_entry();

        StoreSnapshot {
            device: entry.and(state.selected.clone()),
            amp: copy_or_empty(entry.map(|e| &e.amp), width),
            phase: copy_or_empty(entry.map(|e| &e.phase), width),
            ts: entry.map(|e| e.ts.as_slice().to_vec()).unwrap_or_default(),
        }
    }

    /// Make `device` the active one. Unknown ids leave the selection unchanged.
    pub fn select_device(&self, device: &str) -> bool {
        let mut state = self.state.lock();
        if state.entries.contains_key(device) {
            state.selected = Some(device.to_string());
            true
        } else {
            false
        }
    }

    pub fn selected_device(&self) -> Option<DeviceId> {
        self.state.lock().selected.clone()
    }

    /// Known devices in order of first arrival.
    pub fn devices(&self) -> Vec<DeviceId> {
        self.state.lock().arrival.clone()
    }

    /// Rows currently held for `device`.
    pub fn len_of(&self, device: &str) -> Option<usize> {
        self.state.lock().entries.get(device).map(CsiEntry::len)
    }

    /// Drop every device and the selection.
    pub fn clear(&self) {
        self.state.lock().reset();
        tracing::info!("CSI store cleared");
    }

    /// Run `f` with exclusive access to the filter pipeline.
    pub fn with_pipeline<R>(&self, f: impl FnOnce(&mut FilterPipeline) -> R) -> R {
        f(&mut self.state.lock().pipeline)
    }

    pub fn add_filter(&self, key: impl Into<String>, filter: Box<dyn Filter>) -> SharedModule<dyn Filter> {
        self.with_pipeline(|pipeline| pipeline.add(key, filter))
    }
}

impl Default for CsiStore {
    fn default() -> Self {
        Self::new(SubcarrierMask::all(), DEFAULT_WINDOW)
    }
}

/// Loaded filter manifests join the pipeline; unloaded ones leave it.
impl RegistryObserver<dyn Filter> for CsiStore {
    fn registered(&self, key: &ModuleKey, module: &SharedModule<dyn Filter>) {
        self.with_pipeline(|pipeline| pipeline.attach(key.as_str(), module.clone()));
    }

    fn unregistered(&self, key: &ModuleKey) {
        self.with_pipeline(|pipeline| pipeline.detach(key.as_str()));
    }
}

fn copy_or_empty<T: Clone + Default>(buffer: Option<&WindowBuffer<T>>, width: usize) -> Array2<T> {
    buffer
        .and_then(|b| b.to_array().ok())
        .unwrap_or_else(|| Array2::default((0, width)))
}
