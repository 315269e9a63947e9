//! Ordered filter chain run inside [`CsiStore::push`](crate::CsiStore::push).

use std::time::Instant;

use ndarray::ArrayViewMut2;

use wavesense_core::{share, PerfRing, SharedModule};

use crate::filters::Filter;

/// One registered filter and its timing history.
pub struct FilterSlot {
    key: String,
    filter: SharedModule<dyn Filter>,
    perf: PerfRing,
}

impl FilterSlot {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn filter(&self) -> &SharedModule<dyn Filter> {
        &self.filter
    }

    pub fn performance(&self) -> &PerfRing {
        &self.perf
    }
}

/// Filters in application order (registration order).
#[derive(Default)]
pub struct FilterPipeline {
    slots: Vec<FilterSlot>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an owned filter; returns the shared handle.
    pub fn add(&mut self, key: impl Into<String>, filter: Box<dyn Filter>) -> SharedModule<dyn Filter> {
        let shared = share(filter);
        self.attach(key, shared.clone());
        shared
    }

    /// Insert a shared filter. An existing key keeps its position and gets
    /// the new instance with a fresh timing history.
    pub fn attach(&mut self, key: impl Into<String>, filter: SharedModule<dyn Filter>) {
        let key = key.into();
        match self.slots.iter_mut().find(|slot| slot.key == key) {
            Some(slot) => {
                slot.filter = filter;
                slot.perf = PerfRing::new();
            }
            None => self.slots.push(FilterSlot {
                key,
                filter,
                perf: PerfRing::new(),
            }),
        }
    }

    pub fn detach(&mut self, key: &str) -> bool {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.key != key);
        self.slots.len() != before
    }

    /// Run every enabled filter in order, timing each call.
    ///
    /// A failing filter is logged and skipped; later filters still run.
    pub fn apply(&mut self, mut amp: ArrayViewMut2<'_, f64>, mut phase: ArrayViewMut2<'_, f64>, ts: &[f64]) {
        for slot in &mut self.slots {
            let mut filter = slot.filter.lock();
            if !filter.is_enabled() {
                continue;
            }

            let started = Instant::now();
            let result = filter.apply(amp.view_mut(), phase.view_mut(), ts);
            slot.perf.push(started.elapsed());

            if let Err(e) = result {
                tracing::warn!("Filter {} failed: {}", slot.key, e);
            }
        }
    }

    pub fn set_enabled(&self, key: &str, enabled: bool) -> bool {
        match self.get(key) {
            Some(filter) => {
                filter.lock().set_enabled(enabled);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<SharedModule<dyn Filter>> {
        self.slots
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| slot.filter.clone())
    }

    pub fn performance(&self, key: &str) -> Option<&PerfRing> {
        self.slots
            .iter()
            .find(|slot| slot.key == key)
            .map(|slot| &slot.perf)
    }

    pub fn keys(&self) -> Vec<String> {
        self.slots.iter().map(|slot| slot.key.clone()).collect()
    }

    pub fn slots(&self) -> &[FilterSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
