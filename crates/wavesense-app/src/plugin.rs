//! Periodic consumers of the store and the prediction list.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use wavesense_core::{Module, ModuleKey, PerfRing};
use wavesense_csi::CsiStore;
use wavesense_har::InferenceScheduler;
use wavesense_modules::ModuleRegistry;

/// A hot-swappable consumer rendered by the [`PluginHost`].
pub trait Plugin: Module {
    /// Do one round of work. `tick` is the host's render counter (starts at 1).
    fn render(&mut self, tick: u64);

    /// Render every `n` host ticks; `None` never renders.
    fn render_schedule(&self) -> Option<u64> {
        None
    }
}

/// Handles passed to plugin constructors.
#[derive(Clone)]
pub struct PluginContext {
    pub store: Arc<CsiStore>,
    pub scheduler: Arc<InferenceScheduler>,
}

/// Renders the plugins of a registry on a shared tick counter.
pub struct PluginHost {
    registry: Arc<ModuleRegistry<dyn Plugin>>,
    state: Mutex<HostState>,
}

#[derive(Default)]
struct HostState {
    tick: u64,
    perf: BTreeMap<ModuleKey, PerfRing>,
}

impl PluginHost {
    pub fn new(registry: Arc<ModuleRegistry<dyn Plugin>>) -> Self {
        Self {
            registry,
            state: Mutex::new(HostState::default()),
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry<dyn Plugin>> {
        &self.registry
    }

    pub fn tick(&self) -> u64 {
        self.state.lock().tick
    }

    /// Advance the tick and render every plugin that is due.
    ///
    /// Every plugin gets a duration recorded each round, due or not. Returns
    /// the number of plugins rendered.
    pub fn render(&self) -> usize {
        let tick = {
            let mut state = self.state.lock();
            state.tick += 1;
            state.tick
        };

        let plugins = self.registry.modules();
        let mut rendered = 0;
        let mut timings = Vec::with_capacity(plugins.len());

        for (key, plugin) in plugins {
            let start = Instant::now();
            {
                let mut plugin = plugin.lock();
                let due = plugin
                    .render_schedule()
                    .filter(|&every| every > 0)
                    .is_some_and(|every| tick % every == 0);
                if due {
                    plugin.render(tick);
                    rendered += 1;
                }
            }
            timings.push((key, start.elapsed()));
        }

        let mut state = self.state.lock();
        state.perf.retain(|key, _| timings.iter().any(|(k, _)| k == key));
        for (key, elapsed) in timings {
            state.perf.entry(key).or_default().push(elapsed);
        }
        rendered
    }

    /// Recent render durations of one plugin.
    pub fn performance(&self, key: &ModuleKey) -> Option<PerfRing> {
        self.state.lock().perf.get(key).cloned()
    }
}
