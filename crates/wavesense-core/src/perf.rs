//! Fixed-size record of recent call durations.

use std::collections::VecDeque;
use std::time::Duration;

/// Number of durations kept per filter or plugin.
pub const PERF_HISTORY: usize = 100;

/// Circular buffer of the last [`PERF_HISTORY`] call durations in seconds.
///
/// Starts zero-filled; each push overwrites the oldest entry.
#[derive(Debug, Clone)]
pub struct PerfRing {
    ticks: VecDeque<f64>,
}

impl PerfRing {
    pub fn new() -> Self {
        Self::with_capacity(PERF_HISTORY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ticks: VecDeque::from(vec![0.0; capacity.max(1)]),
        }
    }

    pub fn push(&mut self, elapsed: Duration) {
        self.ticks.pop_front();
        self.ticks.push_back(elapsed.as_secs_f64());
    }

    /// Durations oldest first.
    pub fn ticks(&self) -> impl Iterator<Item = f64> + '_ {
        self.ticks.iter().copied()
    }

    pub fn latest(&self) -> f64 {
        self.ticks.back().copied().unwrap_or(0.0)
    }

    pub fn mean(&self) -> f64 {
        self.ticks.iter().sum::<f64>() / self.ticks.len() as f64
    }

    pub fn capacity(&self) -> usize {
        self.ticks.len()
    }
}

impl Default for PerfRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut ring = PerfRing::with_capacity(3);
        for ms in 1..=4 {
            ring.push(Duration::from_millis(ms));
        }

        let ticks: Vec<f64> = ring.ticks().collect();
        assert_eq!(ring.capacity(), 3);
        assert!((ticks[0] - 0.002).abs() < 1e-12);
        assert!((ring.latest() - 0.004).abs() < 1e-12);
    }

    #[test]
    fn test_default_history_is_zero_filled() {
        let ring = PerfRing::new();
        assert_eq!(ring.capacity(), PERF_HISTORY);
        assert_eq!(ring.mean(), 0.0);
    }
}
