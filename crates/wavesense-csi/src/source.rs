//! Sample sources: the boundary to CSI decoders.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use num_complex::Complex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use wavesense_core::{DeviceId, Error, Result, SUBCARRIER_SLOTS};

use crate::sample::CsiSample;

/// Producer of decoded CSI samples.
///
/// `next_sample` must be cancel-safe: the reader races it against control
/// changes and drops the future when one arrives.
#[async_trait]
pub trait SampleSource: Send {
    fn name(&self) -> &str;

    /// Next sample, or `None` once the stream has ended.
    async fn next_sample(&mut self) -> Result<Option<CsiSample>>;

    /// Drop anything buffered but not yet yielded.
    fn discard_pending(&mut self) {}

    /// Called when reading resumes after a pause.
    fn resumed(&mut self) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ControlState {
    paused: bool,
    clear_epoch: u64,
}

/// Shared pause / resume / clear handle for a running reader.
#[derive(Debug, Clone)]
pub struct SourceControl {
    tx: std::sync::Arc<watch::Sender<ControlState>>,
}

impl SourceControl {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ControlState::default());
        Self {
            tx: std::sync::Arc::new(tx),
        }
    }

    /// Stop pulling samples; whatever the source buffers stays there.
    pub fn pause(&self) {
        self.tx.send_modify(|state| state.paused = true);
        tracing::info!("Reader paused");
    }

    pub fn resume(&self) {
        self.tx.send_modify(|state| state.paused = false);
        tracing::info!("Reader resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.tx.borrow().paused
    }

    /// Discard pending samples at the source and clear the store.
    pub fn clear(&self) {
        self.tx.send_modify(|state| state.clear_epoch += 1);
    }

    pub(crate) fn subscribe(&self) -> ControlReceiver {
        ControlReceiver {
            rx: self.tx.subscribe(),
            seen_epoch: self.tx.borrow().clear_epoch,
            was_paused: false,
        }
    }
}

impl Default for SourceControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader-side view of a [`SourceControl`].
pub(crate) struct ControlReceiver {
    rx: watch::Receiver<ControlState>,
    seen_epoch: u64,
    was_paused: bool,
}

/// What the reader should do before pulling again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ControlUpdate {
    pub paused: bool,
    pub cleared: bool,
    pub resumed: bool,
}

impl ControlReceiver {
    pub fn poll(&mut self) -> ControlUpdate {
        let state = *self.rx.borrow_and_update();
        let cleared = state.clear_epoch != self.seen_epoch;
        let resumed = self.was_paused && !state.paused;
        self.seen_epoch = state.clear_epoch;
        self.was_paused = state.paused;
        ControlUpdate {
            paused: state.paused,
            cleared,
            resumed,
        }
    }

    /// Resolves on the next control change.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Samples pushed by an external decoder over an mpsc channel.
pub struct ChannelSource {
    name: String,
    rx: mpsc::Receiver<CsiSample>,
}

impl ChannelSource {
    pub fn new(name: &str, capacity: usize) -> (Self, mpsc::Sender<CsiSample>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                name: name.to_string(),
                rx,
            },
            tx,
        )
    }
}

#[async_trait]
impl SampleSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_sample(&mut self) -> Result<Option<CsiSample>> {
        Ok(self.rx.recv().await)
    }

    fn discard_pending(&mut self) {
        let mut discarded = 0usize;
        while self.rx.try_recv().is_ok() {
            discarded += 1;
        }
        tracing::debug!("Discarded {} pending samples from {}", discarded, self.name);
    }
}

/// Mock multi-device generator for demos and tests.
///
/// Devices are served round-robin at `rate_hz` samples per second in total.
/// Each device sees a slowly breathing amplitude profile with Gaussian jitter.
pub struct SyntheticSource {
    devices: Vec<DeviceId>,
    period: Duration,
    subcarriers: usize,
    limit: Option<u64>,
    seq: u64,
    rng: StdRng,
    ticker: Option<Interval>,
}

impl SyntheticSource {
    pub fn new(devices: Vec<DeviceId>, rate_hz: f64) -> Self {
        let devices = if devices.is_empty() {
            vec!["00:00:00:00:00:01".to_string()]
        } else {
            devices
        };
        let rate_hz = if rate_hz.is_finite() && rate_hz > 0.0 { rate_hz } else { 100.0 };

        Self {
            devices,
            period: Duration::from_secs_f64(1.0 / rate_hz),
            subcarriers: SUBCARRIER_SLOTS,
            limit: None,
            seq: 0,
            rng: StdRng::from_entropy(),
            ticker: None,
        }
    }

    pub fn with_subcarriers(mut self, subcarriers: usize) -> Self {
        self.subcarriers = subcarriers;
        self
    }

    /// Stop after `count` samples.
    pub fn with_limit(mut self, count: u64) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    fn synthesize(&mut self) -> CsiSample {
        let device = self.devices[(self.seq % self.devices.len() as u64) as usize].clone();
        let t = self.seq as f64 * self.period.as_secs_f64();
        let breathing = 1.0 + 0.5 * (2.0 * PI * 0.25 * t).sin();

        let csi = (0..self.subcarriers)
            .map(|k| {
                let profile = 1.0 + 0.3 * (k as f64 * 0.05).cos();
                let jitter: f64 = StandardNormal.sample(&mut self.rng);
                let magnitude = (breathing * profile + 0.05 * jitter).abs();
                Complex::from_polar(magnitude, k as f64 * 0.01 + t * 0.1)
            })
            .collect();

        self.seq += 1;
        CsiSample::new(Utc::now(), device, csi)
    }
}

#[async_trait]
impl SampleSource for SyntheticSource {
    fn name(&self) -> &str {
        "synthetic"
    }

    async fn next_sample(&mut self) -> Result<Option<CsiSample>> {
        if self.limit.is_some_and(|limit| self.seq >= limit) {
            return Ok(None);
        }

        let period = self.period;
        let ticker = self.ticker.get_or_insert_with(|| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        ticker.tick().await;

        Ok(Some(self.synthesize()))
    }

    fn resumed(&mut self) {
        self.ticker = None;
    }
}

/// Replays a JSON-lines capture written by [`CaptureWriter`](crate::CaptureWriter).
///
/// With `simulate_time` the original inter-frame gaps are reproduced; otherwise
/// samples are yielded as fast as they are read.
pub struct ReplaySource {
    path: PathBuf,
    name: String,
    lines: Lines<BufReader<tokio::fs::File>>,
    simulate_time: bool,
    pending: Option<CsiSample>,
    /// Wall-clock instant matched to the capture time of the first paced sample
    anchor: Option<(Instant, f64)>,
}

impl ReplaySource {
    pub async fn open(path: impl AsRef<Path>, simulate_time: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::File::open(&path).await?;
        tracing::info!("Replaying {} (simulate time: {})", path.display(), simulate_time);

        Ok(Self {
            name: format!("replay:{}", path.display()),
            path,
            lines: BufReader::new(file).lines(),
            simulate_time,
            pending: None,
            anchor: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_next(&mut self) -> Result<Option<CsiSample>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            return serde_json::from_str(line)
                .map(Some)
                .map_err(|e| Error::Source(format!("{}: {}", self.path.display(), e)));
        }
        Ok(None)
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_sample(&mut self) -> Result<Option<CsiSample>> {
        if self.pending.is_none() {
            self.pending = self.read_next().await?;
        }
        let Some(sample) = self.pending.as_ref() else {
            return Ok(None);
        };

        if self.simulate_time {
            let ts = sample.unix_seconds();
            let (start, origin) = *self.anchor.get_or_insert((Instant::now(), ts));
            let offset = (ts - origin).max(0.0);
            tokio::time::sleep_until(start + Duration::from_secs_f64(offset)).await;
        }

        Ok(self.pending.take())
    }

    fn discard_pending(&mut self) {
        self.pending = None;
        self.anchor = None;
    }

    fn resumed(&mut self) {
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureWriter;

    fn sample(seconds: f64, device: &str) -> CsiSample {
        CsiSample::at_seconds(seconds, device, vec![Complex::new(1.0, 0.0); SUBCARRIER_SLOTS])
    }

    #[tokio::test]
    async fn test_channel_source_ends_when_senders_drop() {
        let (mut source, tx) = ChannelSource::new("nexmon", 4);
        tx.send(sample(1.0, "a")).await.unwrap();
        drop(tx);

        assert_eq!(source.next_sample().await.unwrap().unwrap().device_id, "a");
        assert!(source.next_sample().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_channel_source_discard() {
        let (mut source, tx) = ChannelSource::new("nexmon", 4);
        tx.send(sample(1.0, "a")).await.unwrap();
        tx.send(sample(2.0, "a")).await.unwrap();
        source.discard_pending();
        tx.send(sample(3.0, "b")).await.unwrap();

        assert_eq!(source.next_sample().await.unwrap().unwrap().device_id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthetic_round_robin_with_limit() {
        let devices = vec!["a".to_string(), "b".to_string()];
        let mut source = SyntheticSource::new(devices, 50.0).with_seed(7).with_limit(4);

        let mut seen = Vec::new();
        while let Some(sample) = source.next_sample().await.unwrap() {
            assert_eq!(sample.csi.len(), SUBCARRIER_SLOTS);
            assert!(sample.is_valid());
            seen.push(sample.device_id);
        }
        assert_eq!(seen, vec!["a", "b", "a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_simulates_original_timing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.jsonl");
        let mut writer = CaptureWriter::create(&path).unwrap();
        for ts in [100.0, 100.5, 101.5] {
            writer.write(&sample(ts, "a")).unwrap();
        }
        writer.flush().unwrap();

        let mut source = ReplaySource::open(&path, true).await.unwrap();
        let started = Instant::now();
        let mut count = 0;
        while source.next_sample().await.unwrap().is_some() {
            count += 1;
        }

        assert_eq!(count, 3);
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_replay_reports_corrupt_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let mut source = ReplaySource::open(&path, false).await.unwrap();
        assert!(matches!(source.next_sample().await, Err(Error::Source(_))));
        assert!(source.next_sample().await.unwrap().is_none());
    }

    #[test]
    fn test_control_reports_clear_once() {
        let control = SourceControl::new();
        let mut rx = control.subscribe();
        assert_eq!(rx.poll(), ControlUpdate::default());

        control.clear();
        assert!(rx.poll().cleared);
        assert!(!rx.poll().cleared);

        control.pause();
        assert!(rx.poll().paused);
        control.resume();
        let update = rx.poll();
        assert!(update.resumed && !update.paused);
    }
}
