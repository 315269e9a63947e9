//! Producer task feeding the store.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use wavesense_core::Result;

use crate::capture::CaptureWriter;
use crate::source::{SampleSource, SourceControl};
use crate::store::CsiStore;

/// Progress is logged every this many frames.
pub const PROGRESS_INTERVAL: u64 = 500;

/// Callback run after the store has been cleared on request.
pub type ClearHook = Box<dyn Fn() + Send + Sync>;

/// Counters of a finished (or running) reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Frames pushed into the store
    pub accepted: u64,
    /// Frames rejected by the store or unreadable at the source
    pub dropped: u64,
}

impl ReaderStats {
    pub fn total(&self) -> u64 {
        self.accepted + self.dropped
    }
}

/// Pulls samples from a [`SampleSource`] into a [`CsiStore`] until the source
/// ends or shutdown is signalled.
pub struct ReaderTask {
    source: Box<dyn SampleSource>,
    store: Arc<CsiStore>,
    control: SourceControl,
    recorder: Option<CaptureWriter>,
    on_clear: Option<ClearHook>,
    stats: ReaderStats,
}

impl ReaderTask {
    pub fn new(source: Box<dyn SampleSource>, store: Arc<CsiStore>, control: SourceControl) -> Self {
        Self {
            source,
            store,
            control,
            recorder: None,
            on_clear: None,
            stats: ReaderStats::default(),
        }
    }

    /// Save every sample pulled from the source.
    pub fn with_recorder(mut self, recorder: CaptureWriter) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_clear_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_clear = Some(Box::new(hook));
        self
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<Result<ReaderStats>> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<ReaderStats> {
        tracing::info!("Reader started on {}", self.source.name());
        let mut control = self.control.subscribe();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let update = control.poll();
            if update.cleared {
                self.source.discard_pending();
                self.store.clear();
                if let Some(hook) = &self.on_clear {
                    hook();
                }
            }
            if update.resumed {
                self.source.resumed();
            }

            if update.paused {
                tokio::select! {
                    _ = control.changed() => continue,
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }

            tokio::select! {
                next = self.source.next_sample() => match next {
                    Ok(Some(sample)) => self.ingest(sample),
                    Ok(None) => {
                        tracing::info!("Source {} ended", self.source.name());
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read from {}: {}", self.source.name(), e);
                        self.stats.dropped += 1;
                    }
                },
                _ = control.changed() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(recorder) = &mut self.recorder {
            recorder.flush()?;
            tracing::info!("Recorded {} samples to {}", recorder.written(), recorder.path().display());
        }

        tracing::info!(
            "Reader stopped: {} frames accepted, {} dropped",
            self.stats.accepted,
            self.stats.dropped
        );
        Ok(self.stats)
    }

    fn ingest(&mut self, sample: crate::sample::CsiSample) {
        if let Some(recorder) = &mut self.recorder {
            if let Err(e) = recorder.write(&sample) {
                tracing::warn!("Failed to record sample: {}", e);
            }
        }

        match self.store.push_sample(&sample) {
            Ok(()) => self.stats.accepted += 1,
            Err(_) => self.stats.dropped += 1,
        }

        if self.stats.total() % PROGRESS_INTERVAL == 0 {
            tracing::info!(
                "Reader {}: {} frames ({} dropped)",
                self.source.name(),
                self.stats.total(),
                self.stats.dropped
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use num_complex::Complex;
    use wavesense_core::SUBCARRIER_SLOTS;

    use crate::capture::read_capture;
    use crate::sample::CsiSample;
    use crate::source::ChannelSource;

    fn sample(seconds: f64, device: &str, width: usize) -> CsiSample {
        CsiSample::at_seconds(seconds, device, vec![Complex::new(1.0, 0.0); width])
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_reader_counts_accepted_and_dropped() {
        let store = Arc::new(CsiStore::default());
        let (source, tx) = ChannelSource::new("test", 8);
        let (_shutdown_tx, shutdown) = watch::channel(false);

        tx.send(sample(1.0, "a", SUBCARRIER_SLOTS)).await.unwrap();
        tx.send(sample(2.0, "a", 12)).await.unwrap();
        tx.send(sample(3.0, "b", SUBCARRIER_SLOTS)).await.unwrap();
        drop(tx);

        let stats = ReaderTask::new(Box::new(source), store.clone(), SourceControl::new())
            .run(shutdown)
            .await
            .unwrap();

        assert_eq!(stats, ReaderStats { accepted: 2, dropped: 1 });
        assert_eq!(store.devices(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_pause_holds_samples_at_source() {
        let store = Arc::new(CsiStore::default());
        let (source, tx) = ChannelSource::new("test", 8);
        let control = SourceControl::new();
        let (shutdown_tx, shutdown) = watch::channel(false);

        control.pause();
        let handle = ReaderTask::new(Box::new(source), store.clone(), control.clone()).spawn(shutdown);

        tx.send(sample(1.0, "a", SUBCARRIER_SLOTS)).await.unwrap();
        settle().await;
        assert!(store.devices().is_empty());

        control.resume();
        settle().await;
        assert_eq!(store.len_of("a"), Some(1));

        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap().unwrap();
        assert_eq!(stats.accepted, 1);
    }

    #[tokio::test]
    async fn test_clear_resets_store_and_runs_hook() {
        let store = Arc::new(CsiStore::default());
        let (source, tx) = ChannelSource::new("test", 8);
        let control = SourceControl::new();
        let (shutdown_tx, shutdown) = watch::channel(false);
        let cleared = Arc::new(AtomicUsize::new(0));

        let hook_count = cleared.clone();
        let handle = ReaderTask::new(Box::new(source), store.clone(), control.clone())
            .with_clear_hook(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            })
            .spawn(shutdown);

        tx.send(sample(1.0, "a", SUBCARRIER_SLOTS)).await.unwrap();
        settle().await;
        store.select_device("a");

        control.clear();
        settle().await;

        assert!(store.devices().is_empty());
        assert_eq!(store.selected_device(), None);
        assert_eq!(cleared.load(Ordering::SeqCst), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_recorder_captures_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.jsonl");
        let store = Arc::new(CsiStore::default());
        let (source, tx) = ChannelSource::new("test", 8);
        let (_shutdown_tx, shutdown) = watch::channel(false);

        for i in 0..3 {
            tx.send(sample(i as f64, "a", SUBCARRIER_SLOTS)).await.unwrap();
        }
        drop(tx);

        ReaderTask::new(Box::new(source), store, SourceControl::new())
            .with_recorder(CaptureWriter::create(&path).unwrap())
            .run(shutdown)
            .await
            .unwrap();

        assert_eq!(read_capture(&path).unwrap().len(), 3);
    }
}
