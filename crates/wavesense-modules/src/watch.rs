//! Change detection for module manifests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::registry::is_manifest;

/// Changes to one path closer together than this are coalesced.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Per-path rate limiter for change notifications.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn admit(&mut self, path: &Path) -> bool {
        self.admit_at(path, Instant::now())
    }

    /// Whether a change observed at `now` should be dispatched.
    ///
    /// Measured against the last *admitted* change of the same path.
    pub fn admit_at(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(previous) = self.last.get(path) {
            if now.saturating_duration_since(*previous) < self.window {
                return false;
            }
        }
        self.last.insert(path.to_path_buf(), now);
        true
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

/// Polling watcher over one or more manifest directories.
///
/// Reports manifests that were created, modified or removed since the
/// previous poll.
#[derive(Debug)]
pub struct ManifestWatcher {
    roots: Vec<PathBuf>,
    snapshot: HashMap<PathBuf, SystemTime>,
    debouncer: Debouncer,
}

impl ManifestWatcher {
    /// Start watching; files present now are the baseline.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut watcher = Self {
            roots: roots.into_iter().map(Into::into).collect(),
            snapshot: HashMap::new(),
            debouncer: Debouncer::default(),
        };
        watcher.snapshot = watcher.scan();
        watcher
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debouncer = Debouncer::new(window);
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn poll(&mut self) -> Vec<PathBuf> {
        self.poll_at(Instant::now())
    }

    /// Diff the tree against the previous scan and debounce the result.
    pub fn poll_at(&mut self, now: Instant) -> Vec<PathBuf> {
        let current = self.scan();

        let mut changed: Vec<PathBuf> = current
            .iter()
            .filter(|(path, modified)| self.snapshot.get(*path) != Some(*modified))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            self.snapshot
                .keys()
                .filter(|path| !current.contains_key(*path))
                .cloned(),
        );
        changed.sort();

        self.snapshot = current;
        changed.retain(|path| {
            let admitted = self.debouncer.admit_at(path, now);
            if !admitted {
                tracing::debug!("Debounced change to {}", path.display());
            }
            admitted
        });
        changed
    }

    /// Poll every `interval` and forward changes until the receiver is dropped.
    pub fn spawn(mut self, interval: Duration, tx: mpsc::Sender<PathBuf>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                for path in self.poll() {
                    tracing::debug!("Manifest changed: {}", path.display());
                    if tx.send(path).await.is_err() {
                        return;
                    }
                }
            }
        })
    }

    fn scan(&self) -> HashMap<PathBuf, SystemTime> {
        let mut files = HashMap::new();
        for root in &self.roots {
            for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
                if !entry.file_type().is_file() || !is_manifest(entry.path()) {
                    continue;
                }
                let modified = entry
                    .metadata()
                    .ok()
                    .and_then(|m| m.modified().ok())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                files.insert(entry.path().to_path_buf(), modified);
            }
        }
        files
    }
}
