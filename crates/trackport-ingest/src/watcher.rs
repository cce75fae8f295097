//! Directory watcher
//!
//! Turns filesystem notifications in one directory into dispatch queue
//! submissions. A candidate must be a regular file whose name matches the
//! batch pattern and whose size and modification time hold still across the
//! settle delay. Files present at startup are picked up by a one-off sweep
//! that runs next to the live event loop.

use futures::future::join_all;
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use regex::Regex;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use trackport_common::fs::ensure_dir;

use crate::config::FileWatchConfig;
use crate::dispatch::DispatchQueue;
use crate::error::{IngestError, Result};

/// Size and modification time of a file at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

impl From<&Metadata> for Snapshot {
    fn from(metadata: &Metadata) -> Self {
        Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

/// Watches one directory and feeds stable batch files into a [`DispatchQueue`]
pub struct DirectoryWatcher {
    directory: PathBuf,
    pattern: Regex,
    event_grace: Duration,
    settle_delay: Duration,
    queue: Arc<DispatchQueue>,
}

impl DirectoryWatcher {
    pub fn new(config: &FileWatchConfig, queue: Arc<DispatchQueue>) -> Result<Self> {
        Ok(Self {
            directory: config.directory.clone(),
            pattern: config.pattern()?,
            event_grace: config.event_grace(),
            settle_delay: config.settle_delay(),
            queue,
        })
    }

    /// Start the live event loop and the startup sweep
    ///
    /// Creates the directory when it does not exist. Failing to register the
    /// OS watch is fatal.
    pub fn start(self) -> Result<WatchHandle> {
        ensure_dir(&self.directory)?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            // receiver gone means the watcher is shutting down
            let _ = events_tx.send(event);
        })?;
        watcher.watch(&self.directory, RecursiveMode::NonRecursive)?;

        info!(
            directory = %self.directory.display(),
            pattern = %self.pattern,
            "Watching directory"
        );

        let cancel = CancellationToken::new();
        let this = Arc::new(self);

        let event_loop = {
            let this = this.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { this.run_events(events_rx, cancel).await })
        };

        let sweep = {
            let cancel = cancel.clone();
            tokio::spawn(async move { this.sweep(cancel).await })
        };

        Ok(WatchHandle {
            cancel,
            watcher: Some(watcher),
            tasks: vec![event_loop, sweep],
        })
    }

    async fn run_events(
        &self,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        cancel: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                None => {
                    debug!("Notification channel closed");
                    break;
                },
                Some(Err(e)) => warn!(error = %e, "File watch error"),
                Some(Ok(event)) => {
                    if !is_relevant(&event.kind) {
                        continue;
                    }
                    for path in &event.paths {
                        if let Err(IngestError::QueueClosed) =
                            self.consider(path, self.event_grace).await
                        {
                            debug!("Dispatch queue closed, ending event loop");
                            return;
                        }
                    }
                },
            }
        }

        debug!("Event loop stopped");
    }

    /// Submit every matching file already present in the directory
    async fn sweep(&self, cancel: CancellationToken) {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(directory = %self.directory.display(), error = %e, "Startup sweep failed");
                return;
            },
        };

        let mut found = 0usize;
        loop {
            if cancel.is_cancelled() {
                break;
            }

            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Failed to read directory entry during sweep");
                    break;
                },
            };

            // sweep entries are not reacting to a fresh event, so no grace wait
            match self.consider(&entry.path(), Duration::ZERO).await {
                Ok(true) => found += 1,
                Ok(false) => {},
                Err(IngestError::QueueClosed) => break,
                Err(e) => warn!(file = %entry.path().display(), error = %e, "Sweep skipped file"),
            }
        }

        info!(files = found, "Startup sweep finished");
    }

    /// Run the candidate checks on `path` and submit it when they pass
    ///
    /// Paths already in the ledger are dropped before any waiting. Returns
    /// whether the path was newly queued.
    async fn consider(&self, path: &Path, grace: Duration) -> Result<bool> {
        if !self.matches_name(path) || self.queue.contains(path).await {
            return Ok(false);
        }

        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }

        if !is_regular_file(path).await {
            return Ok(false);
        }

        if !self.is_stable(path).await {
            debug!(file = %path.display(), "File still changing, waiting for a later event");
            return Ok(false);
        }

        self.queue.submit(path).await
    }

    fn matches_name(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.pattern.is_match(name))
    }

    /// Two stats one settle delay apart must agree on size and modification time
    async fn is_stable(&self, path: &Path) -> bool {
        let Some(first) = snapshot(path).await else {
            return false;
        };
        tokio::time::sleep(self.settle_delay).await;
        let Some(second) = snapshot(path).await else {
            return false;
        };
        first == second
    }
}

/// Notifications that may mean a batch file has appeared or finished writing
fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Both))
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

/// Regular file, following symlinks
async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}

async fn snapshot(path: &Path) -> Option<Snapshot> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .map(|metadata| Snapshot::from(&metadata))
}

/// Running watcher; [`stop`](Self::stop) ends both activities
pub struct WatchHandle {
    cancel: CancellationToken,
    watcher: Option<RecommendedWatcher>,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchHandle {
    /// Stop watching and wait for the event loop and sweep to finish
    pub async fn stop(mut self) {
        self.cancel.cancel();
        // dropping the watcher releases the OS watch and closes the channel
        self.watcher.take();

        for result in join_all(std::mem::take(&mut self.tasks)).await {
            if let Err(e) = result {
                error!(error = %e, "Watcher task panicked");
            }
        }

        info!("Directory watcher stopped");
    }
}
