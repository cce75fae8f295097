//! Deduplicating dispatch queue
//!
//! Sits between the watcher (producers) and the worker pool (consumers).
//! Each path is accepted at most once per process lifetime, keyed by its
//! canonical form; the bounded channel blocks producers when workers fall
//! behind.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::error::{IngestError, Result};

struct Ledger {
    seen: HashSet<PathBuf>,
    sender: Option<mpsc::Sender<PathBuf>>,
}

/// Bounded work queue with a process-lifetime ledger of submitted paths
pub struct DispatchQueue {
    ledger: Mutex<Ledger>,
    receiver: Mutex<mpsc::Receiver<PathBuf>>,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Arc::new(Self {
            ledger: Mutex::new(Ledger {
                seen: HashSet::new(),
                sender: Some(sender),
            }),
            receiver: Mutex::new(receiver),
        })
    }

    /// Enqueue `path` unless it was submitted before
    ///
    /// Returns `Ok(false)` for a duplicate. Waits while the queue is full.
    /// Fails with [`IngestError::QueueClosed`] once [`close`](Self::close)
    /// has been called.
    pub async fn submit(&self, path: &Path) -> Result<bool> {
        let key = ledger_key(path).await;

        let sender = {
            let mut ledger = self.ledger.lock().await;
            let sender = ledger.sender.clone().ok_or(IngestError::QueueClosed)?;
            if !ledger.seen.insert(key.clone()) {
                debug!(file = %key.display(), "Already dispatched, ignoring");
                return Ok(false);
            }
            sender
        };

        sender
            .send(key.clone())
            .await
            .map_err(|_| IngestError::QueueClosed)?;

        debug!(file = %key.display(), "File queued");
        Ok(true)
    }

    /// Next queued path; `None` once the queue is closed and drained
    ///
    /// Safe to call from several workers; each path is handed to exactly one.
    pub async fn next(&self) -> Option<PathBuf> {
        self.receiver.lock().await.recv().await
    }

    /// Stop accepting submissions; already queued paths are still delivered
    pub async fn close(&self) {
        self.ledger.lock().await.sender.take();
    }

    /// Whether `path` was already accepted
    pub async fn contains(&self, path: &Path) -> bool {
        let key = ledger_key(path).await;
        self.ledger.lock().await.seen.contains(&key)
    }

    /// Number of distinct paths accepted so far
    pub async fn dispatched(&self) -> usize {
        self.ledger.lock().await.seen.len()
    }
}

/// Canonical path when the file exists, otherwise the absolute path
///
/// Two spellings of the same file (`./in/a.csv`, `in/../in/a.csv`) map to the
/// same key as long as the file is still present.
async fn ledger_key(path: &Path) -> PathBuf {
    match tokio::fs::canonicalize(path).await {
        Ok(canonical) => canonical,
        Err(_) => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}
