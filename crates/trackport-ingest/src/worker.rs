//! Worker pool draining the dispatch queue
//!
//! Each worker takes one file at a time, runs the batch parser on it and
//! moves the file to the processed or failed directory under its original
//! name.

use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trackport_common::fs::ensure_dir;

use crate::config::FileWatchConfig;
use crate::dispatch::DispatchQueue;
use crate::error::{IngestError, Result};
use crate::parser::BatchParser;

/// Where finished files go
#[derive(Debug, Clone)]
struct Destinations {
    processed: PathBuf,
    failed: PathBuf,
}

/// Fixed set of workers sharing one dispatch queue
pub struct WorkerPool {
    queue: Arc<DispatchQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create the destination directories and spawn `config.max_concurrency` workers
    ///
    /// A destination directory that cannot be created is logged; the files
    /// that would land there stay in place instead.
    pub fn start(queue: Arc<DispatchQueue>, parser: BatchParser, config: &FileWatchConfig) -> Self {
        for dir in [&config.processed_dir, &config.failed_dir] {
            if let Err(e) = ensure_dir(dir) {
                error!(dir = %dir.display(), error = %e, "Failed to create destination directory");
            }
        }

        let destinations = Destinations {
            processed: config.processed_dir.clone(),
            failed: config.failed_dir.clone(),
        };
        let deadline = config.file_process_timeout();
        let count = config.max_concurrency.max(1);

        let workers = (0..count)
            .map(|worker_id| {
                let queue = queue.clone();
                let parser = parser.clone();
                let destinations = destinations.clone();
                tokio::spawn(async move {
                    run_worker(worker_id, queue, parser, destinations, deadline).await;
                })
            })
            .collect();

        info!(workers = count, "Worker pool started");
        Self { queue, workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Close the queue and wait until every worker has drained it
    ///
    /// Files already queued or in progress are finished first.
    pub async fn stop(self) {
        self.queue.close().await;

        for result in join_all(self.workers).await {
            if let Err(e) = result {
                error!(error = %e, "Worker task panicked");
            }
        }

        info!("Worker pool stopped");
    }
}

async fn run_worker(
    worker_id: usize,
    queue: Arc<DispatchQueue>,
    parser: BatchParser,
    destinations: Destinations,
    deadline: Option<Duration>,
) {
    debug!(worker_id, "Worker started");

    while let Some(path) = queue.next().await {
        info!(worker_id, file = %path.display(), "Processing file");

        let success = match deadline {
            Some(limit) => match tokio::time::timeout(limit, parser.process(&path)).await {
                Ok(success) => success,
                Err(_) => {
                    warn!(
                        worker_id,
                        file = %path.display(),
                        timeout_secs = limit.as_secs(),
                        "File processing timed out"
                    );
                    false
                },
            },
            None => parser.process(&path).await,
        };

        let target_dir = if success {
            &destinations.processed
        } else {
            &destinations.failed
        };

        match relocate(&path, target_dir).await {
            Ok(target) => info!(
                worker_id,
                file = %path.display(),
                target = %target.display(),
                success,
                "File moved"
            ),
            Err(e) => error!(
                worker_id,
                file = %path.display(),
                error = %e,
                "Failed to move file, leaving it in place"
            ),
        }
    }

    debug!(worker_id, "Worker stopped");
}

/// Move `path` into `dir`, keeping its file name
async fn relocate(path: &Path, dir: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        IngestError::filesystem(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        )
    })?;
    let target = dir.join(name);

    tokio::fs::rename(path, &target)
        .await
        .map_err(|e| IngestError::filesystem(&target, e))?;

    Ok(target)
}
