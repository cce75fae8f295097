//! Wiring of watcher, queue, parser and worker pool

use tracing::info;

use crate::config::Config;
use crate::dispatch::DispatchQueue;
use crate::error::Result;
use crate::parser::BatchParser;
use crate::remote::RemoteClient;
use crate::watcher::{DirectoryWatcher, WatchHandle};
use crate::worker::WorkerPool;

/// A started ingestion pipeline
pub struct Pipeline {
    watcher: WatchHandle,
    workers: WorkerPool,
}

impl Pipeline {
    /// Start with the HTTP client described by `config.remote`
    pub async fn start(config: &Config) -> Result<Self> {
        let client = RemoteClient::from_config(&config.remote)?;
        Self::start_with_client(config, client).await
    }

    /// Start with an already built remote client
    ///
    /// Workers come up before the watcher so that the startup sweep has
    /// consumers as soon as it submits.
    pub async fn start_with_client(config: &Config, client: RemoteClient) -> Result<Self> {
        let watch = &config.file_watch;
        let queue = DispatchQueue::new(watch.queue_capacity);
        let parser = BatchParser::new(client, watch.max_error_rate);

        let watcher = DirectoryWatcher::new(watch, queue.clone())?;
        let workers = WorkerPool::start(queue.clone(), parser, watch);

        let watcher = match watcher.start() {
            Ok(handle) => handle,
            Err(e) => {
                workers.stop().await;
                return Err(e);
            },
        };

        info!(
            directory = %watch.directory.display(),
            workers = workers.size(),
            "Ingestion pipeline started"
        );

        Ok(Self { watcher, workers })
    }

    /// Stop the watcher, then drain the queue and wait for the workers
    pub async fn shutdown(self) {
        info!("Shutting down ingestion pipeline");
        self.watcher.stop().await;
        self.workers.stop().await;
        info!("Ingestion pipeline stopped");
    }
}
