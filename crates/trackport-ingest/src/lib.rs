//! Trackport ingestion library
//!
//! Watches a drop directory for shipment-tracking batch files and pushes each
//! record to the remote order service.
//!
//! # Pipeline
//!
//! ```text
//! DirectoryWatcher ──▶ DispatchQueue ──▶ WorkerPool ──▶ BatchParser ──▶ RemoteClient
//!  (events + sweep)     (dedup, bounded)   (N workers)    (per row)      (retry/backoff)
//!                                               │
//!                                               └──▶ processed/ or failed/
//! ```
//!
//! # Example
//!
//! ```no_run
//! use trackport_ingest::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let pipeline = Pipeline::start(&config).await?;
//!     tokio::signal::ctrl_c().await?;
//!     pipeline.shutdown().await;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod remote;
pub mod watcher;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::{Config, FileWatchConfig, RemoteConfig};
pub use dispatch::DispatchQueue;
pub use error::{IngestError, RemoteError, Result, ValidationError};
pub use model::{RecordField, TrackingRecord};
pub use parser::{BatchParser, FileReport};
pub use pipeline::Pipeline;
pub use remote::{RemoteClient, SyncOutcome};
pub use watcher::{DirectoryWatcher, WatchHandle};
pub use worker::WorkerPool;
