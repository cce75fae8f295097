//! Error types for the ingestion pipeline
//!
//! Row-level failures ([`ValidationError`], [`RemoteError`]) are counted by the
//! batch parser and never escape it. [`IngestError`] covers everything that
//! decides a whole file or the service lifecycle.

use std::path::PathBuf;
use thiserror::Error;

use crate::model::RecordField;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// A tracking record is missing one of its required fields
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(RecordField),
}

/// Failure of one remote operation
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The call kept failing until the retry budget ran out
    #[error("{operation} failed after {attempts} attempt(s){}: {message}", status_suffix(.status))]
    Transport {
        operation: &'static str,
        attempts: u32,
        status: Option<u16>,
        body: Option<String>,
        message: String,
    },

    #[error("Order with increment_id {order_number} not found")]
    NotFound { order_number: String },

    /// A successful response could not be decoded; never retried
    #[error("Failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// The request body could not be serialized; nothing was sent
    #[error("Failed to encode {operation} request: {source}")]
    Encode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status: {})", s)).unwrap_or_default()
}

/// Main error type for the ingestion pipeline
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("CSV header is missing required column(s): {}", missing.join(", "))]
    MissingColumns { missing: Vec<&'static str> },

    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error("Filesystem error on '{path}': {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Dispatch queue is closed")]
    QueueClosed,

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Common(#[from] trackport_common::CommonError),
}

impl IngestError {
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
