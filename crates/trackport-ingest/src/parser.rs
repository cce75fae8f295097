//! Batch file parser
//!
//! Maps the header to the four required columns, then streams rows one at a
//! time through validation and the remote sync. Row failures are counted;
//! only a missing column or an unreadable file fails the whole file early.

use csv_async::{AsyncReaderBuilder, StringRecord};
use futures::StreamExt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::model::{RecordField, TrackingRecord};
use crate::remote::{RemoteClient, SyncOutcome};

const BOM: char = '\u{feff}';

/// Row counters for one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileReport {
    /// Data rows read, malformed ones included
    pub rows: u64,
    /// Rows that failed validation, decoding or the remote update
    pub errors: u64,
    /// Rows whose order has no shipment yet
    pub skipped: u64,
    /// Rows whose tracking was appended
    pub updated: u64,
    pub elapsed: Duration,
}

impl FileReport {
    /// Fraction of rows that were errors; 0 for an empty file
    pub fn error_rate(&self) -> f64 {
        if self.rows == 0 {
            0.0
        } else {
            self.errors as f64 / self.rows as f64
        }
    }

    /// Whether the file counts as processed under `max_error_rate`
    ///
    /// No errors always succeeds, including the zero-row case; otherwise the
    /// error rate must be strictly below the threshold.
    pub fn succeeded(&self, max_error_rate: f64) -> bool {
        self.errors == 0 || (self.rows > 0 && self.error_rate() < max_error_rate)
    }
}

/// Positions of the required columns in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    order_number: usize,
    tracking_number: usize,
    carrier_code: usize,
    title: usize,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let names: Vec<&str> = headers
            .iter()
            .map(|name| name.trim_start_matches(BOM).trim())
            .collect();
        let position = |field: RecordField| names.iter().position(|n| *n == field.column());

        let missing: Vec<&'static str> = RecordField::ALL
            .into_iter()
            .filter(|field| position(*field).is_none())
            .map(RecordField::column)
            .collect();

        match (
            position(RecordField::OrderNumber),
            position(RecordField::TrackingNumber),
            position(RecordField::CarrierCode),
            position(RecordField::Title),
        ) {
            (Some(order_number), Some(tracking_number), Some(carrier_code), Some(title)) => {
                Ok(Self {
                    order_number,
                    tracking_number,
                    carrier_code,
                    title,
                })
            },
            _ => Err(IngestError::MissingColumns { missing }),
        }
    }

    fn record(&self, row: &StringRecord) -> TrackingRecord {
        let cell = |index: usize| row.get(index).unwrap_or_default();
        TrackingRecord::new(
            cell(self.order_number),
            cell(self.tracking_number),
            cell(self.carrier_code),
            cell(self.title),
        )
    }
}

/// Parses batch files and pushes each valid record to the remote service
#[derive(Clone)]
pub struct BatchParser {
    client: RemoteClient,
    max_error_rate: f64,
}

impl BatchParser {
    pub fn new(client: RemoteClient, max_error_rate: f64) -> Self {
        Self {
            client,
            max_error_rate,
        }
    }

    /// Parse `path` and report whether it should go to the processed directory
    ///
    /// File-level failures are logged and reported as `false`.
    pub async fn process(&self, path: &Path) -> bool {
        match self.parse(path).await {
            Ok(report) => {
                let success = report.succeeded(self.max_error_rate);
                info!(
                    file = %path.display(),
                    rows = report.rows,
                    errors = report.errors,
                    skipped = report.skipped,
                    updated = report.updated,
                    error_rate = %format!("{:.2}%", report.error_rate() * 100.0),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    success,
                    "Finished processing file"
                );
                success
            },
            Err(e) => {
                warn!(file = %path.display(), error = %e, "File rejected");
                false
            },
        }
    }

    /// Stream every row of `path` through validation and the remote sync
    pub async fn parse(&self, path: &Path) -> Result<FileReport> {
        let started = Instant::now();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| IngestError::filesystem(path, e))?;

        // short rows surface as blank fields and fail validation
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .create_reader(file);

        let columns = ColumnMap::from_headers(reader.headers().await?)?;
        debug!(file = %path.display(), ?columns, "Header mapped");

        let mut report = FileReport::default();
        let mut rows = reader.records();

        while let Some(next) = rows.next().await {
            report.rows += 1;
            // header is line 1
            let line = report.rows + 1;

            let row = match next {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(IngestError::Csv(e)),
                Err(e) => {
                    warn!(file = %path.display(), line, error = %e, "Malformed row");
                    report.errors += 1;
                    continue;
                },
            };

            let record = columns.record(&row);
            if let Err(e) = record.validate() {
                warn!(file = %path.display(), line, error = %e, "Invalid record");
                report.errors += 1;
                continue;
            }

            match self.client.sync_tracking(&record).await {
                Ok(SyncOutcome::Updated { .. }) => report.updated += 1,
                Ok(SyncOutcome::NoShipment { .. }) => report.skipped += 1,
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        line,
                        order_number = %record.order_number,
                        error = %e,
                        "Failed to update tracking"
                    );
                    report.errors += 1;
                },
            }
        }

        report.elapsed = started.elapsed();
        Ok(report)
    }
}
