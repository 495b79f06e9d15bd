//! Export job for one request against one exporter
//!
//! The job runs the authorization gate, resolves the output mode from the
//! export settings and drives either the buffered or the streamed path:
//!
//! ```text
//! Idle -> Authorizing -> FilterResolution -> Buffering | Streaming -> Completed
//!                  \______________________________________________/
//!                                      Aborted
//! ```
//!
//! A denied request aborts before any record is read and before the response
//! head is sent. In buffered mode every record is read before the head is
//! sent; in streamed mode the head and the header row go out first.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::auth::{AuthorizationGate, GateDecision};
use crate::error::Result;
use crate::request::ExportRequest;
use crate::sources::{Described, Exporter};

use super::encoder::{CsvDocument, Delimiter};
use super::response::ResponseHead;
use super::transport::ResponseTransport;
use super::writers::{CsvWriter, FormatWriter};

/// Output settings in effect for an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSettings {
    pub delimiter: Delimiter,
    /// Stream rows as they are produced instead of buffering the document.
    pub streaming: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            delimiter: Delimiter::default(),
            streaming: true,
        }
    }
}

/// Output strategy actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    Buffered,
    Streamed,
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportMode::Buffered => write!(f, "buffered"),
            ExportMode::Streamed => write!(f, "streamed"),
        }
    }
}

/// Lifecycle of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Authorizing,
    FilterResolution,
    Buffering,
    Streaming,
    Completed,
    Aborted,
}

/// Statistics of a finished export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub exporter_id: String,
    pub mode: ExportMode,
    /// Data rows written, header excluded
    pub rows: u64,
    /// Body bytes, byte-order marker included
    pub bytes: u64,
    pub filename: String,
    pub elapsed_ms: u64,
}

/// What a job did with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The request was for another exporter, or not an export at all.
    NotAddressed,
    Completed(ExportSummary),
}

/// One export request handled by one exporter
pub struct ExportJob<'a> {
    exporter: &'a dyn Exporter,
    gate: &'a AuthorizationGate,
    settings: ExportSettings,
    state: JobState,
}

impl<'a> ExportJob<'a> {
    pub fn new(exporter: &'a dyn Exporter, gate: &'a AuthorizationGate, settings: ExportSettings) -> Self {
        Self {
            exporter,
            gate,
            settings,
            state: JobState::Idle,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    fn transition(&mut self, next: JobState) {
        debug!(
            "[{}] {:?} -> {:?}",
            self.exporter.descriptor().id,
            self.state,
            next
        );
        self.state = next;
    }

    /// Handle a request
    ///
    /// # Arguments
    /// * `request` - Inbound request
    /// * `transport` - Where the response head and body go
    /// * `now` - Request time, for the token window and the filename date
    ///
    /// # Returns
    /// * `Result<ExportOutcome>` - Outcome, or the error that aborted the job
    pub async fn run<T: ResponseTransport>(
        &mut self,
        request: &ExportRequest,
        transport: &mut T,
        now: DateTime<Utc>,
    ) -> Result<ExportOutcome> {
        let result = self.execute(request, transport, now).await;
        if let Err(e) = &result {
            warn!("[{}] Export aborted: {}", self.exporter.descriptor().id, e);
            self.transition(JobState::Aborted);
        }
        result
    }

    async fn execute<T: ResponseTransport>(
        &mut self,
        request: &ExportRequest,
        transport: &mut T,
        now: DateTime<Utc>,
    ) -> Result<ExportOutcome> {
        let start = Instant::now();
        let exporter = self.exporter;
        let descriptor = exporter.descriptor();

        self.transition(JobState::Authorizing);
        let now_secs = u64::try_from(now.timestamp()).unwrap_or(0);
        let decision =
            self.gate
                .authorize(request, &descriptor.id, &descriptor.capability, now_secs)?;
        if decision == GateDecision::NotAddressed {
            self.transition(JobState::Aborted);
            return Ok(ExportOutcome::NotAddressed);
        }

        self.transition(JobState::FilterResolution);
        let filters = &request.filters;
        debug!(
            "[{}] Filters: {:?}",
            descriptor.id,
            filters.keys().collect::<Vec<_>>()
        );
        let head = ResponseHead::csv_attachment(&descriptor.title, now.date_naive());
        let delimiter = self.settings.delimiter;

        let mode = if self.settings.streaming && exporter.supports_streaming() {
            ExportMode::Streamed
        } else {
            ExportMode::Buffered
        };

        let (rows, bytes) = match mode {
            ExportMode::Streamed => {
                self.transition(JobState::Streaming);
                let body = transport.open(&head).await?;
                let mut writer = CsvWriter::new(body, delimiter);
                writer.write_bom().await?;
                let rows = exporter.stream_rows(filters, &mut writer).await?;
                writer.finalize().await?;
                (rows, writer.bytes_written())
            }
            ExportMode::Buffered => {
                self.transition(JobState::Buffering);
                let records = exporter.fetch_rows(filters).await?;
                let mut document = CsvDocument::new(&descriptor.columns, delimiter);
                for row in &records {
                    document.push_row(row);
                }

                let body = transport.open(&head).await?;
                let mut writer = CsvWriter::new(body, delimiter);
                writer.write_bom().await?;
                writer.write_document(&document).await?;
                writer.finalize().await?;
                (writer.rows_written(), writer.bytes_written())
            }
        };

        self.transition(JobState::Completed);
        let summary = ExportSummary {
            exporter_id: descriptor.id.clone(),
            mode,
            rows,
            bytes,
            filename: head.filename,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "[{}] Exported {} rows ({} bytes, {}) as {} in {}ms",
            summary.exporter_id,
            summary.rows,
            summary.bytes,
            summary.mode,
            summary.filename,
            summary.elapsed_ms
        );
        Ok(ExportOutcome::Completed(summary))
    }
}
