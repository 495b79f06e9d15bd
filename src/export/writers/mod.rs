//! Format writers for export operations
//!
//! This module provides the row-level interface that record sources stream
//! into. A writer owns the response body for the duration of one export and
//! enforces the header-once rule.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::{ExportError, Result};

use super::encoder::Cell;

pub mod csv;

pub use csv::CsvWriter;

/// UTF-8 byte-order marker prepended to every body.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Trait for writing rows to an output format
#[async_trait]
pub trait FormatWriter: Send {
    /// Write the header row. Must be called exactly once, before any row.
    async fn write_header(&mut self, columns: &[String]) -> Result<()>;

    /// Write a single data row
    async fn write_row(&mut self, row: &[Cell]) -> Result<()>;

    /// Write a batch of rows
    ///
    /// # Returns
    /// * `Result<usize>` - Number of rows written
    async fn write_batch(&mut self, rows: &[Vec<Cell>]) -> Result<usize> {
        for row in rows {
            self.write_row(row).await?;
        }
        Ok(rows.len())
    }

    /// Finalize the output (flush buffers)
    async fn finalize(&mut self) -> Result<()>;

    /// Number of data rows written so far
    fn rows_written(&self) -> u64;

    /// Number of body bytes handed to the sink so far
    fn bytes_written(&self) -> u64;
}

/// Helper function to create a buffered file writer
///
/// # Arguments
/// * `path` - File path to create
///
/// # Returns
/// * `Result<BufWriter<File>>` - Buffered writer or error
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    validate_path(path)?;
    let file = File::create(path).await.map_err(|e| {
        ExportError::OutputSinkUnavailable(format!("{}: {}", path.display(), e))
    })?;
    Ok(BufWriter::with_capacity(64 * 1024, file))
}

/// Helper function to validate file path and directory
///
/// # Arguments
/// * `path` - File path to validate
///
/// # Returns
/// * `Result<()>` - Success or error
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    // Check if parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ExportError::OutputSinkUnavailable(format!(
                "Directory does not exist: {}",
                parent.display()
            ))
            .into());
        }
    }

    Ok(())
}
