//! CSV writer for export operations
//!
//! Encodes rows with the shared line encoder and writes each line to the
//! response body in a single `write_all`, so a row is never split across two
//! writes by this layer.

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::export::encoder::{encode_header, encode_line, Cell, CsvDocument, Delimiter};

use super::{FormatWriter, UTF8_BOM};

/// Writer for CSV format
///
/// Wraps any async byte sink (file, stdout, socket, in-memory buffer).
pub struct CsvWriter<W> {
    /// Response body
    writer: W,
    /// Active separator
    delimiter: Delimiter,
    /// Whether the header row has been written
    header_written: bool,
    /// Number of data rows written
    rows: u64,
    /// Number of bytes handed to the sink
    bytes: u64,
}

impl<W: AsyncWrite + Unpin + Send> CsvWriter<W> {
    /// Create a new CSV writer over an opened body
    pub fn new(writer: W, delimiter: Delimiter) -> Self {
        Self {
            writer,
            delimiter,
            header_written: false,
            rows: 0,
            bytes: 0,
        }
    }

    /// Write the UTF-8 byte-order marker
    ///
    /// Only valid at the very start of the body.
    pub async fn write_bom(&mut self) -> Result<()> {
        if self.bytes != 0 {
            return Err(ExportError::WriteFailed(
                "byte-order marker must start the body".to_string(),
            )
            .into());
        }
        self.write_bytes(UTF8_BOM).await
    }

    /// Write a complete in-memory document (header plus rows) in one go
    pub async fn write_document(&mut self, document: &CsvDocument) -> Result<()> {
        if self.header_written {
            return Err(ExportError::HeaderAlreadyWritten.into());
        }
        self.write_bytes(document.as_str().as_bytes()).await?;
        self.header_written = true;
        self.rows += document.row_count();
        debug!("Wrote buffered CSV document ({} rows)", document.row_count());
        Ok(())
    }

    /// Give the underlying sink back.
    pub fn into_inner(self) -> W {
        self.writer
    }

    async fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .await
            .map_err(|e| ExportError::WriteFailed(e.to_string()))?;
        self.bytes += bytes.len() as u64;
        Ok(())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FormatWriter for CsvWriter<W> {
    async fn write_header(&mut self, columns: &[String]) -> Result<()> {
        if self.header_written {
            return Err(ExportError::HeaderAlreadyWritten.into());
        }
        let line = encode_header(columns, self.delimiter);
        self.write_bytes(line.as_bytes()).await?;
        self.header_written = true;
        debug!("Wrote CSV headers: {} fields", columns.len());
        Ok(())
    }

    async fn write_row(&mut self, row: &[Cell]) -> Result<()> {
        if !self.header_written {
            return Err(ExportError::HeaderMissing.into());
        }
        let line = encode_line(row, self.delimiter);
        self.write_bytes(line.as_bytes()).await?;
        self.rows += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        self.writer
            .flush()
            .await
            .map_err(|e| ExportError::WriteFailed(format!("Failed to flush body: {}", e)))?;

        debug!("Finalized CSV body ({} rows, {} bytes)", self.rows, self.bytes);
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.rows
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}
