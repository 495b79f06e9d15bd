//! Response transports
//!
//! A transport receives the [`ResponseHead`] once and hands back the body
//! sink. Opening is the point of no return: after it, the only way to report
//! a failure is to stop writing.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWrite, BufWriter, Stdout};
use tracing::debug;

use crate::error::{ExportError, Result};

use super::response::ResponseHead;
use super::writers::create_writer;

/// Sends a response head and provides the body sink.
#[async_trait]
pub trait ResponseTransport: Send {
    type Body: AsyncWrite + Unpin + Send;

    /// Emit the head and open the body. Called at most once per export.
    async fn open(&mut self, head: &ResponseHead) -> Result<Self::Body>;
}

/// Writes the attachment into a directory under its generated filename,
/// or to an explicit path.
#[derive(Debug, Clone)]
pub struct FileTransport {
    target: FileTarget,
    head: Option<ResponseHead>,
    written_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
enum FileTarget {
    Directory(PathBuf),
    File(PathBuf),
}

impl FileTransport {
    /// Save under the attachment filename inside `dir`.
    pub fn in_directory(dir: impl Into<PathBuf>) -> Self {
        Self::with_target(FileTarget::Directory(dir.into()))
    }

    /// Save to exactly `path`, ignoring the attachment filename.
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self::with_target(FileTarget::File(path.into()))
    }

    fn with_target(target: FileTarget) -> Self {
        Self {
            target,
            head: None,
            written_to: None,
        }
    }

    /// Head received by the last `open`.
    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    /// Path of the body file, once opened.
    pub fn written_to(&self) -> Option<&Path> {
        self.written_to.as_deref()
    }
}

#[async_trait]
impl ResponseTransport for FileTransport {
    type Body = BufWriter<File>;

    async fn open(&mut self, head: &ResponseHead) -> Result<Self::Body> {
        let path = match &self.target {
            FileTarget::Directory(dir) => dir.join(&head.filename),
            FileTarget::File(path) => path.clone(),
        };
        let body = create_writer(&path).await?;
        debug!("Opened {} for {}", path.display(), head.filename);
        self.head = Some(head.clone());
        self.written_to = Some(path);
        Ok(body)
    }
}

/// Writes the body to standard output; the head only goes to the log.
#[derive(Debug, Default)]
pub struct StdoutTransport {
    head: Option<ResponseHead>,
}

impl StdoutTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }
}

#[async_trait]
impl ResponseTransport for StdoutTransport {
    type Body = Stdout;

    async fn open(&mut self, head: &ResponseHead) -> Result<Self::Body> {
        for (name, value) in &head.headers {
            debug!("{}: {}", name, value);
        }
        self.head = Some(head.clone());
        Ok(tokio::io::stdout())
    }
}

/// Cloneable in-memory byte sink.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.inner
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }
}

impl AsyncWrite for SharedBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut buf = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("buffer lock poisoned"))?;
        buf.extend_from_slice(data);
        Poll::Ready(Ok(data.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Captures head and body in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    buffer: SharedBuffer,
    head: Option<ResponseHead>,
    unavailable: bool,
    opened: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose body can never be opened.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn head(&self) -> Option<&ResponseHead> {
        self.head.as_ref()
    }

    pub fn body(&self) -> Vec<u8> {
        self.buffer.contents()
    }

    /// Body as text, lossily decoded.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body()).into_owned()
    }

    /// Number of times `open` was called.
    pub fn open_count(&self) -> usize {
        self.opened
    }
}

#[async_trait]
impl ResponseTransport for MemoryTransport {
    type Body = SharedBuffer;

    async fn open(&mut self, head: &ResponseHead) -> Result<Self::Body> {
        self.opened += 1;
        if self.unavailable {
            return Err(ExportError::OutputSinkUnavailable(
                "memory transport is closed".to_string(),
            )
            .into());
        }
        self.head = Some(head.clone());
        Ok(self.buffer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tokio::io::AsyncWriteExt;

    fn head() -> ResponseHead {
        ResponseHead::csv_attachment("Users", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap())
    }

    #[tokio::test]
    async fn test_memory_transport_captures_body() {
        let mut transport = MemoryTransport::new();
        let mut body = transport.open(&head()).await.unwrap();
        body.write_all(b"ID\n1\n").await.unwrap();

        assert_eq!(transport.body_text(), "ID\n1\n");
        assert_eq!(transport.head().unwrap().filename, "users-2024-01-02.csv");
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_memory_transport() {
        let mut transport = MemoryTransport::unavailable();
        let err = transport.open(&head()).await.unwrap_err();
        assert!(err.to_string().contains("Cannot open output stream"));
        assert!(transport.head().is_none());
    }

    #[tokio::test]
    async fn test_file_transport_uses_attachment_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = FileTransport::in_directory(dir.path());
        let mut body = transport.open(&head()).await.unwrap();
        body.write_all(b"ID\n").await.unwrap();
        body.flush().await.unwrap();

        let path = dir.path().join("users-2024-01-02.csv");
        assert_eq!(transport.written_to(), Some(path.as_path()));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "ID\n");
    }

    #[tokio::test]
    async fn test_file_transport_missing_directory() {
        let mut transport = FileTransport::to_file("/no/such/dir/out.csv");
        assert!(transport.open(&head()).await.is_err());
        assert!(transport.written_to().is_none());
    }
}
