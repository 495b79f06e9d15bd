//! CSV export pipeline
//!
//! This module turns an authorized export request into a CSV download:
//! - Pure line encoding with delimiter-aware quoting
//! - Buffered or streamed output, chosen by the export settings
//! - A response head with attachment filename and no-cache headers
//! - Progress logging for long exports
//!
//! # Architecture
//!
//! 1. **Exporter** (see [`crate::sources`]): fetches and projects records
//! 2. **FormatWriter**: encodes rows onto the response body, header once
//! 3. **ResponseTransport**: receives the head and provides the body
//!
//! These are orchestrated by the **ExportJob**, which also runs the
//! authorization gate before anything is read.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use csv_exporter::auth::{AuthorizationGate, Caller, TokenAuthority};
//! use csv_exporter::export::{ExportJob, ExportSettings, MemoryTransport};
//! use csv_exporter::request::ExportRequest;
//! use csv_exporter::sources::UsersExporter;
//! use csv_exporter::store::FixtureStore;
//!
//! # async fn demo() -> csv_exporter::error::Result<()> {
//! let exporter = UsersExporter::new(Arc::new(FixtureStore::default()));
//! let gate = AuthorizationGate::new(TokenAuthority::new("secret", 86_400));
//! let caller = Caller::new(1, "session").with_capability("list_users");
//! let now = chrono::Utc::now();
//! let token = gate.issue_token(&caller, "users", now.timestamp() as u64);
//! let request = ExportRequest::from_query(
//!     &format!("action=export_csv&exporter_id=users&_token={token}"),
//!     caller,
//! );
//!
//! let mut transport = MemoryTransport::new();
//! let mut job = ExportJob::new(&exporter, &gate, ExportSettings::default());
//! job.run(&request, &mut transport, now).await?;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod encoder;
pub mod progress;
pub mod response;
pub mod streaming;
pub mod transport;
pub mod writers;

pub use coordinator::{ExportJob, ExportMode, ExportOutcome, ExportSettings, ExportSummary, JobState};
pub use encoder::{Cell, CsvDocument, Delimiter, Row};
pub use progress::ProgressTracker;
pub use response::ResponseHead;
pub use streaming::RecordStream;
pub use transport::{FileTransport, MemoryTransport, ResponseTransport, StdoutTransport};
pub use writers::{CsvWriter, FormatWriter};
