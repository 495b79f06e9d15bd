//! CSV Exporter Library
//!
//! Exports tabular records (users, products, product categories, orders) from
//! a record store into CSV, under an authorization gate, with buffered or
//! streamed output.
//!
//! # Modules
//!
//! - `auth`: Anti-forgery tokens and the authorization gate
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `error`: Error types and the user-facing halt response
//! - `export`: CSV encoding, writers, transports and the export job
//! - `registry`: Exporter registration, dispatch and trigger links
//! - `request`: Request parsing and filter sanitization
//! - `sources`: Per-entity record source adapters
//! - `store`: Record store read interfaces and a JSON-backed store
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use csv_exporter::auth::{AuthorizationGate, Caller, TokenAuthority};
//! use csv_exporter::export::{ExportSettings, MemoryTransport};
//! use csv_exporter::registry::ExportRegistry;
//! use csv_exporter::request::ExportRequest;
//! use csv_exporter::store::FixtureStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FixtureStore::load("store.json".as_ref()).await?;
//!     let registry = ExportRegistry::with_store(Arc::new(store), true)?;
//!     let gate = AuthorizationGate::new(TokenAuthority::new("secret", 86_400));
//!
//!     let caller = Caller::new(1, "session").with_capability("edit_products");
//!     let token = gate.issue_token(&caller, "products", csv_exporter::utils::time::now_secs());
//!     let request = ExportRequest::from_query(
//!         &format!("action=export_csv&exporter_id=products&product_cat=tools&_token={token}"),
//!         caller,
//!     );
//!
//!     let mut transport = MemoryTransport::new();
//!     registry
//!         .dispatch(&request, &gate, ExportSettings::default(), &mut transport, chrono::Utc::now())
//!         .await?;
//!     print!("{}", transport.body_text());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod registry;
pub mod request;
pub mod sources;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExporterError, Result};
pub use export::{ExportJob, ExportOutcome, ExportSettings};
pub use registry::ExportRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
