//! Error handling for export operations.
//!
//! This module provides:
//! - Application-specific error kinds (authorization, export, config, store)
//! - A crate-wide `Result` alias
//! - The structured halt page shown when a request is stopped
//!
//! # Example
//!
//! ```rust
//! use csv_exporter::error::{AuthError, ErrorResponse, ExporterError};
//!
//! let err: ExporterError = AuthError::InvalidToken.into();
//! let page = ErrorResponse::from_error(&err);
//! assert_eq!(page.status, 403);
//! ```

pub mod kinds;
pub mod response;

// Re-export commonly used types
pub use kinds::{AuthError, ConfigError, ExportError, ExporterError, Result, StoreError};
pub use response::ErrorResponse;
