use std::{fmt, io};

/// Crate-wide `Result` type using [`ExporterError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Top-level error type for export operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum ExporterError {
    /// Authorization gate denials.
    Auth(AuthError),

    /// Export pipeline errors.
    Export(ExportError),

    /// Configuration errors.
    Config(ConfigError),

    /// Record store errors.
    Store(StoreError),

    /// I/O errors.
    Io(io::Error),

    /// JSON (de)serialization errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Authorization failures. Both are fatal for the whole request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Anti-forgery token missing, expired or bound to another scope.
    InvalidToken,

    /// Caller lacks the permission mapped to the entity kind.
    Forbidden { capability: String },
}

/// Export pipeline errors.
#[derive(Debug)]
pub enum ExportError {
    /// An exporter is missing its identity or title, or its id is taken.
    MisconfiguredExporter(String),

    /// The response body could not be opened.
    OutputSinkUnavailable(String),

    /// A second header row was offered to a writer.
    HeaderAlreadyWritten,

    /// A data row was offered before the header row.
    HeaderMissing,

    /// Writing to an already opened sink failed.
    WriteFailed(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Invalid config format.
    InvalidFormat(String),

    /// Missing required field.
    MissingField(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/// Errors raised by the record stores behind the adapters.
#[derive(Debug)]
pub enum StoreError {
    /// The store could not be reached or loaded.
    Unavailable(String),

    /// The store returned data that does not fit the record shape.
    InvalidData(String),
}

impl ExporterError {
    /// Whether this is an authorization gate denial.
    pub fn is_authorization(&self) -> bool {
        matches!(self, ExporterError::Auth(_))
    }

    /// Message shown to the administrator when the request is halted.
    pub fn user_message(&self) -> String {
        match self {
            ExporterError::Auth(AuthError::InvalidToken) => "Action not authorized.".to_string(),
            ExporterError::Auth(AuthError::Forbidden { .. }) => {
                "You do not have sufficient rights to export.".to_string()
            }
            ExporterError::Export(ExportError::OutputSinkUnavailable(_)) => {
                "Cannot open output stream.".to_string()
            }
            ExporterError::Export(ExportError::MisconfiguredExporter(_)) => {
                "The exporter must define an ID and a title.".to_string()
            }
            other => format!("Export failed: {other}"),
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExporterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExporterError::Auth(e) => write!(f, "Authorization error: {e}"),
            ExporterError::Export(e) => write!(f, "Export error: {e}"),
            ExporterError::Config(e) => write!(f, "Configuration error: {e}"),
            ExporterError::Store(e) => write!(f, "Store error: {e}"),
            ExporterError::Io(e) => write!(f, "I/O error: {e}"),
            ExporterError::Json(e) => write!(f, "JSON error: {e}"),
            ExporterError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidToken => write!(f, "missing or invalid anti-forgery token"),
            AuthError::Forbidden { capability } => {
                write!(f, "caller lacks the '{capability}' permission")
            }
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::MisconfiguredExporter(msg) => write!(f, "Misconfigured exporter: {msg}"),
            ExportError::OutputSinkUnavailable(msg) => {
                write!(f, "Cannot open output stream: {msg}")
            }
            ExportError::HeaderAlreadyWritten => write!(f, "Header row already written"),
            ExportError::HeaderMissing => write!(f, "Data row written before the header row"),
            ExportError::WriteFailed(msg) => write!(f, "Write failed: {msg}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::MissingField(field) => write!(f, "Missing required field: {field}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
            StoreError::InvalidData(msg) => write!(f, "Invalid store data: {msg}"),
        }
    }
}

impl std::error::Error for ExporterError {}
impl std::error::Error for AuthError {}
impl std::error::Error for ExportError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for StoreError {}

/* ========================= Conversions to ExporterError ========================= */

impl From<io::Error> for ExporterError {
    fn from(err: io::Error) -> Self {
        ExporterError::Io(err)
    }
}

impl From<serde_json::Error> for ExporterError {
    fn from(err: serde_json::Error) -> Self {
        ExporterError::Json(err)
    }
}

impl From<AuthError> for ExporterError {
    fn from(err: AuthError) -> Self {
        ExporterError::Auth(err)
    }
}

impl From<ExportError> for ExporterError {
    fn from(err: ExportError) -> Self {
        ExporterError::Export(err)
    }
}

impl From<ConfigError> for ExporterError {
    fn from(err: ConfigError) -> Self {
        ExporterError::Config(err)
    }
}

impl From<StoreError> for ExporterError {
    fn from(err: StoreError) -> Self {
        ExporterError::Store(err)
    }
}

impl From<String> for ExporterError {
    fn from(msg: String) -> Self {
        ExporterError::Generic(msg)
    }
}

impl From<&str> for ExporterError {
    fn from(msg: &str) -> Self {
        ExporterError::Generic(msg.to_owned())
    }
}
