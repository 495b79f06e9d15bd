use serde::{Deserialize, Serialize};

use super::kinds::{AuthError, ExportError, ExporterError};

/// The blocking page shown when an export request is halted.
///
/// Serialized to JSON for logging and for embedding hosts that render their
/// own error screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP-like status code of the halt.
    pub status: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    /// End-user message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    /// Build the halt page for an error that reached the job boundary.
    pub fn from_error(error: &ExporterError) -> Self {
        let (status, error_type) = match error {
            ExporterError::Auth(AuthError::InvalidToken) => (403, "auth.invalid_token"),
            ExporterError::Auth(AuthError::Forbidden { .. }) => (403, "auth.forbidden"),
            ExporterError::Export(ExportError::OutputSinkUnavailable(_)) => {
                (500, "export.output_unavailable")
            }
            ExporterError::Export(ExportError::MisconfiguredExporter(_)) => {
                (500, "export.misconfigured")
            }
            ExporterError::Export(_) => (500, "export.failed"),
            ExporterError::Config(_) => (500, "config"),
            ExporterError::Store(_) => (500, "store"),
            ExporterError::Io(_) | ExporterError::Json(_) | ExporterError::Generic(_) => {
                (500, "internal")
            }
        };

        // Auth denials never echo internals back to the browser.
        let detail = if error.is_authorization() {
            None
        } else {
            Some(error.to_string())
        };

        Self {
            status,
            error_type: error_type.to_string(),
            message: error.user_message(),
            detail,
        }
    }

    /// Convert to pretty-printed JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Convert to compact JSON string (single line).
    pub fn to_json_compact(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
