//! Configuration management for csv-exporter
//!
//! This module handles loading, creating and updating the TOML configuration:
//! - Export settings (delimiter, streaming flag)
//! - Anti-forgery token secret and lifetime
//! - Record store location and commerce switch
//! - Logging
//!
//! The export settings are persisted as plain strings, the way a settings
//! form submits them. They are coerced to allowed values when saved and
//! checked again when an export resolves them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use toml_edit::{table, value, DocumentMut};
use tracing::{info, warn};

use crate::error::{ConfigError, Result};
use crate::export::{Delimiter, ExportSettings};

/// Persisted value of an enabled streaming flag.
pub const STREAMING_YES: &str = "yes";

/// Persisted value of a disabled streaming flag.
pub const STREAMING_NO: &str = "no";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export output settings
    #[serde(default)]
    pub export: ExportConfig,

    /// Token settings
    #[serde(default)]
    pub security: SecurityConfig,

    /// Record store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Persisted export settings, as submitted by the settings form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Field separator: `,`, `;` or a tab
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// `yes` to stream rows, `no` to buffer the whole document
    #[serde(default = "default_streaming")]
    pub streaming: String,
}

/// Anti-forgery token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Site secret tokens are keyed with
    #[serde(default)]
    pub token_secret: String,

    /// Token lifetime in seconds
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON document holding the records
    #[serde(default)]
    pub data_file: Option<PathBuf>,

    /// Whether the commerce subsystem (orders) is active
    #[serde(default = "default_commerce_enabled")]
    pub commerce_enabled: bool,

    /// Admin base URL trigger links point at
    #[serde(default = "default_admin_url")]
    pub admin_url: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_delimiter() -> String {
    Delimiter::default().as_setting().to_string()
}

fn default_streaming() -> String {
    STREAMING_YES.to_string()
}

fn default_token_lifetime() -> u64 {
    86_400
}

fn default_commerce_enabled() -> bool {
    true
}

fn default_admin_url() -> String {
    "http://localhost/wp-admin".to_string()
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            streaming: default_streaming(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            commerce_enabled: default_commerce_enabled(),
            admin_url: default_admin_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

/// Parse a persisted streaming flag; `None` for anything but `yes`/`no`.
pub fn parse_streaming(value: &str) -> Option<bool> {
    match value {
        STREAMING_YES => Some(true),
        STREAMING_NO => Some(false),
        _ => None,
    }
}

impl ExportConfig {
    /// Coerce submitted values to allowed ones
    ///
    /// Anything outside the allowed set becomes the default.
    pub fn coerced(delimiter: &str, streaming: &str) -> Self {
        let delimiter = Delimiter::from_setting(delimiter).unwrap_or_else(|| {
            warn!("Invalid delimiter {:?}, using default", delimiter);
            Delimiter::default()
        });
        let streaming = parse_streaming(streaming).unwrap_or_else(|| {
            warn!("Invalid streaming flag {:?}, using default", streaming);
            true
        });

        Self {
            delimiter: delimiter.as_setting().to_string(),
            streaming: if streaming { STREAMING_YES } else { STREAMING_NO }.to_string(),
        }
    }

    /// Settings an export job runs with
    ///
    /// Values edited outside the settings form are checked again here and
    /// fall back to the defaults.
    pub fn resolve(&self) -> ExportSettings {
        let delimiter = Delimiter::from_setting(&self.delimiter).unwrap_or_else(|| {
            warn!(
                "Persisted delimiter {:?} is not allowed, using default",
                self.delimiter
            );
            Delimiter::default()
        });
        let streaming = parse_streaming(&self.streaming).unwrap_or_else(|| {
            warn!(
                "Persisted streaming flag {:?} is not allowed, using default",
                self.streaming
            );
            true
        });

        ExportSettings {
            delimiter,
            streaming,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with a freshly generated token secret
    pub fn generate() -> Self {
        let mut config = Self::default();
        config.security.token_secret = uuid::Uuid::new_v4().simple().to_string();
        config
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration from a file, creating it with defaults if missing
    ///
    /// # Arguments
    /// * `path` - Configuration file, or `None` for the default location
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_config_path);

        if !path.exists() {
            let config = Self::generate();
            config.save(&path)?;
            info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let text = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&text)
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - `~/.csv-exporter/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".csv-exporter")
            .join("config.toml")
    }

    /// Save configuration to a file, creating parent directories
    ///
    /// # Arguments
    /// * `path` - Path where to save the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text =
            toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Render the configuration for display, secret masked
    pub fn to_toml_with_comments(&self) -> Result<String> {
        let mut shown = self.clone();
        if !shown.security.token_secret.is_empty() {
            shown.security.token_secret = "********".to_string();
        }
        let body =
            toml::to_string_pretty(&shown).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        Ok(format!(
            "# csv-exporter configuration\n# delimiter: \",\" | \";\" | \"\\t\"; streaming: \"yes\" | \"no\"\n\n{}",
            body
        ))
    }

    /// Validate logical constraints
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.security.token_secret.trim().is_empty() {
            return Err(ConfigError::MissingField("security.token_secret".to_string()).into());
        }
        if self.security.token_lifetime_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "security.token_lifetime_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.store.admin_url.trim().is_empty() {
            return Err(ConfigError::MissingField("store.admin_url".to_string()).into());
        }
        Ok(())
    }

    /// Export settings in effect
    pub fn export_settings(&self) -> ExportSettings {
        self.export.resolve()
    }
}

/// Persist export settings, leaving the rest of the file untouched
///
/// Values are coerced before they are written; the last write wins.
///
/// # Arguments
/// * `path` - Configuration file (created if missing)
/// * `delimiter` - Submitted delimiter
/// * `streaming` - Submitted streaming flag
///
/// # Returns
/// * `Result<ExportConfig>` - Values actually stored
pub fn save_export_settings(path: &Path, delimiter: &str, streaming: &str) -> Result<ExportConfig> {
    let stored = ExportConfig::coerced(delimiter, streaming);

    let text = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };
    let mut doc = text
        .parse::<DocumentMut>()
        .map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;

    if !doc.contains_key("export") {
        doc["export"] = table();
    }
    doc["export"]["delimiter"] = value(stored.delimiter.as_str());
    doc["export"]["streaming"] = value(stored.streaming.as_str());

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, doc.to_string())?;
    info!(
        "Saved export settings: delimiter {:?}, streaming {}",
        stored.delimiter, stored.streaming
    );
    Ok(stored)
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.delimiter, ";");
        assert_eq!(config.export.streaming, "yes");
        assert_eq!(config.security.token_lifetime_secs, 86_400);
        assert!(config.store.commerce_enabled);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_default_settings_resolve() {
        let settings = Config::default().export_settings();
        assert_eq!(settings.delimiter, Delimiter::Semicolon);
        assert!(settings.streaming);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [export]
            delimiter = "\t"

            [store]
            commerce_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.export_settings().delimiter, Delimiter::Tab);
        assert_eq!(config.export.streaming, "yes");
        assert!(!config.store.commerce_enabled);
    }

    #[test]
    fn test_hand_edited_values_coerced_at_read() {
        let export = ExportConfig {
            delimiter: "|".to_string(),
            streaming: "maybe".to_string(),
        };
        let settings = export.resolve();
        assert_eq!(settings.delimiter, Delimiter::Semicolon);
        assert!(settings.streaming);

        let export = ExportConfig {
            delimiter: ",".to_string(),
            streaming: "no".to_string(),
        };
        assert_eq!(
            export.resolve(),
            ExportSettings {
                delimiter: Delimiter::Comma,
                streaming: false
            }
        );
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml_str("[export").unwrap_err();
        assert!(err.to_string().contains("Invalid config format"));
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_err());
        let config = Config::generate();
        assert!(config.validate().is_ok());

        let mut config = Config::generate();
        config.security.token_lifetime_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_creates_file_with_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = Config::load_from_file(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(created.security.token_secret.len(), 32);

        let reloaded = Config::load_from_file(Some(&path)).unwrap();
        assert_eq!(reloaded.security.token_secret, created.security.token_secret);
    }

    #[test]
    fn test_save_export_settings_preserves_other_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "# keep me\n[security]\ntoken_secret = \"abc\"\n\n[export]\ndelimiter = \";\"\n",
        )
        .unwrap();

        let stored = save_export_settings(&path, "\\t", "no").unwrap();
        assert_eq!(stored.delimiter, "\t");
        assert_eq!(stored.streaming, "no");

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("# keep me"));
        let config = Config::from_toml_str(&text).unwrap();
        assert_eq!(config.security.token_secret, "abc");
        assert_eq!(
            config.export_settings(),
            ExportSettings {
                delimiter: Delimiter::Tab,
                streaming: false
            }
        );
    }

    #[test]
    fn test_save_export_settings_coerces_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let stored = save_export_settings(&path, "|", "sometimes").unwrap();
        assert_eq!(stored, ExportConfig::default());

        let config = Config::from_toml_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.export, ExportConfig::default());
    }

    #[test]
    fn test_displayed_secret_is_masked() {
        let config = Config::generate();
        let shown = config.to_toml_with_comments().unwrap();
        assert!(!shown.contains(&config.security.token_secret));
        assert!(shown.contains("********"));
    }
}
