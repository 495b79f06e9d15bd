//! Command-line interface for csv-exporter
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Running export requests against a JSON record store
//! - Issuing tokens and rendering trigger links

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::builder::Builder;
use tabled::settings::object::{Columns, Rows};
use tabled::settings::{Alignment, Modify, Style, Width};
use tracing::{debug, info};

use crate::auth::{AuthorizationGate, Caller, TokenAuthority};
use crate::config::{save_export_settings, Config, LogLevel};
use crate::error::{Result, StoreError};
use crate::export::{
    ExportOutcome, FileTransport, ResponseHead, ResponseTransport, StdoutTransport,
};
use crate::registry::{AdminSurface, ExportRegistry, TablePosition};
use crate::request::{ExportRequest, FilterSet, TOKEN_PARAM};
use crate::sources::{Described, EntityKind};
use crate::store::FixtureStore;
use crate::utils::time;

pub mod completion;

/// Maximum width of the columns cell in `list` output.
const LIST_COLUMN_WIDTH: usize = 60;

/// CSV exporter for users, products, categories and orders
#[derive(Parser, Debug)]
#[command(
    name = "csv-exporter",
    version,
    about = "Export store records to CSV",
    long_about = "Exports users, products, product categories and orders to CSV.
Requests are authorized with scope-bound anti-forgery tokens and written
either buffered or streamed, as configured."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Table navigation position for `links`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionArg {
    Top,
    Bottom,
}

impl From<PositionArg> for TablePosition {
    fn from(value: PositionArg) -> Self {
        match value {
            PositionArg::Top => TablePosition::Top,
            PositionArg::Bottom => TablePosition::Bottom,
        }
    }
}

/// Identity of the caller a command acts as
#[derive(clap::Args, Debug, Clone)]
pub struct CallerArgs {
    /// User id of the caller
    #[arg(long = "user", value_name = "ID", default_value_t = 1)]
    pub user_id: u64,

    /// Session the caller's tokens are bound to
    #[arg(long, value_name = "SESSION", default_value = "cli")]
    pub session: String,
}

impl CallerArgs {
    fn caller(&self) -> Caller {
        Caller::new(self.user_id, self.session.clone())
    }
}

/// Subcommands for csv-exporter
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one export request
    Export {
        /// Request query string (action=export_csv&exporter_id=...&_token=...)
        #[arg(long, value_name = "QUERY")]
        query: String,

        #[command(flatten)]
        caller: CallerArgs,

        /// Permission held by the caller (repeatable)
        #[arg(long = "capability", value_name = "NAME")]
        capabilities: Vec<String>,

        /// Grant every export permission
        #[arg(long)]
        all_capabilities: bool,

        /// Add a freshly issued token for the requested exporter
        #[arg(long)]
        sign: bool,

        /// JSON record store (overrides store.data_file)
        #[arg(long, value_name = "FILE")]
        data: Option<PathBuf>,

        /// Write the body to this file
        #[arg(short = 'o', long, value_name = "FILE", conflicts_with = "output_dir")]
        output: Option<PathBuf>,

        /// Write the body into this directory under the attachment filename
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Issue an anti-forgery token for an exporter
    Token {
        /// Exporter id
        #[arg(value_parser = ["users", "products", "categories", "orders"])]
        exporter_id: String,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Print trigger links for an admin surface
    Links {
        /// Admin surface
        #[arg(value_parser = ["users", "products", "categories", "orders", "orders-hpos"])]
        surface: String,

        /// Table navigation position
        #[arg(long, value_enum, default_value_t = PositionArg::Top)]
        position: PositionArg,

        /// Query string of the screen's current view
        #[arg(long, value_name = "QUERY")]
        current_query: Option<String>,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// List registered exporters
    List,

    /// Save export settings
    Settings {
        /// Field separator: "," ";" or "\t"
        #[arg(long, value_name = "DELIMITER")]
        delimiter: Option<String>,

        /// Stream rows: yes or no
        #[arg(long, value_name = "FLAG")]
        streaming: Option<String>,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show version information
    Version,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        let args = CliArgs::parse();
        let config = Self::load_config(&args)?;

        Ok(Self { args, config })
    }

    /// Load configuration from file and apply argument overrides
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_logging_args(&mut config, args);
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_config_path)
    }

    /// Authorization gate over the configured secret
    ///
    /// Refuses to build one from a configuration that fails validation, so
    /// an empty secret never signs or accepts a token.
    fn gate(&self) -> Result<AuthorizationGate> {
        self.config.validate()?;
        Ok(AuthorizationGate::new(TokenAuthority::new(
            self.config.security.token_secret.clone(),
            self.config.security.token_lifetime_secs,
        )))
    }

    /// Build the registry over the configured (or given) record store
    async fn registry(&self, data: Option<&Path>) -> Result<ExportRegistry> {
        let path = data
            .map(Path::to_path_buf)
            .or_else(|| self.config.store.data_file.clone())
            .ok_or_else(|| {
                StoreError::Unavailable(
                    "no data file given (use --data or set store.data_file)".to_string(),
                )
            })?;
        let store = FixtureStore::load(&path).await?;
        ExportRegistry::with_store(Arc::new(store), self.config.store.commerce_enabled)
    }

    /// Run the selected subcommand
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub async fn run(&self) -> Result<()> {
        match &self.args.command {
            Commands::Export {
                query,
                caller,
                capabilities,
                all_capabilities,
                sign,
                data,
                output,
                output_dir,
            } => {
                let mut caller = caller.caller().with_capabilities(capabilities.iter().cloned());
                if *all_capabilities {
                    caller = caller.with_capabilities(EntityKind::ALL.iter().map(|k| k.capability()));
                }
                let query = if *sign { self.sign_query(query, &caller)? } else { query.clone() };
                let request = ExportRequest::from_query(&query, caller);
                self.run_export(&request, data.as_deref(), output.as_deref(), output_dir.as_deref())
                    .await
            }
            Commands::Token {
                exporter_id,
                caller,
            } => {
                let token = self
                    .gate()?
                    .issue_token(&caller.caller(), exporter_id, time::now_secs());
                println!("{}", token);
                Ok(())
            }
            Commands::Links {
                surface,
                position,
                current_query,
                caller,
            } => self.show_links(surface, *position, current_query.as_deref(), &caller.caller()),
            Commands::List => self.list_exporters(),
            Commands::Settings {
                delimiter,
                streaming,
            } => self.save_settings(delimiter.as_deref(), streaming.as_deref()),
            Commands::Config { show, validate } => self.handle_config_command(*show, *validate),
            Commands::Completion { shell } => {
                completion::generate_completion(shell, &mut std::io::stdout())
            }
            Commands::Version => {
                self.show_version();
                Ok(())
            }
        }
    }

    /// Append a token for the exporter named in `query`
    fn sign_query(&self, query: &str, caller: &Caller) -> Result<String> {
        let parsed = ExportRequest::from_query(query, caller.clone());
        match parsed.exporter_id.as_deref() {
            Some(id) => {
                let token = self.gate()?.issue_token(caller, id, time::now_secs());
                Ok(format!("{}&{}={}", query.trim_end_matches('&'), TOKEN_PARAM, token))
            }
            None => Ok(query.to_string()),
        }
    }

    async fn run_export(
        &self,
        request: &ExportRequest,
        data: Option<&Path>,
        output: Option<&Path>,
        output_dir: Option<&Path>,
    ) -> Result<()> {
        let registry = self.registry(data).await?;

        let outcome = match (output, output_dir) {
            (Some(path), _) => {
                let mut transport = FileTransport::to_file(path);
                let outcome = self.dispatch(&registry, request, &mut transport).await?;
                print_head(transport.head());
                outcome
            }
            (None, Some(dir)) => {
                let mut transport = FileTransport::in_directory(dir);
                let outcome = self.dispatch(&registry, request, &mut transport).await?;
                print_head(transport.head());
                if let Some(path) = transport.written_to() {
                    eprintln!("Saved to {}", path.display());
                }
                outcome
            }
            (None, None) => {
                let mut transport = StdoutTransport::new();
                let outcome = self.dispatch(&registry, request, &mut transport).await?;
                print_head(transport.head());
                outcome
            }
        };

        match outcome {
            ExportOutcome::NotAddressed => {
                eprintln!("Request is not an export trigger; nothing to do");
            }
            ExportOutcome::Completed(summary) => {
                eprintln!(
                    "Exported {} rows ({} bytes, {}) in {}ms",
                    summary.rows, summary.bytes, summary.mode, summary.elapsed_ms
                );
            }
        }
        Ok(())
    }

    async fn dispatch<T: ResponseTransport>(
        &self,
        registry: &ExportRegistry,
        request: &ExportRequest,
        transport: &mut T,
    ) -> Result<ExportOutcome> {
        let settings = self.config.export_settings();
        debug!(
            "Export settings: delimiter {}, streaming {}",
            settings.delimiter, settings.streaming
        );
        registry
            .dispatch(request, &self.gate()?, settings, transport, time::now())
            .await
    }

    fn show_links(
        &self,
        surface: &str,
        position: PositionArg,
        current_query: Option<&str>,
        caller: &Caller,
    ) -> Result<()> {
        let Some(surface) = AdminSurface::from_name(surface) else {
            eprintln!("Unknown admin surface: {}", surface);
            return Ok(());
        };
        let current = match current_query {
            Some(query) => ExportRequest::from_query(query, Caller::anonymous()).filters,
            None => FilterSet::new(),
        };

        // Links only need exporter identities, not records.
        let registry = ExportRegistry::with_store(
            Arc::new(FixtureStore::default()),
            self.config.store.commerce_enabled,
        )?;
        let links = registry.trigger_links(
            surface,
            position.into(),
            &self.config.store.admin_url,
            &self.gate()?,
            caller,
            &current,
            time::now_secs(),
        );

        if links.is_empty() {
            info!("No trigger rendered for {} ({:?})", surface, position);
        }
        for link in links {
            println!("{}\t{}", link.label, link.url);
        }
        Ok(())
    }

    fn list_exporters(&self) -> Result<()> {
        let registry = ExportRegistry::with_store(
            Arc::new(FixtureStore::default()),
            self.config.store.commerce_enabled,
        )?;
        println!("{}", exporters_table(&registry));
        Ok(())
    }

    fn save_settings(&self, delimiter: Option<&str>, streaming: Option<&str>) -> Result<()> {
        let path = self.get_config_path();
        let delimiter = delimiter.unwrap_or(&self.config.export.delimiter);
        let streaming = streaming.unwrap_or(&self.config.export.streaming);
        let stored = save_export_settings(&path, delimiter, streaming)?;
        println!(
            "Saved to {}: delimiter {:?}, streaming {}",
            path.display(),
            stored.delimiter,
            stored.streaming
        );
        Ok(())
    }

    /// Handle config subcommand
    ///
    /// # Arguments
    /// * `show` - Whether to show configuration
    /// * `validate` - Whether to validate configuration
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show || !validate {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        match self.config.validate() {
            Ok(_) => println!("✅ Configuration is valid"),
            Err(e) => println!("❌ Configuration validation failed: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("{}", self.config.to_toml_with_comments()?);
        Ok(())
    }

    /// Show version information
    fn show_version(&self) {
        println!("csv-exporter version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }
}

/// Print a response head to stderr.
fn print_head(head: Option<&ResponseHead>) {
    if let Some(head) = head {
        eprintln!("HTTP {}", head.status);
        for (name, value) in &head.headers {
            eprintln!("{}: {}", name, value);
        }
    }
}

/// Render the registered exporters as a table
fn exporters_table(registry: &ExportRegistry) -> String {
    let mut builder = Builder::default();
    builder.push_record(["ID", "Title", "Permission", "Columns"]);
    for exporter in registry.iter() {
        let descriptor = exporter.descriptor();
        builder.push_record([
            descriptor.id.clone(),
            descriptor.title.clone(),
            descriptor.capability.clone(),
            descriptor.columns.join(", "),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.with(Modify::new(Columns::new(3..=3)).with(Width::wrap(LIST_COLUMN_WIDTH)));
    table.with(Modify::new(Rows::first()).with(Alignment::center()));
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_args_parsing() {
        let args = CliArgs::try_parse_from([
            "csv-exporter",
            "export",
            "--query",
            "action=export_csv&exporter_id=users",
            "--capability",
            "list_users",
            "--user",
            "7",
            "--sign",
        ])
        .unwrap();
        match args.command {
            Commands::Export {
                query,
                caller,
                capabilities,
                sign,
                ..
            } => {
                assert_eq!(query, "action=export_csv&exporter_id=users");
                assert_eq!(caller.user_id, 7);
                assert_eq!(caller.session, "cli");
                assert_eq!(capabilities, vec!["list_users"]);
                assert!(sign);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_output_conflicts_with_output_dir() {
        let result = CliArgs::try_parse_from([
            "csv-exporter",
            "export",
            "--query",
            "x",
            "-o",
            "a.csv",
            "--output-dir",
            "out",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_token_rejects_unknown_exporter() {
        assert!(CliArgs::try_parse_from(["csv-exporter", "token", "pages"]).is_err());
        assert!(CliArgs::try_parse_from(["csv-exporter", "token", "orders"]).is_ok());
    }

    #[test]
    fn test_links_position_default() {
        let args = CliArgs::try_parse_from(["csv-exporter", "links", "products"]).unwrap();
        match args.command {
            Commands::Links { position, .. } => assert_eq!(position, PositionArg::Top),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_logging_overrides() {
        let args = CliArgs::try_parse_from(["csv-exporter", "-q", "list"]).unwrap();
        let mut config = Config::default();
        CliInterface::apply_logging_args(&mut config, &args);
        assert_eq!(config.logging.level, LogLevel::Error);

        let args = CliArgs::try_parse_from(["csv-exporter", "list", "-v"]).unwrap();
        CliInterface::apply_logging_args(&mut config, &args);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_sign_query_appends_token() {
        let mut config = Config::generate();
        config.security.token_lifetime_secs = 86_400;
        let args = CliArgs::try_parse_from(["csv-exporter", "list"]).unwrap();
        let cli = CliInterface { args, config };

        let caller = Caller::new(1, "cli").with_capability("list_users");
        let signed = cli
            .sign_query("action=export_csv&exporter_id=users&", &caller)
            .unwrap();
        let request = ExportRequest::from_query(&signed, caller.clone());
        assert!(request.token.is_some());
        assert_eq!(
            cli.gate()
                .unwrap()
                .authorize(&request, "users", "list_users", time::now_secs()),
            Ok(crate::auth::GateDecision::Granted)
        );

        assert_eq!(cli.sign_query("page=2", &caller).unwrap(), "page=2");
    }

    #[tokio::test]
    async fn test_empty_secret_fails_closed() {
        let mut config = Config::generate();
        config.security.token_secret = String::new();
        let args = CliArgs::try_parse_from(["csv-exporter", "token", "users"]).unwrap();
        let cli = CliInterface { args, config };

        assert!(cli.gate().is_err());
        assert!(cli.run().await.is_err());

        let caller = Caller::new(1, "cli");
        let err = cli
            .sign_query("action=export_csv&exporter_id=users", &caller)
            .unwrap_err();
        assert!(err.to_string().contains("security.token_secret"));
    }

    #[test]
    fn test_exporters_table() {
        let registry =
            ExportRegistry::with_store(Arc::new(FixtureStore::default()), false).unwrap();
        let table = exporters_table(&registry);
        assert!(table.contains("list_users"));
        assert!(table.contains("manage_categories"));
        assert!(!table.contains("edit_shop_orders"));
    }
}
