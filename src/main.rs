//! csv-exporter
//!
//! Exports users, products, product categories and orders from a record
//! store to CSV, behind token and permission checks.
//!
//! # Usage
//!
//! ```bash
//! # Issue a token and run an export into the current directory
//! csv-exporter token users
//! csv-exporter export --data store.json --capability list_users \
//!     --query "action=export_csv&exporter_id=users&_token=<token>" --output-dir .
//! ```

use tracing::Level;

use csv_exporter::cli::CliInterface;
use csv_exporter::error::{ErrorResponse, ExporterError, Result};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        report_error(&e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Run the selected subcommand
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;
    initialize_logging(&cli);
    cli.run().await
}

/// Print a fatal error as the halt response
fn report_error(error: &ExporterError) {
    match ErrorResponse::from_error(error).to_json() {
        Ok(json) => eprintln!("{}", json),
        Err(_) => eprintln!("Error: {}", error),
    }
}

/// Initialize logging system based on configuration and verbosity
///
/// Logs go to stderr so a CSV body on stdout stays clean.
///
/// # Arguments
/// * `cli` - CLI interface with the effective configuration
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
