//! Shell completion generation for csv-exporter
//!
//! Generates completion scripts for bash, zsh, fish and PowerShell. Exporter
//! ids and admin surfaces are declared as possible values on the arguments,
//! so the generated scripts complete them without extra shell code.

use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io::Write;

use crate::cli::CliArgs;
use crate::error::{ConfigError, Result};

/// Binary name the scripts register completions for.
const BIN_NAME: &str = "csv-exporter";

/// Write a completion script for `shell_name` to `out`
///
/// # Arguments
/// * `shell_name` - Shell type (bash, zsh, fish, powershell)
/// * `out` - Destination of the script
///
/// # Returns
/// * `Result<()>` - Success or error
pub fn generate_completion<W: Write>(shell_name: &str, out: &mut W) -> Result<()> {
    let shell = parse_shell(shell_name)?;
    let mut cmd = CliArgs::command();
    generate(shell, &mut cmd, BIN_NAME, out);
    Ok(())
}

/// Parse shell name string to Shell enum
fn parse_shell(shell_name: &str) -> Result<Shell> {
    match shell_name.to_lowercase().as_str() {
        "bash" => Ok(Shell::Bash),
        "zsh" => Ok(Shell::Zsh),
        "fish" => Ok(Shell::Fish),
        "powershell" | "pwsh" => Ok(Shell::PowerShell),
        _ => Err(ConfigError::InvalidValue {
            field: "shell".to_string(),
            value: shell_name.to_string(),
        }
        .into()),
    }
}
