//! CLI command definitions for layered-config
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod show;

use crate::config::DEFAULT_APP_NAME;
use clap::{Parser, Subcommand};
use show::ShowArgs;

/// Layered configuration loader and inspector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Explicit override file (.yaml, .yml or .properties); defaults to $LAYERED_CONFIG_FILE
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Application name used for override file names (<name>.yaml)
    #[arg(long, global = true, default_value = DEFAULT_APP_NAME)]
    pub app_name: String,

    /// Directory of extension fragments (default: ./<app-name>.d)
    #[arg(long, global = true, value_name = "DIR")]
    pub extensions: Option<String>,

    /// Additional custom files, merged after extensions in the order given
    #[arg(long = "include", global = true, value_name = "FILE")]
    pub includes: Vec<String>,

    /// System property, exposed as ${SYSTEM.key} with dots replaced by underscores
    #[arg(short = 'D', value_name = "KEY=VALUE", global = true, value_parser = parse_key_val)]
    pub properties: Vec<(String, String)>,

    /// Override a value at a dotted path after all files are merged
    #[arg(long = "set", value_name = "PATH=VALUE", global = true, value_parser = parse_key_val)]
    pub overrides: Vec<(String, String)>,

    /// Also load <name>-test.yaml next to every loaded <name>.yaml
    #[arg(long, global = true)]
    pub test: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved configuration (default if no subcommand given)
    Show(ShowArgs),

    /// List the sources that were merged, lowest precedence first
    Sources,
}

/// Parse a `KEY=VALUE` argument.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("a.b=c=d"),
            Ok(("a.b".to_string(), "c=d".to_string()))
        );
        assert_eq!(parse_key_val("k="), Ok(("k".to_string(), String::new())));
        assert!(parse_key_val("novalue").is_err());
        assert!(parse_key_val("=v").is_err());
    }

    #[test]
    fn test_cli_parses_repeated_options() {
        let cli = Cli::try_parse_from([
            "layered-config",
            "-D",
            "user.name=me",
            "--set",
            "server.port=9090",
            "--set",
            "a=b",
            "show",
            "server",
        ])
        .unwrap();
        assert_eq!(
            cli.properties,
            vec![("user.name".to_string(), "me".to_string())]
        );
        assert_eq!(cli.overrides.len(), 2);
        match cli.command {
            Some(Command::Show(args)) => assert_eq!(args.path.as_deref(), Some("server")),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
