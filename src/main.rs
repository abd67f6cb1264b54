//! layered-config
//!
//! Loads configuration layers (defaults, extensions, overrides, environment
//! and system properties), merges them, resolves `${path}` references and
//! prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use layered_config::cli::show::{ShowArgs, load, run_show, run_sources};
use layered_config::cli::{Cli, Command};
use layered_config::logging::{self, LogTarget};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    let loader = load(&cli).context("failed to load configuration")?;

    match cli.command {
        Some(Command::Sources) => {
            print!("{}", run_sources(&loader));
        }
        Some(Command::Show(ref args)) => {
            let config = loader.build().context("failed to resolve configuration")?;
            print!("{}", run_show(&config, args)?);
        }
        None => {
            let config = loader.build().context("failed to resolve configuration")?;
            debug!("No subcommand given, showing full configuration");
            print!("{}", run_show(&config, &ShowArgs::default())?);
        }
    }

    Ok(())
}
