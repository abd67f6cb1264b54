//! `show` and `sources` subcommands.
//!
//! Both load every configuration tier the same way; `show` resolves and
//! prints the result, `sources` reports what was merged.

use super::Cli;
use crate::config::{ConfigLoader, ConfigPaths, Configuration, ProcessSnapshot};
use crate::format::OutputFormat;
use anyhow::{Context, Result, bail};
use clap::Args;
use serde_json::Value;
use std::fmt::Write;
use std::path::PathBuf;

/// Arguments for the show subcommand
#[derive(Args, Debug, Default)]
pub struct ShowArgs {
    /// Dotted path of the value to print (default: everything)
    pub path: Option<String>,

    /// Output format: json or yaml
    #[arg(short, long)]
    pub format: Option<String>,

    /// Negotiate the output format from a media type list, e.g. "application/yaml"
    #[arg(long, value_name = "MEDIA_TYPES", conflicts_with = "format")]
    pub accept: Option<String>,
}

impl ShowArgs {
    /// Explicit format first, then negotiation, then JSON.
    pub fn output_format(&self) -> Result<OutputFormat> {
        if let Some(ref name) = self.format {
            return OutputFormat::from_str(name)
                .with_context(|| format!("unknown output format '{name}'"));
        }
        if let Some(ref accept) = self.accept {
            return OutputFormat::negotiate(accept)
                .with_context(|| format!("no supported media type in '{accept}'"));
        }
        Ok(OutputFormat::default())
    }
}

/// Load every tier as directed by the global CLI options.
pub fn load(cli: &Cli) -> Result<ConfigLoader> {
    let mut paths = ConfigPaths::discover(&cli.app_name).with_test_overlays(cli.test);
    if let Some(ref config) = cli.config {
        paths = paths.with_explicit_file(config);
    }
    if let Some(ref dir) = cli.extensions {
        paths = paths.with_extensions_dir(dir);
    }
    paths.custom_files.extend(cli.includes.iter().map(PathBuf::from));

    let process = ProcessSnapshot::capture(&cli.app_name, &cli.properties);
    let mut loader = ConfigLoader::load_with(paths, process)?;
    for (path, raw) in &cli.overrides {
        loader.set(path, parse_override_value(raw))?;
    }
    Ok(loader)
}

/// Interpret a `--set` value as a YAML scalar, so `8080` stays a number.
///
/// Anything that is not a plain scalar is kept as the literal string.
pub fn parse_override_value(raw: &str) -> Value {
    match serde_yaml::from_str::<Value>(raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => value,
        Ok(Value::Null) if raw.trim() == "null" || raw.trim() == "~" => Value::Null,
        _ => Value::String(raw.to_string()),
    }
}

/// Render the configuration, or the value at `args.path`.
pub fn run_show(config: &Configuration, args: &ShowArgs) -> Result<String> {
    let format = args.output_format()?;
    match args.path.as_deref() {
        None | Some("") => config.render(format),
        Some(path) => match config.get(path) {
            Some(value @ (Value::Object(_) | Value::Array(_))) => format.render(value),
            Some(Value::String(s)) => Ok(format!("{s}\n")),
            Some(scalar) => Ok(format!("{scalar}\n")),
            None => bail!("no value at '{path}'"),
        },
    }
}

/// List merged sources and warnings.
pub fn run_sources(loader: &ConfigLoader) -> String {
    let mut out = String::new();
    for (i, source) in loader.sources().iter().enumerate() {
        let _ = writeln!(out, "{:>2}. [{}] {}", i + 1, source.tier, source.name);
    }
    for warning in loader.warnings() {
        let _ = writeln!(out, "warning: {warning}");
    }
    out
}
