//! Output formatting for resolved configuration trees.
//!
//! Configuration can be rendered as pretty-printed JSON or as YAML. The format
//! is picked by name on the command line or negotiated from a media type list
//! such as an HTTP `Accept` header.

use anyhow::Result;
use serde::Serialize;

/// Output format for configuration dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            _ => None,
        }
    }

    /// Map a single media type (parameters allowed) to a format.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        match essence.as_str() {
            "application/json"
            | "application/vnd.api+json"
            | "application/schema+json"
            | "application/*"
            | "*/*" => Some(OutputFormat::Json),
            "application/yaml" | "application/x-yaml" | "text/yaml" | "text/x-yaml" => {
                Some(OutputFormat::Yaml)
            }
            _ => None,
        }
    }

    /// Pick the first acceptable format from a comma-separated media type list.
    ///
    /// Entries with `q=0` are excluded; other quality values are ignored.
    pub fn negotiate(accept: &str) -> Option<Self> {
        accept
            .split(',')
            .filter(|entry| !is_refused(entry))
            .find_map(Self::from_media_type)
    }

    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Json => "application/json",
            OutputFormat::Yaml => "application/yaml",
        }
    }

    /// Render a value or object tree in this format.
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        match self {
            OutputFormat::Json => {
                let mut out = serde_json::to_string_pretty(value)?;
                out.push('\n');
                Ok(out)
            }
            OutputFormat::Yaml => Ok(serde_yaml::to_string(value)?),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

fn is_refused(entry: &str) -> bool {
    entry.split(';').skip(1).any(|param| {
        let param = param.trim();
        param
            .strip_prefix("q=")
            .and_then(|q| q.trim().parse::<f32>().ok())
            .is_some_and(|q| q == 0.0)
    })
}
