//! Structured error types for configuration building.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Structural errors
    Navigation,
    NotAnObject,

    // Resolution errors
    MissingReference,
    ResolutionCycle,
    ResolutionLimit,
    NonScalarReference,

    // Source errors
    ParseError,
    IoError,
}

/// Fatal errors raised while merging, resolving or loading configuration.
///
/// Any of these aborts the whole build; no partial configuration is returned.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `add` or a dotted property key tried to descend through a non-object node.
    #[error("cannot navigate through '{segment}' while adding '{path}': existing value is not an object")]
    Navigation { path: String, segment: String },

    /// A placeholder has no resolvable target and no default.
    #[error("unresolved reference '${{{path}}}' in \"{source_string}\"")]
    MissingReference { path: String, source_string: String },

    /// Placeholders depend on each other and never converge.
    #[error("circular reference: {}", .paths.join(" -> "))]
    Cycle { paths: Vec<String> },

    /// Substitution kept producing new placeholders past the pass limit.
    #[error("substitution in '{path}' did not converge after {passes} passes")]
    Unconverged { path: String, passes: usize },

    /// A placeholder targets an object or array, which has no textual form.
    #[error("reference '${{{path}}}' points to a non-scalar value")]
    NonScalarReference { path: String },

    /// A fragment that must be an object was something else.
    #[error("configuration source '{source_name}' is not an object")]
    NotAnObject { source_name: String },

    #[error("failed to parse '{source_name}': {message}")]
    Parse { source_name: String, message: String },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn navigation(path: &str, segment: &str) -> Self {
        Self::Navigation {
            path: path.to_string(),
            segment: segment.to_string(),
        }
    }

    pub fn missing_reference(path: &str, source_string: &str) -> Self {
        Self::MissingReference {
            path: path.to_string(),
            source_string: source_string.to_string(),
        }
    }

    pub fn not_an_object(source_name: impl Into<String>) -> Self {
        Self::NotAnObject {
            source_name: source_name.into(),
        }
    }

    pub fn parse(source_name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }

    /// The programmatic code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::Navigation { .. } => ErrorCode::Navigation,
            ConfigError::MissingReference { .. } => ErrorCode::MissingReference,
            ConfigError::Cycle { .. } => ErrorCode::ResolutionCycle,
            ConfigError::Unconverged { .. } => ErrorCode::ResolutionLimit,
            ConfigError::NonScalarReference { .. } => ErrorCode::NonScalarReference,
            ConfigError::NotAnObject { .. } => ErrorCode::NotAnObject,
            ConfigError::Parse { .. } => ErrorCode::ParseError,
            ConfigError::Io { .. } => ErrorCode::IoError,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
