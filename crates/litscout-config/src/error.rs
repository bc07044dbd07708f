//! Errors raised while resolving litscout settings.

use std::path::PathBuf;
use thiserror::Error;

/// Why a `config.toml` layer could not be read, merged or written.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A `config.toml` layer exists but is unreadable
    #[error("cannot read litscout config '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `config.toml` layer is not valid TOML or has unknown shapes
    #[error("malformed litscout config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Default settings could not be rendered as TOML
    #[error("cannot render litscout settings as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `init-config` could not write the global file
    #[error("cannot write litscout config '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `~/.litscout` could not be created
    #[error("cannot create litscout config directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No home directory, so there is no global layer
    #[error("no home directory for the global litscout config")]
    NoHomeDir,

    /// A merged setting is out of range (weights, limits, sizing thresholds)
    #[error("setting '{key}' {message}")]
    InvalidValue { key: String, message: String },

    /// Tenant key in `[tenants]` is not a numeric user id
    #[error("tenant key '{key}' is not a numeric user id")]
    InvalidTenantKey { key: String },
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Reject `key`; `message` reads as a predicate, e.g. "must be within [0, 1]".
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}
