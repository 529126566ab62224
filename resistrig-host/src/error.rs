//! Host error type

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    ConfigValue(String),

    #[error("run log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("UI link on {addr}: {source}")]
    Link {
        addr: String,
        source: std::io::Error,
    },
}
