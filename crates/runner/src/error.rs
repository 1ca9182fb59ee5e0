//! Error types for visreg runs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisregError {
    #[error("Failed to launch worker {}: {source}", executable.display())]
    Launch {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Not allowed to create new screenshot ({filename}) when new baselines are disallowed")]
    NewBaselineDisallowed { filename: String },

    #[error("Malformed channel record: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type VisregResult<T> = Result<T, VisregError>;
