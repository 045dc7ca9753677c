use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read job file '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse job file '{path}': {source}")]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid job file: {0}")]
    InvalidJob(String),

    #[error(transparent)]
    Engine(#[from] hardmc::engine::error::EngineError),

    #[error(transparent)]
    Config(#[from] hardmc::engine::config::ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
