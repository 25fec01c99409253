// crates/landclean-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::merge::JoinError;
use crate::rules::RuleError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Config file {} is invalid: {source}", .path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{table} is missing expected column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error(transparent)]
    Join(#[from] JoinError),
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
