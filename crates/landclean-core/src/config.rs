use std::path::{Path, PathBuf};

use chrono::{Datelike, Utc};
use serde::Deserialize;

use crate::error::{PipelineError, Result};

pub const DEFAULT_RAW_DIR: &str = "data/raw";
pub const DEFAULT_PROCESSED_DIR: &str = "data/processed";

/// Where pipelines read their inputs and write their outputs, plus the year the
/// "last N years" windows are anchored on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub raw_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub reference_year: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from(DEFAULT_RAW_DIR),
            processed_dir: PathBuf::from(DEFAULT_PROCESSED_DIR),
            reference_year: Utc::now().year(),
        }
    }
}

/// On-disk shape of a config file. Every field is optional so a file can override
/// just the paths it cares about.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub raw_dir: Option<PathBuf>,
    pub processed_dir: Option<PathBuf>,
    pub reference_year: Option<i32>,
}

impl ConfigFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|source| PipelineError::io(path, source))?;
        toml::from_str(&content).map_err(|source| PipelineError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl PipelineConfig {
    pub fn new(raw_dir: impl Into<PathBuf>, processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            processed_dir: processed_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    /// Layers a parsed config file over the defaults.
    pub fn from_file(file: ConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            raw_dir: file.raw_dir.unwrap_or(defaults.raw_dir),
            processed_dir: file.processed_dir.unwrap_or(defaults.processed_dir),
            reference_year: file.reference_year.unwrap_or(defaults.reference_year),
        }
    }

    pub fn raw_path(&self, file_name: &str) -> PathBuf {
        self.raw_dir.join(file_name)
    }

    pub fn processed_path(&self, file_name: &str) -> PathBuf {
        self.processed_dir.join(file_name)
    }
}
