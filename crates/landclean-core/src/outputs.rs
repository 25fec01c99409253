use std::fs::{self, File};
use std::path::{Path, PathBuf};

use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipelines::OutputTable;

/// Location and shape of a file after it was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Writes every table into the processed directory.
///
/// Each table goes to a `.tmp` sibling first; only once all of them are on disk are they
/// renamed into place. A failure removes whatever temporaries were created.
pub fn publish_tables(config: &PipelineConfig, tables: &mut [OutputTable]) -> Result<Vec<WrittenFile>> {
    fs::create_dir_all(&config.processed_dir)
        .map_err(|source| PipelineError::io(&config.processed_dir, source))?;

    let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(tables.len());
    let mut written = Vec::with_capacity(tables.len());

    for table in tables.iter_mut() {
        let final_path = config.processed_path(table.file_name);
        let temp_path = temp_path_for(&final_path);

        if let Err(err) = write_csv(&temp_path, &mut table.dataframe) {
            error!(path = %temp_path.display(), "failed to stage output: {err}");
            discard(&staged);
            let _ = fs::remove_file(&temp_path);
            return Err(err);
        }

        written.push(WrittenFile {
            path: final_path.clone(),
            rows: table.dataframe.height(),
            columns: table.dataframe.width(),
        });
        staged.push((temp_path, final_path));
    }

    for (index, (temp_path, final_path)) in staged.iter().enumerate() {
        if let Err(source) = fs::rename(temp_path, final_path) {
            error!(path = %final_path.display(), "failed to publish output: {source}");
            discard(&staged[index..]);
            return Err(PipelineError::io(final_path, source));
        }
        info!(path = %final_path.display(), "output written");
    }

    Ok(written)
}

pub fn write_csv(path: &Path, df: &mut DataFrame) -> Result<()> {
    let mut file = File::create(path).map_err(|source| PipelineError::io(path, source))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .finish(df)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn discard(staged: &[(PathBuf, PathBuf)]) {
    for (temp_path, _) in staged {
        let _ = fs::remove_file(temp_path);
    }
}
