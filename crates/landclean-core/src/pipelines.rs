use once_cell::sync::Lazy;
use polars::prelude::DataFrame;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::{rent_contracts::RentContractsPipeline, transactions::TransactionsPipeline};

/// One table staged for writing into the processed directory.
#[derive(Debug, Clone)]
pub struct OutputTable {
    pub file_name: &'static str,
    pub dataframe: DataFrame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: &'static str,
    pub rows_in: usize,
    pub rows_out: usize,
}

impl StageRecord {
    pub fn rows_dropped(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_out)
    }
}

/// Row counts before and after every stage of a run, in execution order.
#[derive(Debug, Clone)]
pub struct StageLog {
    pipeline: &'static str,
    records: Vec<StageRecord>,
}

impl StageLog {
    pub fn new(pipeline: &'static str) -> Self {
        Self {
            pipeline,
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: &'static str, rows_in: usize, rows_out: usize) {
        info!(
            pipeline = self.pipeline,
            stage, rows_in, rows_out, "stage complete"
        );
        if rows_out == 0 && rows_in > 0 {
            warn!(pipeline = self.pipeline, stage, "stage removed every row");
        }
        self.records.push(StageRecord {
            stage,
            rows_in,
            rows_out,
        });
    }

    pub fn pipeline(&self) -> &'static str {
        self.pipeline
    }

    pub fn records(&self) -> &[StageRecord] {
        &self.records
    }

    pub fn find(&self, stage: &str) -> Option<&StageRecord> {
        self.records.iter().find(|record| record.stage == stage)
    }
}

pub struct PipelineOutput {
    pub tables: Vec<OutputTable>,
    pub stages: StageLog,
}

impl PipelineOutput {
    pub fn table(&self, file_name: &str) -> Option<&DataFrame> {
        self.tables
            .iter()
            .find(|table| table.file_name == file_name)
            .map(|table| &table.dataframe)
    }
}

pub trait CleaningPipeline: Send + Sync {
    fn code_identifier(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// Loads inputs from `config.raw_dir` and returns the cleaned tables without writing.
    fn run(&self, config: &PipelineConfig) -> Result<PipelineOutput>;
}

static PIPELINE_IMPLEMENTATIONS: Lazy<Vec<&'static dyn CleaningPipeline>> = Lazy::new(|| {
    vec![
        &RentContractsPipeline as &dyn CleaningPipeline,
        &TransactionsPipeline as &dyn CleaningPipeline,
    ]
});

pub fn all_pipelines() -> &'static [&'static dyn CleaningPipeline] {
    PIPELINE_IMPLEMENTATIONS.as_slice()
}

pub fn find_pipeline(code: &str) -> Option<&'static dyn CleaningPipeline> {
    all_pipelines()
        .iter()
        .copied()
        .find(|pipeline| pipeline.code_identifier() == code)
}
