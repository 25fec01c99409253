pub mod config;
pub mod error;
pub mod frame;
pub mod imputation;
pub mod merge;
pub mod outputs;
pub mod pipelines;
pub mod rent_contracts;
pub mod rules;
pub mod transactions;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipelines::{all_pipelines, find_pipeline, CleaningPipeline, PipelineOutput};
