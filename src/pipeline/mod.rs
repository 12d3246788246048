//! The ETL pipeline: Validate -> Transform -> Load -> Aggregate, driven
//! by [`runner::PipelineRunner`].

pub mod aggregator;
pub mod loader;
pub mod raw;
pub mod runner;
pub mod transformer;
pub mod validator;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stage `{stage}` missed its deadline: {elapsed_secs}s elapsed, {limit_secs}s allowed")]
    StageTimeout {
        stage: &'static str,
        limit_secs: u64,
        elapsed_secs: u64,
    },
    #[error("warehouse failure during `{stage}`: {cause:#}")]
    Warehouse {
        stage: &'static str,
        cause: anyhow::Error,
    },
}
