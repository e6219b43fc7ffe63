pub mod ingestion;
pub mod orchestrator;
pub mod processing;
pub mod stats;
pub mod storage;

pub use orchestrator::{Pipeline, PipelineRun, RunOptions, RunSummary};
