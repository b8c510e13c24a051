// Batch pipeline: run lifecycle, orchestration and the processing stages

pub mod job_run;
pub mod orchestrator;
pub mod processing;

pub use job_run::{JobRun, JobRunRecord, JobStatus};
pub use orchestrator::{BursaJob, JobReport, LayerReport};
