use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::{Frame, Layer};
use crate::error::Result;
use crate::pipeline::job_run::{JobRunRecord, JobStatus};
use crate::pipeline::processing::quality_gate::DataQualityResult;

// Source-side ports
#[async_trait]
pub trait SourcePort: Send + Sync {
    async fn read_table(&self, database: &str, table: &str) -> Result<Frame>;
}

// Sink-side ports
#[async_trait]
pub trait SinkPort: Send + Sync {
    async fn write_frame(&self, frame: &Frame, run_id: &str) -> Result<SinkReceipt>;
}

/// What a sink wrote for one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SinkReceipt {
    pub layer: Layer,
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
    pub sha256: String,
    /// `database.table` when the sink registered the output in the catalog
    pub catalog_table: Option<String>,
}

#[async_trait]
pub trait QualityResultsPort: Send + Sync {
    async fn publish(&self, result: &DataQualityResult) -> Result<()>;
}

// Job lifecycle
pub trait RunStorePort: Send + Sync {
    fn start_run(&self, job_name: &str, run_id: &str) -> Result<()>;

    fn finish_run(&self, run_id: &str, status: JobStatus, rows_read: usize, message: Option<&str>) -> Result<()>;

    fn recent_runs(&self, job_name: &str, limit: usize) -> Result<Vec<JobRunRecord>>;
}
