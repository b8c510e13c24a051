use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::app::ports::RunStorePort;
use crate::error::{EtlError, Result};
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "RUNNING",
            JobStatus::Succeeded => "SUCCEEDED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "RUNNING" => Ok(JobStatus::Running),
            "SUCCEEDED" => Ok(JobStatus::Succeeded),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(EtlError::Config(format!("unknown job status '{}'", other))),
        }
    }
}

/// A job run as kept in the run store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRunRecord {
    pub run_id: String,
    pub job_name: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub rows_read: usize,
    pub message: Option<String>,
}

/// Lifecycle of one invocation: `init` records the start, then exactly one of
/// `commit` or `fail` closes it.
pub struct JobRun {
    job_name: String,
    run_id: String,
    started: Instant,
    store: Arc<dyn RunStorePort>,
}

impl JobRun {
    pub fn init(job_name: &str, store: Arc<dyn RunStorePort>) -> Result<Self> {
        if job_name.trim().is_empty() {
            return Err(EtlError::Config("job name must not be empty".to_string()));
        }
        let run_id = Uuid::new_v4().to_string();
        store.start_run(job_name, &run_id)?;
        info!(job = job_name, run_id = %run_id, "▶️  Job run started");

        Ok(Self {
            job_name: job_name.to_string(),
            run_id,
            started: Instant::now(),
            store,
        })
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn commit(self, rows_read: usize) -> Result<()> {
        self.store.finish_run(&self.run_id, JobStatus::Succeeded, rows_read, None)?;
        let secs = self.started.elapsed().as_secs_f64();
        metrics::job::run_finished(&self.job_name, JobStatus::Succeeded.as_str(), secs);
        info!(job = %self.job_name, run_id = %self.run_id, "✅ Job run committed in {:.2}s", secs);
        Ok(())
    }

    pub fn fail(self, rows_read: usize, err: &EtlError) -> Result<()> {
        let message = err.to_string();
        self.store
            .finish_run(&self.run_id, JobStatus::Failed, rows_read, Some(&message))?;
        let secs = self.started.elapsed().as_secs_f64();
        metrics::job::run_finished(&self.job_name, JobStatus::Failed.as_str(), secs);
        error!(job = %self.job_name, run_id = %self.run_id, "❌ Job run failed: {}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::run_store::SqliteRunStore;
    use tempfile::tempdir;

    #[test]
    fn commit_marks_run_succeeded() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn RunStorePort> = Arc::new(SqliteRunStore::open(dir.path().join("runs.db")).unwrap());

        let run = JobRun::init("bursa-job", store.clone()).unwrap();
        let run_id = run.run_id().to_string();
        run.commit(42).unwrap();

        let runs = store.recent_runs("bursa-job", 10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, run_id);
        assert_eq!(runs[0].status, JobStatus::Succeeded);
        assert_eq!(runs[0].rows_read, 42);
        assert!(runs[0].finished_at.is_some());
    }

    #[test]
    fn fail_records_message() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn RunStorePort> = Arc::new(SqliteRunStore::open(dir.path().join("runs.db")).unwrap());

        let run = JobRun::init("bursa-job", store.clone()).unwrap();
        let err = EtlError::TableNotFound {
            database: "bursa_market_share".to_string(),
            table: "bursa_raw".to_string(),
        };
        run.fail(0, &err).unwrap();

        let runs = store.recent_runs("bursa-job", 10).unwrap();
        assert_eq!(runs[0].status, JobStatus::Failed);
        assert!(runs[0].message.as_deref().unwrap().contains("bursa_raw"));
    }

    #[test]
    fn empty_job_name_is_rejected() {
        let dir = tempdir().unwrap();
        let store: Arc<dyn RunStorePort> = Arc::new(SqliteRunStore::open(dir.path().join("runs.db")).unwrap());
        assert!(JobRun::init("  ", store).is_err());
    }
}
