use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use crate::app::ports::RunStorePort;
use crate::error::Result;
use crate::pipeline::job_run::{JobRunRecord, JobStatus};

/// SQLite-backed history of job runs
pub struct SqliteRunStore {
    conn: Mutex<Connection>,
}

impl SqliteRunStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS job_runs (
                run_id       TEXT PRIMARY KEY,
                job_name     TEXT NOT NULL,
                status       TEXT NOT NULL,
                started_at   INTEGER NOT NULL,
                finished_at  INTEGER,
                rows_read    INTEGER NOT NULL DEFAULT 0,
                message      TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_job_runs_job ON job_runs (job_name, started_at);
            "#,
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

impl RunStorePort for SqliteRunStore {
    fn start_run(&self, job_name: &str, run_id: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO job_runs (run_id, job_name, status, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, job_name, JobStatus::Running.as_str(), Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn finish_run(&self, run_id: &str, status: JobStatus, rows_read: usize, message: Option<&str>) -> Result<()> {
        self.conn().execute(
            "UPDATE job_runs SET status = ?2, finished_at = ?3, rows_read = ?4, message = ?5 WHERE run_id = ?1",
            params![
                run_id,
                status.as_str(),
                Utc::now().timestamp_millis(),
                rows_read as i64,
                message
            ],
        )?;
        Ok(())
    }

    fn recent_runs(&self, job_name: &str, limit: usize) -> Result<Vec<JobRunRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT run_id, job_name, status, started_at, finished_at, rows_read, message
             FROM job_runs WHERE job_name = ?1 ORDER BY started_at DESC, rowid DESC LIMIT ?2",
        )?;
        let mut rows = stmt.query(params![job_name, limit as i64])?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next()? {
            let status: String = row.get(2)?;
            let finished_at: Option<i64> = row.get(4)?;
            runs.push(JobRunRecord {
                run_id: row.get(0)?,
                job_name: row.get(1)?,
                status: status.parse()?,
                started_at: from_millis(row.get(3)?),
                finished_at: finished_at.map(from_millis),
                rows_read: row.get::<_, i64>(5)? as usize,
                message: row.get(6)?,
            });
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recent_runs_are_newest_first_and_limited() {
        let dir = tempdir().unwrap();
        let store = SqliteRunStore::open(dir.path().join("state").join("runs.db")).unwrap();
        for id in ["a", "b", "c"] {
            store.start_run("job", id).unwrap();
        }
        store.start_run("other-job", "z").unwrap();
        store.finish_run("c", JobStatus::Succeeded, 7, None).unwrap();

        let runs = store.recent_runs("job", 2).unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
        assert_eq!(runs[0].status, JobStatus::Succeeded);
        assert_eq!(runs[1].status, JobStatus::Running);
        assert!(runs[1].finished_at.is_none());
    }
}
