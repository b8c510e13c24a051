use crate::app::ports::QualityResultsPort;
use crate::error::Result;
use crate::pipeline::processing::quality_gate::DataQualityResult;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// File-based implementation of QualityResultsPort.
/// Appends each result to `<dir>/<context>.ndjson`, one JSON object per line.
pub struct FileQualityResultsAdapter {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileQualityResultsAdapter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn results_file(&self, context: &str) -> PathBuf {
        self.dir.join(format!("{}.ndjson", context))
    }
}

#[async_trait::async_trait]
impl QualityResultsPort for FileQualityResultsAdapter {
    async fn publish(&self, result: &DataQualityResult) -> Result<()> {
        let json_line = serde_json::to_string(result)?;
        let path = self.results_file(&result.context);

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        std::fs::create_dir_all(&self.dir)?;
        let mut writer = BufWriter::new(OpenOptions::new().create(true).append(true).open(&path)?);
        writeln!(writer, "{}", json_line)?;
        writer.flush()?;

        debug!("Published data quality result for {} to {}", result.context, path.display());
        Ok(())
    }
}
