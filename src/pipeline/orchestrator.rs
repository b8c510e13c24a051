use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

use crate::app::ports::{SinkPort, SinkReceipt, SourcePort};
use crate::app::quality_gate_use_case::QualityGateUseCase;
use crate::config::Config;
use crate::constants::{GOLD_DQ_CONTEXT, SILVER_DQ_CONTEXT};
use crate::domain::{Frame, Layer};
use crate::error::Result;
use crate::infra::catalog::LocalCatalog;
use crate::infra::json_sink::JsonSink;
use crate::infra::quality_results_adapter::FileQualityResultsAdapter;
use crate::observability::metrics;
use crate::pipeline::job_run::JobRun;
use crate::pipeline::processing::quality_gate::{DataQualityResult, Ruleset, RulesetQualityGate};
use crate::pipeline::processing::transform::{self, Transform};

/// The deduplicated snapshot both layers are derived from
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub frame: Frame,
    pub rows_read: usize,
    pub duplicates_dropped: usize,
}

/// Per-layer outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct LayerReport {
    pub layer: Layer,
    pub rows: usize,
    pub data_quality: DataQualityResult,
    pub receipt: SinkReceipt,
}

/// Outcome of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job_name: String,
    pub run_id: String,
    pub rows_read: usize,
    pub duplicates_dropped: usize,
    pub outputs: Vec<LayerReport>,
}

/// One output branch: shape, check, write
pub struct Output {
    pub transform: Box<dyn Transform>,
    pub sink: Box<dyn SinkPort>,
    pub dq_context: String,
}

/// Reads the raw table once, deduplicates it, and feeds the same snapshot to
/// the silver and gold branches.
pub struct BursaJob {
    source: Arc<dyn SourcePort>,
    database: String,
    source_table: String,
    dedup_keys: Vec<String>,
    outputs: Vec<Output>,
    quality: QualityGateUseCase,
}

impl BursaJob {
    pub fn new(
        source: Arc<dyn SourcePort>,
        database: &str,
        source_table: &str,
        dedup_keys: Vec<String>,
        outputs: Vec<Output>,
        quality: QualityGateUseCase,
    ) -> Self {
        Self {
            source,
            database: database.to_string(),
            source_table: source_table.to_string(),
            dedup_keys,
            outputs,
            quality,
        }
    }

    /// Wire the job against the local catalog, JSON sinks and file-based results store
    pub fn from_config(config: &Config) -> Result<Self> {
        let catalog = Arc::new(LocalCatalog::open(&config.catalog.root)?);
        let database = config.catalog.database.as_str();

        let outputs = [(Layer::Silver, SILVER_DQ_CONTEXT), (Layer::Gold, GOLD_DQ_CONTEXT)]
            .into_iter()
            .map(|(layer, context)| Output {
                transform: transform::for_layer(layer),
                sink: Box::new(JsonSink::new(layer, database, config.sink(layer).clone(), catalog.clone())),
                dq_context: context.to_string(),
            })
            .collect();

        let dq = &config.data_quality;
        let quality = QualityGateUseCase::new(
            Box::new(RulesetQualityGate::new(Ruleset::parse(&dq.ruleset)?)),
            Box::new(FileQualityResultsAdapter::new(&dq.results_path)),
            dq.publishing_strategy,
            dq.stop_job_on_failure,
        );

        Ok(Self::new(
            catalog,
            database,
            &config.catalog.source_table,
            config.dedup.keys.clone(),
            outputs,
            quality,
        ))
    }

    /// Read the source table and drop duplicate rows by the dedup keys
    pub async fn load_snapshot(&self) -> Result<Snapshot> {
        let t_read = Instant::now();
        let raw = self.source.read_table(&self.database, &self.source_table).await?;
        metrics::source::read_duration(t_read.elapsed().as_secs_f64());

        let rows_read = raw.row_count();
        metrics::source::rows_read(&self.source_table, rows_read);
        info!("📥 Read {} rows from {}.{}", rows_read, self.database, self.source_table);
        if raw.is_empty() {
            warn!(
                "{}.{} has no rows; writing empty outputs with columns [{}]",
                self.database,
                self.source_table,
                raw.columns().join(", ")
            );
        }

        let keys: Vec<&str> = self.dedup_keys.iter().map(String::as_str).collect();
        let frame = raw.drop_duplicates(&keys)?;
        let duplicates_dropped = rows_read - frame.row_count();
        metrics::dedup::rows_dropped(duplicates_dropped);
        info!("🧹 Dropped {} duplicate rows by [{}]", duplicates_dropped, keys.join(", "));

        Ok(Snapshot {
            frame,
            rows_read,
            duplicates_dropped,
        })
    }

    fn output(&self, layer: Layer) -> Option<&Output> {
        self.outputs.iter().find(|o| o.transform.layer() == layer)
    }

    /// Shape the snapshot for one layer without checking or writing it
    pub async fn preview(&self, layer: Layer, limit: Option<usize>) -> Result<Frame> {
        let snapshot = self.load_snapshot().await?;
        let frame = match self.output(layer) {
            Some(output) => output.transform.apply(&snapshot.frame)?,
            None => transform::for_layer(layer).apply(&snapshot.frame)?,
        };
        Ok(match limit {
            Some(n) if n < frame.row_count() => {
                let rows = frame.iter().take(n).map(|r| r.values().to_vec()).collect();
                Frame::from_rows(frame.columns().to_vec(), rows)?
            }
            _ => frame,
        })
    }

    /// Run every stage for `run_id` without touching the run lifecycle
    pub async fn execute(&self, job_name: &str, run_id: &str) -> Result<JobReport> {
        let snapshot = self.load_snapshot().await?;

        // Shape every layer before anything is written
        let mut shaped = Vec::with_capacity(self.outputs.len());
        for output in &self.outputs {
            let layer = output.transform.layer();
            let _span = info_span!("transform", stage = %layer).entered();
            let t = Instant::now();
            let frame = output.transform.apply(&snapshot.frame)?;
            metrics::transform::duration(layer, t.elapsed().as_secs_f64());
            metrics::transform::rows_out(layer, frame.row_count());
            info!("🔧 {} transform produced {} rows x {} columns", layer, frame.row_count(), frame.column_count());
            shaped.push(frame);
        }

        let mut reports = Vec::with_capacity(self.outputs.len());
        for (output, frame) in self.outputs.iter().zip(shaped) {
            let layer = output.transform.layer();
            let span = info_span!("output", stage = %layer, run_id = %run_id);
            let report = async {
                let data_quality = self.quality.assess(&frame, &output.dq_context, run_id).await?;

                let t = Instant::now();
                let receipt = output.sink.write_frame(&frame, run_id).await?;
                metrics::sink::write_duration(layer, t.elapsed().as_secs_f64());
                metrics::sink::written(layer, receipt.rows, receipt.bytes);

                Ok::<_, crate::error::EtlError>(LayerReport {
                    layer,
                    rows: frame.row_count(),
                    data_quality,
                    receipt,
                })
            }
            .instrument(span)
            .await?;
            reports.push(report);
        }

        Ok(JobReport {
            job_name: job_name.to_string(),
            run_id: run_id.to_string(),
            rows_read: snapshot.rows_read,
            duplicates_dropped: snapshot.duplicates_dropped,
            outputs: reports,
        })
    }

    /// Execute inside `run` and close it: commit on success, fail otherwise
    pub async fn run(&self, run: JobRun) -> Result<JobReport> {
        match self.execute(run.job_name(), run.run_id()).await {
            Ok(report) => {
                run.commit(report.rows_read)?;
                Ok(report)
            }
            Err(e) => {
                if let Err(store_err) = run.fail(0, &e) {
                    warn!("Could not record failed run: {}", store_err);
                }
                Err(e)
            }
        }
    }
}
