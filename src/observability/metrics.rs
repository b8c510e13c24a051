//! Metrics for the bursa ETL job
//!
//! Metrics are recorded through the `metrics` facade into a Prometheus
//! recorder. A batch job is gone before anything could scrape it, so the
//! rendered exposition is pushed to a Pushgateway at the end of the run
//! when one is configured.

use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Enum representing all metric names used by the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source metrics
    SourceRowsRead,
    SourceReadDuration,

    // Dedup metrics
    DedupRowsDropped,

    // Transform metrics
    TransformRowsOut,
    TransformDuration,

    // Sink metrics
    SinkRowsWritten,
    SinkBytesWritten,
    SinkWriteDuration,

    // Quality gate metrics
    QualityGateRulesPassed,
    QualityGateRulesFailed,

    // Job metrics
    JobRuns,
    JobDuration,
    JobLastRunTimestamp,
}

impl MetricName {
    /// Get the metric name as a string (convenience method)
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourceRowsRead => "bursa_source_rows_read_total",
            MetricName::SourceReadDuration => "bursa_source_read_duration_seconds",

            MetricName::DedupRowsDropped => "bursa_dedup_rows_dropped_total",

            MetricName::TransformRowsOut => "bursa_transform_rows_out_total",
            MetricName::TransformDuration => "bursa_transform_duration_seconds",

            MetricName::SinkRowsWritten => "bursa_sink_rows_written_total",
            MetricName::SinkBytesWritten => "bursa_sink_bytes_written_total",
            MetricName::SinkWriteDuration => "bursa_sink_write_duration_seconds",

            MetricName::QualityGateRulesPassed => "bursa_quality_gate_rules_passed_total",
            MetricName::QualityGateRulesFailed => "bursa_quality_gate_rules_failed_total",

            MetricName::JobRuns => "bursa_job_runs_total",
            MetricName::JobDuration => "bursa_job_duration_seconds",
            MetricName::JobLastRunTimestamp => "bursa_job_last_run_timestamp_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Idempotent; returns whether a handle is available.
pub fn init() -> bool {
    if HANDLE.get().is_some() {
        return true;
    }
    match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = HANDLE.set(handle);
            info!("Prometheus recorder installed");
            true
        }
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            false
        }
    }
}

/// Render the current metrics in Prometheus text format
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Push everything recorded so far to a Pushgateway, grouped by job and instance
pub async fn push_to_gateway(pushgateway_url: &str, job: &str, instance: &str) -> Result<(), String> {
    let body = render().ok_or_else(|| "metrics recorder not installed".to_string())?;
    let push_url = format!(
        "{}/metrics/job/{}/instance/{}",
        pushgateway_url.trim_end_matches('/'),
        job,
        instance
    );

    let client = reqwest::Client::new();
    let response = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        return Err(format!("Pushgateway returned status {}", response.status().as_u16()));
    }
    info!("Pushed metrics to Pushgateway for job={} instance={}", job, instance);
    Ok(())
}

// ============================================================================
// Source Metrics
// ============================================================================

pub mod source {
    use super::MetricName;

    pub fn rows_read(table: &str, rows: usize) {
        ::metrics::counter!(MetricName::SourceRowsRead.as_str(), "table" => table.to_string()).increment(rows as u64);
    }

    pub fn read_duration(secs: f64) {
        ::metrics::histogram!(MetricName::SourceReadDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Dedup Metrics
// ============================================================================

pub mod dedup {
    use super::MetricName;

    pub fn rows_dropped(rows: usize) {
        ::metrics::counter!(MetricName::DedupRowsDropped.as_str()).increment(rows as u64);
    }
}

// ============================================================================
// Transform Metrics
// ============================================================================

pub mod transform {
    use super::MetricName;
    use crate::domain::Layer;

    pub fn rows_out(layer: Layer, rows: usize) {
        ::metrics::counter!(MetricName::TransformRowsOut.as_str(), "layer" => layer.as_str()).increment(rows as u64);
    }

    pub fn duration(layer: Layer, secs: f64) {
        ::metrics::histogram!(MetricName::TransformDuration.as_str(), "layer" => layer.as_str()).record(secs);
    }
}

// ============================================================================
// Sink Metrics
// ============================================================================

pub mod sink {
    use super::MetricName;
    use crate::domain::Layer;

    pub fn written(layer: Layer, rows: usize, bytes: u64) {
        ::metrics::counter!(MetricName::SinkRowsWritten.as_str(), "layer" => layer.as_str()).increment(rows as u64);
        ::metrics::counter!(MetricName::SinkBytesWritten.as_str(), "layer" => layer.as_str()).increment(bytes);
    }

    pub fn write_duration(layer: Layer, secs: f64) {
        ::metrics::histogram!(MetricName::SinkWriteDuration.as_str(), "layer" => layer.as_str()).record(secs);
    }
}

// ============================================================================
// Quality Gate Metrics
// ============================================================================

pub mod quality_gate {
    use super::MetricName;

    /// Record one rule evaluation for an evaluation context
    pub fn rule_evaluated(context: &str, passed: bool) {
        let name = if passed {
            MetricName::QualityGateRulesPassed
        } else {
            MetricName::QualityGateRulesFailed
        };
        ::metrics::counter!(name.as_str(), "context" => context.to_string()).increment(1);
    }
}

// ============================================================================
// Job Metrics
// ============================================================================

pub mod job {
    use super::MetricName;

    pub fn run_finished(job_name: &str, status: &str, secs: f64) {
        ::metrics::counter!(MetricName::JobRuns.as_str(),
            "job" => job_name.to_string(),
            "status" => status.to_string()
        )
        .increment(1);
        ::metrics::histogram!(MetricName::JobDuration.as_str(), "job" => job_name.to_string()).record(secs);
        ::metrics::gauge!(MetricName::JobLastRunTimestamp.as_str(), "job" => job_name.to_string())
            .set(chrono::Utc::now().timestamp() as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_follow_prometheus_conventions() {
        let counters = [
            MetricName::SourceRowsRead,
            MetricName::DedupRowsDropped,
            MetricName::SinkRowsWritten,
            MetricName::QualityGateRulesFailed,
            MetricName::JobRuns,
        ];
        for m in counters {
            assert!(m.as_str().starts_with("bursa_"));
            assert!(m.as_str().ends_with("_total"), "{} should end with _total", m);
        }
        assert!(MetricName::JobDuration.to_string().ends_with("_seconds"));
    }
}
