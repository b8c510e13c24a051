use tracing::{info, warn};

use crate::app::ports::QualityResultsPort;
use crate::domain::Frame;
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::quality_gate::{
    DataQualityResult, PublishingStrategy, QualityGate, Ruleset, RulesetQualityGate,
};

/// Evaluates an output frame against its ruleset and publishes the result
pub struct QualityGateUseCase {
    quality_gate: Box<dyn QualityGate + Send + Sync>,
    results_output: Box<dyn QualityResultsPort>,
    strategy: PublishingStrategy,
    stop_job_on_failure: bool,
}

impl QualityGateUseCase {
    pub fn new(
        quality_gate: Box<dyn QualityGate + Send + Sync>,
        results_output: Box<dyn QualityResultsPort>,
        strategy: PublishingStrategy,
        stop_job_on_failure: bool,
    ) -> Self {
        Self {
            quality_gate,
            results_output,
            strategy,
            stop_job_on_failure,
        }
    }

    /// Create a use case from ruleset text with best-effort publishing that never blocks
    pub fn with_ruleset(ruleset: &str, results_output: Box<dyn QualityResultsPort>) -> Result<Self> {
        let ruleset = Ruleset::parse(ruleset)?;
        Ok(Self::new(
            Box::new(RulesetQualityGate::new(ruleset)),
            results_output,
            PublishingStrategy::BestEffort,
            false,
        ))
    }

    /// Evaluate `frame` under `context`.
    ///
    /// A failed ruleset only returns an error when `stop_job_on_failure` is set.
    /// A publishing error only returns an error under the `Strict` strategy.
    pub async fn assess(&self, frame: &Frame, context: &str, run_id: &str) -> Result<DataQualityResult> {
        let result = self.quality_gate.evaluate(frame, context, run_id);

        for outcome in &result.outcomes {
            metrics::quality_gate::rule_evaluated(context, outcome.passed);
            if !outcome.passed {
                warn!(context, rule = %outcome.rule, "Data quality rule failed: {}", outcome.message);
            }
        }

        if result.passed {
            info!(context, rules = result.outcomes.len(), "✅ Data quality ruleset passed");
        }

        if let Err(e) = self.results_output.publish(&result).await {
            match self.strategy {
                PublishingStrategy::BestEffort => {
                    warn!(context, "Failed to publish data quality results (best effort): {}", e);
                }
                PublishingStrategy::Strict => return Err(e),
            }
        }

        if !result.passed && self.stop_job_on_failure {
            return Err(EtlError::DataQuality {
                context: context.to_string(),
                failed: result.failed_count(),
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct MockResultsOutput {
        pub results: Arc<Mutex<Vec<DataQualityResult>>>,
        pub fail: bool,
    }

    impl MockResultsOutput {
        pub fn new(fail: bool) -> Self {
            Self {
                results: Arc::new(Mutex::new(Vec::new())),
                fail,
            }
        }
    }

    #[async_trait]
    impl QualityResultsPort for MockResultsOutput {
        async fn publish(&self, result: &DataQualityResult) -> Result<()> {
            if self.fail {
                return Err(EtlError::Config("results store unavailable".to_string()));
            }
            self.results.lock().await.push(result.clone());
            Ok(())
        }
    }

    fn frame() -> Frame {
        Frame::from_rows(vec!["CASHTAG".into()], vec![vec![json!("AAA")]]).unwrap()
    }

    fn use_case(output: MockResultsOutput, strategy: PublishingStrategy, stop: bool, rules: &str) -> QualityGateUseCase {
        QualityGateUseCase::new(
            Box::new(RulesetQualityGate::new(Ruleset::parse(rules).unwrap())),
            Box::new(output),
            strategy,
            stop,
        )
    }

    #[tokio::test]
    async fn publishes_result_for_context() {
        let output = MockResultsOutput::new(false);
        let published = output.results.clone();
        let uc = QualityGateUseCase::with_ruleset(crate::constants::DEFAULT_DATA_QUALITY_RULESET, Box::new(output)).unwrap();

        let result = uc.assess(&frame(), "silver_ctx", "run-1").await.unwrap();
        assert!(result.passed);

        let published = published.lock().await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].context, "silver_ctx");
        assert_eq!(published[0].run_id, "run-1");
    }

    #[tokio::test]
    async fn failed_ruleset_does_not_block_by_default() {
        let uc = use_case(MockResultsOutput::new(false), PublishingStrategy::BestEffort, false, "Rules = [ RowCount > 5 ]");
        let result = uc.assess(&frame(), "ctx", "run").await.unwrap();
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn failed_ruleset_stops_job_when_requested() {
        let uc = use_case(MockResultsOutput::new(false), PublishingStrategy::BestEffort, true, "Rules = [ RowCount > 5 ]");
        let err = uc.assess(&frame(), "ctx", "run").await.unwrap_err();
        assert!(matches!(err, EtlError::DataQuality { failed: 1, .. }));
    }

    #[tokio::test]
    async fn publish_failure_is_swallowed_under_best_effort() {
        let uc = use_case(MockResultsOutput::new(true), PublishingStrategy::BestEffort, false, "Rules = [ ColumnCount > 0 ]");
        assert!(uc.assess(&frame(), "ctx", "run").await.is_ok());
    }

    #[tokio::test]
    async fn publish_failure_propagates_under_strict() {
        let uc = use_case(MockResultsOutput::new(true), PublishingStrategy::Strict, false, "Rules = [ ColumnCount > 0 ]");
        assert!(uc.assess(&frame(), "ctx", "run").await.is_err());
    }
}
