pub mod ruleset;

pub use ruleset::{Comparison, Rule, Ruleset};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::Frame;

/// Outcome of one rule against one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// The rule in ruleset syntax
    pub rule: String,
    pub passed: bool,
    /// Measured value the rule compared against (count or ratio)
    pub observed: Option<f64>,
    pub message: String,
}

/// Result of evaluating a ruleset, as published to the results store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataQualityResult {
    /// Evaluation context name, one per output
    pub context: String,
    pub run_id: String,
    pub evaluated_at: DateTime<Utc>,
    pub row_count: usize,
    pub column_count: usize,
    pub outcomes: Vec<RuleOutcome>,
    pub passed: bool,
}

impl DataQualityResult {
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.passed).count()
    }
}

/// What happens when the results store rejects a published result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishingStrategy {
    /// Publishing errors are logged and the job carries on
    #[default]
    BestEffort,
    /// Publishing errors fail the job
    Strict,
}

/// Evaluates frames against data-quality rules
pub trait QualityGate {
    fn evaluate(&self, frame: &Frame, context: &str, run_id: &str) -> DataQualityResult;
}

/// Quality gate backed by a parsed [`Ruleset`]
pub struct RulesetQualityGate {
    ruleset: Ruleset,
}

impl RulesetQualityGate {
    pub fn new(ruleset: Ruleset) -> Self {
        Self { ruleset }
    }

    fn evaluate_rule(&self, rule: &Rule, frame: &Frame) -> RuleOutcome {
        let (passed, observed, message) = match rule {
            Rule::RowCount(op, expected) => {
                let observed = frame.row_count() as f64;
                let passed = op.holds(observed, *expected);
                (passed, Some(observed), format!("row count is {}", observed))
            }
            Rule::ColumnCount(op, expected) => {
                let observed = frame.column_count() as f64;
                let passed = op.holds(observed, *expected);
                (passed, Some(observed), format!("column count is {}", observed))
            }
            Rule::IsComplete(col) => match frame.column(col) {
                Some(values) => {
                    let nulls = values.iter().filter(|v| v.is_null()).count();
                    let ratio = ratio(values.len() - nulls, values.len());
                    (nulls == 0, Some(ratio), format!("{} null value(s) in {}", nulls, col))
                }
                None => (false, None, format!("column {} not found", col)),
            },
            Rule::IsUnique(col) => match frame.column(col) {
                Some(values) => {
                    let distinct: HashSet<String> = values.iter().map(|v| v.to_string()).collect();
                    let ratio = ratio(distinct.len(), values.len());
                    let duplicates = values.len() - distinct.len();
                    (duplicates == 0, Some(ratio), format!("{} duplicate value(s) in {}", duplicates, col))
                }
                None => (false, None, format!("column {} not found", col)),
            },
        };

        RuleOutcome {
            rule: rule.to_string(),
            passed,
            observed,
            message,
        }
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        1.0
    } else {
        part as f64 / whole as f64
    }
}

impl QualityGate for RulesetQualityGate {
    fn evaluate(&self, frame: &Frame, context: &str, run_id: &str) -> DataQualityResult {
        let outcomes: Vec<RuleOutcome> = self
            .ruleset
            .rules
            .iter()
            .map(|rule| self.evaluate_rule(rule, frame))
            .collect();
        let passed = outcomes.iter().all(|o| o.passed);

        DataQualityResult {
            context: context.to_string(),
            run_id: run_id.to_string(),
            evaluated_at: Utc::now(),
            row_count: frame.row_count(),
            column_count: frame.column_count(),
            outcomes,
            passed,
        }
    }
}
