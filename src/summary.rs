use serde::Serialize;

use crate::classifier::ErrorCategory;
use crate::job::ProcessingError;
use crate::metrics::Metrics;
use crate::processor::BatchRun;
use crate::quality::QualityAssessment;

/// One line per job that did not succeed.
#[derive(Debug, Clone, Serialize)]
pub struct FailureLine {
    pub job_id: String,
    pub job_title: String,
    pub outcome: &'static str,
    pub category: ErrorCategory,
    pub retry_count: u32,
    pub cause: String,
}

impl FailureLine {
    fn new(outcome: &'static str, err: &ProcessingError) -> Self {
        Self {
            job_id: err.job_id.clone(),
            job_title: err.job_title.clone(),
            outcome,
            category: err.category,
            retry_count: err.retry_count,
            cause: err.cause.clone(),
        }
    }
}

/// Serializable condensation of a [`BatchRun`], without the reports themselves.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub metrics: Metrics,
    pub assessment: QualityAssessment,
    pub failures: Vec<FailureLine>,
}

impl BatchSummary {
    pub fn from_run<R>(run: &BatchRun<R>) -> Self {
        let result = &run.result;
        let failures = result
            .failed
            .iter()
            .map(|e| FailureLine::new("failed", e))
            .chain(result.timed_out.iter().map(|e| FailureLine::new("timed_out", e)))
            .chain(result.skipped.iter().map(|e| FailureLine::new("skipped", e)))
            .collect();

        Self {
            metrics: result.metrics.clone(),
            assessment: run.assessment.clone(),
            failures,
        }
    }
}
