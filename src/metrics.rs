use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classifier::ErrorCategory;
use crate::job::{ProcessingError, SuccessfulJob};

/// Timing samples gathered while the batch ran.
#[derive(Debug, Clone, Default)]
pub struct Timings {
    /// One wall-clock duration per attempted job.
    pub per_job: Vec<Duration>,
    /// Wall time of the whole batch.
    pub total: Duration,
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_jobs: usize,
    pub attempted: usize,
    pub successful: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub total_time: Duration,
    pub mean_job_time: Duration,
    pub p95_job_time: Duration,
    pub success_rate: f64,
    pub timeout_rate: f64,
    /// Fraction of attempted jobs that needed at least one retry.
    pub retry_rate: f64,
    pub total_retries: u64,
    /// Failed and timed-out jobs by category.
    pub error_distribution: BTreeMap<ErrorCategory, usize>,
    /// Attempted jobs by retry count.
    pub retry_distribution: BTreeMap<u32, usize>,
}

pub struct MetricsCollector;

impl MetricsCollector {
    pub fn summarize<R>(
        successful: &[SuccessfulJob<R>],
        failed: &[ProcessingError],
        timed_out: &[ProcessingError],
        skipped: &[ProcessingError],
        timings: &Timings,
    ) -> Metrics {
        let attempted = successful.len() + failed.len() + timed_out.len();

        let mut error_distribution = BTreeMap::new();
        for err in failed.iter().chain(timed_out) {
            *error_distribution.entry(err.category).or_insert(0) += 1;
        }

        let retry_counts = successful
            .iter()
            .map(|s| s.retry_count)
            .chain(failed.iter().chain(timed_out).map(|e| e.retry_count));
        let mut retry_distribution = BTreeMap::new();
        let mut total_retries = 0u64;
        let mut retried_jobs = 0usize;
        for count in retry_counts {
            *retry_distribution.entry(count).or_insert(0) += 1;
            total_retries += u64::from(count);
            if count > 0 {
                retried_jobs += 1;
            }
        }

        Metrics {
            total_jobs: attempted + skipped.len(),
            attempted,
            successful: successful.len(),
            failed: failed.len(),
            timed_out: timed_out.len(),
            skipped: skipped.len(),
            total_time: timings.total,
            mean_job_time: mean(&timings.per_job),
            p95_job_time: percentile(&timings.per_job, 0.95),
            success_rate: ratio(successful.len(), attempted, 1.0),
            timeout_rate: ratio(timed_out.len(), attempted, 0.0),
            retry_rate: ratio(retried_jobs, attempted, 0.0),
            total_retries,
            error_distribution,
            retry_distribution,
        }
    }
}

fn ratio(part: usize, whole: usize, empty: f64) -> f64 {
    if whole == 0 {
        empty
    } else {
        part as f64 / whole as f64
    }
}

fn mean(samples: &[Duration]) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let total: Duration = samples.iter().sum();
    total / samples.len() as u32
}

/// Nearest-rank percentile.
fn percentile(samples: &[Duration], p: f64) -> Duration {
    if samples.is_empty() {
        return Duration::ZERO;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let rank = (p * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, SkipReason};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn success(id: &str, retry_count: u32) -> SuccessfulJob<()> {
        SuccessfulJob {
            job_id: id.into(),
            job_title: id.into(),
            output: (),
            retry_count,
            duration: ms(10),
        }
    }

    fn failure(id: &str, category: ErrorCategory, retry_count: u32) -> ProcessingError {
        ProcessingError::from_attempts(&Job::with_id(id, id, ""), category, "err".into(), retry_count)
    }

    #[test]
    fn empty_run() {
        let metrics = MetricsCollector::summarize::<()>(&[], &[], &[], &[], &Timings::default());
        assert_eq!(metrics.total_jobs, 0);
        assert_eq!(metrics.success_rate, 1.0);
        assert_eq!(metrics.timeout_rate, 0.0);
        assert_eq!(metrics.mean_job_time, Duration::ZERO);
        assert_eq!(metrics.p95_job_time, Duration::ZERO);
        assert!(metrics.error_distribution.is_empty());
    }

    #[test]
    fn rates_and_distributions() {
        let successful = vec![success("a", 0), success("b", 1), success("c", 0)];
        let failed = vec![
            failure("d", ErrorCategory::InvalidData, 0),
            failure("e", ErrorCategory::Network, 2),
        ];
        let timed_out = vec![failure("f", ErrorCategory::Timeout, 1)];
        let skipped = vec![ProcessingError::skipped(&Job::with_id("g", "g", ""), SkipReason::BatchDeadline)];
        let timings = Timings {
            per_job: (1..=6).map(|i| ms(i * 10)).collect(),
            total: ms(500),
        };

        let metrics = MetricsCollector::summarize(&successful, &failed, &timed_out, &skipped, &timings);

        assert_eq!(metrics.total_jobs, 7);
        assert_eq!(metrics.attempted, 6);
        assert_eq!(metrics.skipped, 1);
        assert!((metrics.success_rate - 0.5).abs() < 1e-9);
        assert!((metrics.timeout_rate - 1.0 / 6.0).abs() < 1e-9);
        assert!((metrics.retry_rate - 0.5).abs() < 1e-9);
        assert_eq!(metrics.total_retries, 4);
        assert_eq!(metrics.total_time, ms(500));
        assert_eq!(metrics.mean_job_time, ms(35));
        assert_eq!(metrics.p95_job_time, ms(60));
        assert_eq!(metrics.error_distribution[&ErrorCategory::InvalidData], 1);
        assert_eq!(metrics.error_distribution[&ErrorCategory::Timeout], 1);
        assert!(!metrics.error_distribution.contains_key(&ErrorCategory::Unknown));
        assert_eq!(metrics.retry_distribution[&0], 3);
        assert_eq!(metrics.retry_distribution[&1], 2);
        assert_eq!(metrics.retry_distribution[&2], 1);
    }

    #[test]
    fn p95_nearest_rank() {
        let samples: Vec<_> = (1..=20).map(ms).collect();
        assert_eq!(percentile(&samples, 0.95), ms(19));
        assert_eq!(percentile(&[ms(7)], 0.95), ms(7));
    }
}
