use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::classifier::{ErrorCategory, ErrorClassifier};
use crate::config::ProcessingConfig;
use crate::job::{Job, JobOutcome, JobRecord, ProcessingError, SuccessfulJob};
use crate::observer::BatchObserver;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::timeout::{BatchDeadline, CancelSignal, TimeoutController};

/// The analysis capability supplied by the caller. Invoked once per attempt.
///
/// Implementations should watch `cancel` and return promptly once it fires;
/// the runner treats an attempt past its deadline as timed out either way.
#[allow(async_fn_in_trait)]
pub trait Analyzer {
    type Report;

    async fn analyze(&self, job: &Job, cancel: CancelSignal) -> anyhow::Result<Self::Report>;
}

/// Drives a single job through its attempts until it reaches a terminal outcome.
pub struct JobRunner<'a, A> {
    analyzer: &'a A,
    config: &'a ProcessingConfig,
    observer: &'a dyn BatchObserver,
    deadline: Option<&'a BatchDeadline>,
}

impl<'a, A: Analyzer> JobRunner<'a, A> {
    pub fn new(analyzer: &'a A, config: &'a ProcessingConfig, observer: &'a dyn BatchObserver) -> Self {
        Self {
            analyzer,
            config,
            observer,
            deadline: None,
        }
    }

    /// Stop retrying once `deadline` has passed. The attempt in flight still
    /// runs to its own item deadline.
    pub fn with_deadline(mut self, deadline: &'a BatchDeadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn batch_deadline_passed(&self) -> bool {
        self.deadline.is_some_and(BatchDeadline::exceeded)
    }

    /// Run `job` to completion. Failures come back as data, never as `Err`.
    pub async fn run(&self, job: &Job) -> JobRecord<A::Report> {
        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            debug!(job_id = %job.id, attempt = attempts, "starting attempt");

            let attempt = TimeoutController::run_attempt(self.config.item_timeout(), |cancel| {
                self.analyzer.analyze(job, cancel)
            })
            .await;

            let failure = match attempt {
                Ok(output) => {
                    let duration = started.elapsed();
                    self.observer.on_job_finished(job, "success", duration);
                    return JobRecord {
                        outcome: JobOutcome::Success(SuccessfulJob {
                            job_id: job.id.clone(),
                            job_title: job.title.clone(),
                            output,
                            retry_count: attempts - 1,
                            duration,
                        }),
                        attempts,
                        duration,
                    };
                }
                Err(failure) => failure,
            };

            let category = if failure.deadline_hit {
                ErrorCategory::Timeout
            } else {
                ErrorClassifier::classify(&failure.error)
            };

            let decision = match RetryPolicy::next(category, attempts, &self.config.retry) {
                RetryDecision::Retry { .. } if self.batch_deadline_passed() => {
                    warn!(job_id = %job.id, attempt = attempts, %category, "batch deadline passed, not retrying");
                    RetryDecision::GiveUp
                }
                decision => decision,
            };

            match decision {
                RetryDecision::Retry { delay } => {
                    warn!(
                        job_id = %job.id,
                        attempt = attempts,
                        %category,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.error,
                        "attempt failed, retrying"
                    );
                    self.observer.on_retry(job, attempts, category, delay);
                    sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    let duration = started.elapsed();
                    let error = ProcessingError::from_attempts(
                        job,
                        category,
                        format!("{:#}", failure.error),
                        attempts - 1,
                    );
                    warn!(
                        job_id = %job.id,
                        attempts,
                        %category,
                        error = %error.cause,
                        "giving up on job"
                    );
                    let outcome = if category == ErrorCategory::Timeout {
                        JobOutcome::TimedOut(error)
                    } else {
                        JobOutcome::Failed(error)
                    };
                    self.observer.on_job_finished(job, outcome.label(), duration);
                    return JobRecord {
                        outcome,
                        attempts,
                        duration,
                    };
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::observer::NoopObserver;
    use crate::retry::RetryConfig;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with the scripted errors in order, then succeeds.
    struct ScriptedAnalyzer {
        calls: AtomicU32,
        failures: Mutex<VecDeque<AnalysisError>>,
        hang: bool,
    }

    impl ScriptedAnalyzer {
        fn new(failures: impl IntoIterator<Item = AnalysisError>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures: Mutex::new(failures.into_iter().collect()),
                hang: false,
            }
        }

        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::new([])
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Analyzer for ScriptedAnalyzer {
        type Report = String;

        async fn analyze(&self, job: &Job, _cancel: CancelSignal) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            let next = self.failures.lock().unwrap().pop_front();
            match next {
                Some(err) => Err(err.into()),
                None => Ok(format!("report for {}", job.id)),
            }
        }
    }

    fn test_config(max_retries: u32, timeout_retries: u32) -> ProcessingConfig {
        ProcessingConfig {
            item_timeout_ms: 50,
            retry: RetryConfig {
                max_retries,
                timeout_retries,
                retry_delay_ms: 1,
            },
            ..ProcessingConfig::default()
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let analyzer = ScriptedAnalyzer::new([]);
        let config = test_config(2, 1);
        let job = Job::with_id("s1", "Story", "text");

        let record = JobRunner::new(&analyzer, &config, &NoopObserver).run(&job).await;

        assert_eq!(record.attempts, 1);
        match record.outcome {
            JobOutcome::Success(s) => {
                assert_eq!(s.output, "report for s1");
                assert_eq!(s.retry_count, 0);
            }
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retryable_failure_then_success() {
        let analyzer = ScriptedAnalyzer::new([
            AnalysisError::Network("reset".into()),
            AnalysisError::Http {
                status: 503,
                message: "down".into(),
            },
        ]);
        let config = test_config(2, 1);
        let job = Job::with_id("s2", "Story", "text");

        let record = JobRunner::new(&analyzer, &config, &NoopObserver).run(&job).await;

        assert_eq!(analyzer.calls(), 3);
        assert!(matches!(record.outcome, JobOutcome::Success(ref s) if s.retry_count == 2));
    }

    #[tokio::test]
    async fn retryable_failure_exhausts_max_retries() {
        let analyzer = ScriptedAnalyzer::new(
            (0..10).map(|_| AnalysisError::RateLimited { retry_after_ms: None }),
        );
        let config = test_config(2, 5);
        let job = Job::with_id("s3", "Story", "text");

        let record = JobRunner::new(&analyzer, &config, &NoopObserver).run(&job).await;

        assert_eq!(analyzer.calls(), 3);
        match record.outcome {
            JobOutcome::Failed(e) => {
                assert_eq!(e.category, ErrorCategory::RateLimit);
                assert_eq!(e.retry_count, 2);
                assert!(e.retryable);
                assert!(!e.timeout_exceeded);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_failure_is_not_retried() {
        let analyzer = ScriptedAnalyzer::new([AnalysisError::InvalidData("empty".into())]);
        let config = test_config(3, 3);
        let job = Job::with_id("s4", "Story", "text");

        let record = JobRunner::new(&analyzer, &config, &NoopObserver).run(&job).await;

        assert_eq!(analyzer.calls(), 1);
        assert!(matches!(
            record.outcome,
            JobOutcome::Failed(ref e) if e.category == ErrorCategory::InvalidData && e.retry_count == 0
        ));
    }

    #[tokio::test]
    async fn hanging_analyzer_times_out_after_timeout_retries() {
        let analyzer = ScriptedAnalyzer::hanging();
        let config = test_config(5, 1);
        let job = Job::with_id("s5", "Story", "text");

        let record = JobRunner::new(&analyzer, &config, &NoopObserver).run(&job).await;

        assert_eq!(analyzer.calls(), 2);
        assert_eq!(record.attempts, 2);
        assert!(record.duration >= Duration::from_millis(100));
        match record.outcome {
            JobOutcome::TimedOut(e) => {
                assert_eq!(e.category, ErrorCategory::Timeout);
                assert_eq!(e.retry_count, 1);
                assert!(e.timeout_exceeded);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_retry_after_batch_deadline() {
        let analyzer = ScriptedAnalyzer::new((0..3).map(|_| AnalysisError::Network("reset".into())));
        let config = test_config(3, 1);
        let job = Job::with_id("s7", "Story", "text");
        let deadline = BatchDeadline::start(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;

        let record = JobRunner::new(&analyzer, &config, &NoopObserver)
            .with_deadline(&deadline)
            .run(&job)
            .await;

        assert_eq!(analyzer.calls(), 1);
        assert_eq!(record.attempts, 1);
        match record.outcome {
            JobOutcome::Failed(e) => {
                assert_eq!(e.category, ErrorCategory::Network);
                assert_eq!(e.retry_count, 0);
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn analyzer_reported_timeout_is_timed_out() {
        let analyzer = ScriptedAnalyzer::new((0..4).map(|_| AnalysisError::Cancelled));
        let config = test_config(5, 0);
        let job = Job::with_id("s6", "Story", "text");

        let record = JobRunner::new(&analyzer, &config, &NoopObserver).run(&job).await;

        assert_eq!(analyzer.calls(), 1);
        assert!(matches!(record.outcome, JobOutcome::TimedOut(_)));
    }
}
