use futures::future::join_all;
use tracing::{info, warn};

use crate::config::ProcessingConfig;
use crate::error::BatchError;
use crate::job::{Job, JobOutcome, JobRecord, ProcessingError, SkipReason, SuccessfulJob};
use crate::metrics::{Metrics, MetricsCollector, Timings};
use crate::observer::{BatchObserver, NoopObserver};
use crate::quality::{QualityAssessment, QualityGate};
use crate::runner::{Analyzer, JobRunner};
use crate::timeout::BatchDeadline;

/// Everything a run produced. The four sequences are disjoint, keep input
/// order, and together hold exactly one entry per submitted job.
#[derive(Debug, Clone)]
pub struct BatchResult<R> {
    pub successful: Vec<SuccessfulJob<R>>,
    pub failed: Vec<ProcessingError>,
    pub timed_out: Vec<ProcessingError>,
    pub skipped: Vec<ProcessingError>,
    pub metrics: Metrics,
}

impl<R> BatchResult<R> {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len() + self.timed_out.len() + self.skipped.len()
    }

    pub fn attempted(&self) -> usize {
        self.successful.len() + self.failed.len() + self.timed_out.len()
    }
}

/// A processed batch together with its quality verdict.
#[derive(Debug, Clone)]
pub struct BatchRun<R> {
    pub result: BatchResult<R>,
    pub assessment: QualityAssessment,
}

/// Outcomes folded in between groups. Lives only for one `process` call.
struct OutcomeSet<R> {
    successful: Vec<SuccessfulJob<R>>,
    failed: Vec<ProcessingError>,
    timed_out: Vec<ProcessingError>,
    skipped: Vec<ProcessingError>,
    per_job: Vec<std::time::Duration>,
}

impl<R> OutcomeSet<R> {
    fn new() -> Self {
        Self {
            successful: Vec::new(),
            failed: Vec::new(),
            timed_out: Vec::new(),
            skipped: Vec::new(),
            per_job: Vec::new(),
        }
    }

    fn record(&mut self, record: JobRecord<R>) {
        self.per_job.push(record.duration);
        match record.outcome {
            JobOutcome::Success(s) => self.successful.push(s),
            JobOutcome::Failed(e) => self.failed.push(e),
            JobOutcome::TimedOut(e) => self.timed_out.push(e),
            JobOutcome::Skipped(e) => self.skipped.push(e),
        }
    }

    fn attempted(&self) -> usize {
        self.successful.len() + self.failed.len() + self.timed_out.len()
    }

    fn failure_rate(&self) -> f64 {
        let attempted = self.attempted();
        if attempted == 0 {
            return 0.0;
        }
        (self.failed.len() + self.timed_out.len()) as f64 / attempted as f64
    }
}

/// Runs jobs in sequential, concurrency-bounded groups.
pub struct BatchProcessor {
    config: ProcessingConfig,
}

impl BatchProcessor {
    /// Validate `config` and build a processor for it.
    pub fn new(config: ProcessingConfig) -> Result<Self, BatchError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub async fn process<A: Analyzer>(&self, jobs: &[Job], analyzer: &A) -> BatchResult<A::Report> {
        self.process_observed(jobs, analyzer, &NoopObserver).await
    }

    /// Process `jobs`, reporting progress to `observer`.
    ///
    /// 1. Jobs are split into groups of `max_concurrency`, in input order.
    /// 2. Before a group starts, an exceeded batch deadline skips it and every later group.
    ///    Jobs already in flight finish their current attempt but are not retried.
    /// 3. All jobs of a group run concurrently; the group ends when all of them are terminal.
    /// 4. After a group, a failure rate above `max_failure_rate` (once more than
    ///    `early_stop_min_sample` jobs were attempted) skips the remaining jobs.
    pub async fn process_observed<A: Analyzer>(
        &self,
        jobs: &[Job],
        analyzer: &A,
        observer: &dyn BatchObserver,
    ) -> BatchResult<A::Report> {
        let deadline = BatchDeadline::start(self.config.batch_timeout());
        let groups: Vec<&[Job]> = jobs.chunks(self.config.max_concurrency).collect();
        let total_groups = groups.len();
        let runner = JobRunner::new(analyzer, &self.config, observer).with_deadline(&deadline);
        let mut outcomes = OutcomeSet::new();

        info!(
            jobs = jobs.len(),
            groups = total_groups,
            max_concurrency = self.config.max_concurrency,
            "starting batch"
        );

        for (index, group) in groups.iter().enumerate() {
            if deadline.exceeded() {
                let remaining = &groups[index..];
                warn!(
                    elapsed_ms = deadline.elapsed().as_millis() as u64,
                    skipped = remaining.iter().map(|g| g.len()).sum::<usize>(),
                    "batch deadline exceeded, skipping remaining groups"
                );
                skip_all(&mut outcomes, remaining, SkipReason::BatchDeadline, observer);
                break;
            }

            observer.on_group_start(index + 1, total_groups, group.len());
            info!(group = index + 1, total_groups, size = group.len(), "processing group");

            let records = join_all(group.iter().map(|job| runner.run(job))).await;
            for record in records {
                outcomes.record(record);
            }

            let remaining = &groups[index + 1..];
            if remaining.is_empty() {
                break;
            }
            let failure_rate = outcomes.failure_rate();
            if self.config.exceeds_failure_limit(failure_rate)
                && outcomes.attempted() > self.config.early_stop_min_sample
            {
                let count = remaining.iter().map(|g| g.len()).sum::<usize>();
                warn!(
                    failure_rate,
                    max_failure_rate = self.config.max_failure_rate,
                    attempted = outcomes.attempted(),
                    skipped = count,
                    "failure rate above limit, stopping early"
                );
                observer.on_early_stop(failure_rate, count);
                skip_all(&mut outcomes, remaining, SkipReason::FailureRateExceeded, observer);
                break;
            }
        }

        let timings = Timings {
            per_job: outcomes.per_job,
            total: deadline.elapsed(),
        };
        let metrics = MetricsCollector::summarize(
            &outcomes.successful,
            &outcomes.failed,
            &outcomes.timed_out,
            &outcomes.skipped,
            &timings,
        );

        info!(
            successful = metrics.successful,
            failed = metrics.failed,
            timed_out = metrics.timed_out,
            skipped = metrics.skipped,
            total_ms = metrics.total_time.as_millis() as u64,
            "batch finished"
        );

        BatchResult {
            successful: outcomes.successful,
            failed: outcomes.failed,
            timed_out: outcomes.timed_out,
            skipped: outcomes.skipped,
            metrics,
        }
    }
}

fn skip_all<R>(
    outcomes: &mut OutcomeSet<R>,
    groups: &[&[Job]],
    reason: SkipReason,
    observer: &dyn BatchObserver,
) {
    for job in groups.iter().flat_map(|g| g.iter()) {
        observer.on_skipped(job, reason);
        outcomes.skipped.push(ProcessingError::skipped(job, reason));
    }
}

/// Validate `config` and process `jobs` with it.
pub async fn process_batch<A: Analyzer>(
    jobs: &[Job],
    config: ProcessingConfig,
    analyzer: &A,
) -> Result<BatchResult<A::Report>, BatchError> {
    let processor = BatchProcessor::new(config)?;
    Ok(processor.process(jobs, analyzer).await)
}

/// Process `jobs` and run the quality gate over the result.
pub async fn process_and_assess<A: Analyzer>(
    jobs: &[Job],
    config: ProcessingConfig,
    analyzer: &A,
    observer: &dyn BatchObserver,
) -> Result<BatchRun<A::Report>, BatchError> {
    let processor = BatchProcessor::new(config)?;
    let result = processor.process_observed(jobs, analyzer, observer).await;
    let assessment = QualityGate::assess(&result, processor.config());
    Ok(BatchRun { result, assessment })
}
