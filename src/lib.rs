//! Resilient batch processing for failure-prone story analysis jobs.
//!
//! Jobs run in sequential groups of at most `max_concurrency`, each attempt
//! under its own deadline, with category-aware retries. Every job ends in
//! exactly one outcome (success, failed, timed out, skipped) and the whole
//! batch is judged by a [`QualityGate`].
//!
//! ```no_run
//! use storybatch::{Analyzer, CancelSignal, Job, ProcessingConfig, process_and_assess, NoopObserver};
//!
//! struct WordCount;
//!
//! impl Analyzer for WordCount {
//!     type Report = usize;
//!
//!     async fn analyze(&self, job: &Job, _cancel: CancelSignal) -> anyhow::Result<usize> {
//!         Ok(job.content.split_whitespace().count())
//!     }
//! }
//!
//! # async fn demo() -> Result<(), storybatch::BatchError> {
//! let jobs = vec![Job::new("First", "once upon a time")];
//! let run = process_and_assess(&jobs, ProcessingConfig::default(), &WordCount, &NoopObserver).await?;
//! if !run.assessment.acceptable {
//!     for rec in &run.assessment.recommendations {
//!         eprintln!("{rec}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod cli;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod observer;
pub mod processor;
pub mod quality;
pub mod retry;
pub mod runner;
pub mod simulate;
pub mod summary;
pub mod timeout;
pub mod ui;

pub use classifier::{ErrorCategory, ErrorClassifier};
pub use config::{ConfigFile, Preset, ProcessingConfig};
pub use error::{AnalysisError, BatchError};
pub use job::{Job, JobOutcome, JobRecord, ProcessingError, SkipReason, SuccessfulJob, load_jobs};
pub use metrics::{Metrics, MetricsCollector, Timings};
pub use observer::{BatchObserver, NoopObserver};
pub use processor::{BatchProcessor, BatchResult, BatchRun, process_and_assess, process_batch};
pub use quality::{QualityAssessment, QualityGate};
pub use retry::{RetryConfig, RetryDecision, RetryPolicy};
pub use runner::{Analyzer, JobRunner};
pub use timeout::{BatchDeadline, CancelSignal, TimeoutController};
