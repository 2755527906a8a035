use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::ErrorCategory;
use crate::error::BatchError;

/// A single story submitted for analysis. Read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default = "new_job_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn new_job_id() -> String {
    Uuid::new_v4().to_string()
}

impl Job {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: new_job_id(),
            title: title.into(),
            content: content.into(),
            language: None,
        }
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            language: None,
        }
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Why a job was never attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The batch deadline elapsed before the job's group started.
    BatchDeadline,
    /// The running failure rate crossed the configured limit.
    FailureRateExceeded,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::BatchDeadline => write!(f, "batch deadline exceeded before job started"),
            SkipReason::FailureRateExceeded => {
                write!(f, "batch stopped early: failure rate above limit")
            }
        }
    }
}

/// Terminal failure record for one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub category: ErrorCategory,
    pub retryable: bool,
    pub job_id: String,
    pub job_title: String,
    pub cause: String,
    pub timestamp: DateTime<Utc>,
    pub retry_count: u32,
    pub timeout_exceeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
}

impl ProcessingError {
    /// Failure after the job's final attempt.
    pub fn from_attempts(job: &Job, category: ErrorCategory, cause: String, retry_count: u32) -> Self {
        Self {
            category,
            retryable: category.is_retryable(),
            job_id: job.id.clone(),
            job_title: job.title.clone(),
            cause,
            timestamp: Utc::now(),
            retry_count,
            timeout_exceeded: category == ErrorCategory::Timeout,
            skip_reason: None,
        }
    }

    /// Record for a job the processor never started.
    pub fn skipped(job: &Job, reason: SkipReason) -> Self {
        let category = match reason {
            SkipReason::BatchDeadline => ErrorCategory::Timeout,
            SkipReason::FailureRateExceeded => ErrorCategory::Unknown,
        };
        Self {
            category,
            retryable: category.is_retryable(),
            job_id: job.id.clone(),
            job_title: job.title.clone(),
            cause: reason.to_string(),
            timestamp: Utc::now(),
            retry_count: 0,
            timeout_exceeded: reason == SkipReason::BatchDeadline,
            skip_reason: Some(reason),
        }
    }
}

/// A job that produced a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessfulJob<R> {
    pub job_id: String,
    pub job_title: String,
    pub output: R,
    pub retry_count: u32,
    pub duration: Duration,
}

/// Exactly one of these per job per run.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome<R> {
    Success(SuccessfulJob<R>),
    Failed(ProcessingError),
    TimedOut(ProcessingError),
    Skipped(ProcessingError),
}

impl<R> JobOutcome<R> {
    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Success(s) => &s.job_id,
            JobOutcome::Failed(e) | JobOutcome::TimedOut(e) | JobOutcome::Skipped(e) => &e.job_id,
        }
    }

    pub fn retry_count(&self) -> u32 {
        match self {
            JobOutcome::Success(s) => s.retry_count,
            JobOutcome::Failed(e) | JobOutcome::TimedOut(e) | JobOutcome::Skipped(e) => e.retry_count,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            JobOutcome::Success(_) => "success",
            JobOutcome::Failed(_) => "failed",
            JobOutcome::TimedOut(_) => "timed_out",
            JobOutcome::Skipped(_) => "skipped",
        }
    }
}

/// What a runner hands back: the outcome plus the timing sample.
#[derive(Debug, Clone)]
pub struct JobRecord<R> {
    pub outcome: JobOutcome<R>,
    pub attempts: u32,
    pub duration: Duration,
}

#[derive(Debug, Deserialize)]
struct JobFile {
    jobs: Vec<Job>,
}

/// Load jobs from a `.json` or `.toml` file.
///
/// JSON may be a bare array or `{ "jobs": [...] }`; TOML uses `[[jobs]]`.
pub fn load_jobs(path: &Path) -> Result<Vec<Job>, BatchError> {
    let contents = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let value: serde_json::Value = serde_json::from_str(&contents)?;
            if value.is_array() {
                Ok(serde_json::from_value(value)?)
            } else {
                Ok(serde_json::from_value::<JobFile>(value)?.jobs)
            }
        }
        "toml" => Ok(toml::from_str::<JobFile>(&contents)?.jobs),
        other => Err(BatchError::UnsupportedFormat(other.to_string())),
    }
}
