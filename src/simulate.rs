//! Simulated story analyzer used by the CLI.
//!
//! Produces a small text report and injects faults from markers in the job
//! title: `[timeout]`, `[flaky]`, `[ratelimit]`, `[quota]`, `[invalid]`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::job::Job;
use crate::runner::Analyzer;
use crate::timeout::CancelSignal;

const WORDS_PER_MINUTE: f64 = 200.0;

/// Languages the simulated analyzer accepts.
const SUPPORTED_LANGUAGES: &[&str] = &["en", "pt", "es", "fr", "de"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryReport {
    pub job_id: String,
    pub word_count: usize,
    pub sentence_count: usize,
    pub reading_time_secs: u64,
}

pub struct SimulatedAnalyzer {
    latency: Duration,
    min_words: usize,
    attempts: Mutex<HashMap<String, u32>>,
}

impl Default for SimulatedAnalyzer {
    fn default() -> Self {
        Self::new(Duration::from_millis(50), 10)
    }
}

impl SimulatedAnalyzer {
    pub fn new(latency: Duration, min_words: usize) -> Self {
        Self {
            latency,
            min_words,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn next_attempt(&self, job_id: &str) -> u32 {
        let mut attempts = self.attempts.lock().unwrap_or_else(|e| e.into_inner());
        let n = attempts.entry(job_id.to_string()).or_insert(0);
        *n += 1;
        *n
    }

    fn report(&self, job: &Job) -> Result<StoryReport, AnalysisError> {
        if let Some(language) = job.language.as_deref() {
            if !SUPPORTED_LANGUAGES.contains(&language.to_ascii_lowercase().as_str()) {
                return Err(AnalysisError::UnsupportedLanguage(language.to_string()));
            }
        }

        let word_count = job.content.split_whitespace().count();
        if word_count < self.min_words {
            return Err(AnalysisError::InsufficientContent {
                words: word_count,
                required: self.min_words,
            });
        }

        let sentence_count = job
            .content
            .split(['.', '!', '?'])
            .filter(|s| !s.trim().is_empty())
            .count();

        Ok(StoryReport {
            job_id: job.id.clone(),
            word_count,
            sentence_count,
            reading_time_secs: (word_count as f64 / WORDS_PER_MINUTE * 60.0).ceil() as u64,
        })
    }
}

impl Analyzer for SimulatedAnalyzer {
    type Report = StoryReport;

    async fn analyze(&self, job: &Job, cancel: CancelSignal) -> anyhow::Result<StoryReport> {
        let attempt = self.next_attempt(&job.id);
        let title = job.title.to_ascii_lowercase();

        if title.contains("[timeout]") {
            cancel.cancelled().await;
            return Err(AnalysisError::Cancelled.into());
        }

        tokio::select! {
            _ = tokio::time::sleep(self.latency) => {}
            _ = cancel.cancelled() => return Err(AnalysisError::Cancelled.into()),
        }

        if title.contains("[flaky]") && attempt == 1 {
            return Err(AnalysisError::Network("connection reset by peer".into()).into());
        }
        if title.contains("[ratelimit]") {
            return Err(AnalysisError::RateLimited {
                retry_after_ms: Some(1000),
            }
            .into());
        }
        if title.contains("[quota]") {
            return Err(AnalysisError::QuotaExceeded("monthly credits exhausted".into()).into());
        }
        if title.contains("[invalid]") {
            return Err(AnalysisError::InvalidData("story has no body".into()).into());
        }

        Ok(self.report(job)?)
    }
}

/// Synthetic stories for `storybatch demo`; every fifth job carries a fault marker.
pub fn demo_jobs(count: usize) -> Vec<Job> {
    const MARKERS: &[&str] = &["[flaky]", "[invalid]", "[timeout]", "[ratelimit]"];
    const BODY: &str = "The lighthouse keeper counted the ships every night. \
        None of them ever stopped. One winter a small boat came ashore with no crew. \
        She kept its lantern burning until spring.";

    (0..count)
        .map(|i| {
            let title = if i % 5 == 4 {
                format!("Story {} {}", i + 1, MARKERS[(i / 5) % MARKERS.len()])
            } else {
                format!("Story {}", i + 1)
            };
            Job::with_id(format!("story-{:03}", i + 1), title, BODY)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ErrorCategory, ErrorClassifier};
    use crate::timeout::TimeoutController;

    fn analyzer() -> SimulatedAnalyzer {
        SimulatedAnalyzer::new(Duration::from_millis(1), 5)
    }

    async fn run(analyzer: &SimulatedAnalyzer, job: &Job) -> anyhow::Result<StoryReport> {
        TimeoutController::run_attempt(Duration::from_millis(100), |cancel| analyzer.analyze(job, cancel))
            .await
            .map_err(|f| f.error)
    }

    #[tokio::test]
    async fn produces_report() {
        let job = Job::with_id("s1", "Plain", "One two three four five. Six seven!");
        let report = run(&analyzer(), &job).await.unwrap();
        assert_eq!(report.word_count, 7);
        assert_eq!(report.sentence_count, 2);
        assert_eq!(report.reading_time_secs, 3);
    }

    #[tokio::test]
    async fn short_content_is_insufficient() {
        let job = Job::with_id("s2", "Short", "Too few words");
        let err = run(&analyzer(), &job).await.unwrap_err();
        assert_eq!(ErrorClassifier::classify(&err), ErrorCategory::InsufficientContent);
    }

    #[tokio::test]
    async fn unsupported_language() {
        let job = Job::with_id("s3", "Klingon", "one two three four five six").language("tlh");
        let err = run(&analyzer(), &job).await.unwrap_err();
        assert_eq!(ErrorClassifier::classify(&err), ErrorCategory::UnsupportedLanguage);
    }

    #[tokio::test]
    async fn flaky_fails_only_first_attempt() {
        let analyzer = analyzer();
        let job = Job::with_id("s4", "Wobbly [flaky]", "one two three four five six");
        let err = run(&analyzer, &job).await.unwrap_err();
        assert_eq!(ErrorClassifier::classify(&err), ErrorCategory::Network);
        assert!(run(&analyzer, &job).await.is_ok());
    }

    #[tokio::test]
    async fn timeout_marker_waits_for_cancel() {
        let job = Job::with_id("s5", "Stuck [timeout]", "one two three four five six");
        let err = run(&analyzer(), &job).await.unwrap_err();
        assert_eq!(ErrorClassifier::classify(&err), ErrorCategory::Timeout);
    }

    #[test]
    fn demo_jobs_inject_markers() {
        let jobs = demo_jobs(10);
        assert_eq!(jobs.len(), 10);
        assert!(jobs[4].title.ends_with("[flaky]"));
        assert!(jobs[9].title.ends_with("[invalid]"));
        assert_eq!(jobs.iter().filter(|j| j.title.contains('[')).count(), 2);
    }
}
