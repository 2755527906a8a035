use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::ErrorCategory;
use crate::config::ProcessingConfig;
use crate::job::SkipReason;
use crate::processor::BatchResult;

/// Timeout rate above which raising the item deadline is suggested.
const TIMEOUT_RATE_WARNING: f64 = 0.1;

/// Failure rate margin under which a passing batch is still flagged as close.
const THRESHOLD_MARGIN: f64 = 0.05;

/// Accept/flag verdict for a processed batch. Not acceptable is a value,
/// never an error; the caller decides what to do with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub acceptable: bool,
    pub success_rate: f64,
    pub timeout_rate: f64,
    /// Jobs actually attempted (skipped jobs excluded).
    pub total_processed: usize,
    pub successful_count: usize,
    pub skipped_count: usize,
    pub recommendations: Vec<String>,
}

pub struct QualityGate;

impl QualityGate {
    pub fn assess<R>(result: &BatchResult<R>, config: &ProcessingConfig) -> QualityAssessment {
        let successful = result.successful.len();
        let timed_out = result.timed_out.len();
        let attempted = result.attempted();
        let skipped = result.skipped.len();

        let (success_rate, timeout_rate, failure_rate) = if attempted == 0 {
            (1.0, 0.0, 0.0)
        } else {
            (
                successful as f64 / attempted as f64,
                timed_out as f64 / attempted as f64,
                (result.failed.len() + timed_out) as f64 / attempted as f64,
            )
        };

        let required_rate = config.required_success_rate();
        let acceptable = if result.total() == 0 {
            true
        } else {
            !config.exceeds_failure_limit(failure_rate) && successful >= config.min_success_count
        };

        let recommendations = recommend(result, config, success_rate, timeout_rate, failure_rate);

        if acceptable {
            info!(success_rate, successful, attempted, "batch accepted");
        } else {
            warn!(
                success_rate,
                required_rate,
                successful,
                min_success_count = config.min_success_count,
                "batch flagged by quality gate"
            );
        }

        QualityAssessment {
            acceptable,
            success_rate,
            timeout_rate,
            total_processed: attempted,
            successful_count: successful,
            skipped_count: skipped,
            recommendations,
        }
    }
}

fn recommend<R>(
    result: &BatchResult<R>,
    config: &ProcessingConfig,
    success_rate: f64,
    timeout_rate: f64,
    failure_rate: f64,
) -> Vec<String> {
    let mut out = Vec::new();
    if result.total() == 0 {
        return out;
    }

    let required_rate = config.required_success_rate();
    let distribution = &result.metrics.error_distribution;
    let dominant = distribution
        .iter()
        .max_by_key(|&(_, count)| *count)
        .map(|(&category, &count)| (category, count));
    let count_of = |c: ErrorCategory| distribution.get(&c).copied().unwrap_or(0);

    if timeout_rate > TIMEOUT_RATE_WARNING {
        out.push(format!(
            "Timeout rate is {:.0}%; consider raising item_timeout_ms (currently {}ms) or timeout_retries.",
            timeout_rate * 100.0,
            config.item_timeout_ms
        ));
    }

    if config.exceeds_failure_limit(failure_rate) {
        let detail = dominant
            .map(|(category, count)| format!(" Most failures are `{category}` ({count})."))
            .unwrap_or_default();
        out.push(format!(
            "Success rate {:.0}% is below the required {:.0}%.{detail}",
            success_rate * 100.0,
            required_rate * 100.0
        ));
    } else if result.attempted() > 0
        && config.max_failure_rate - failure_rate < THRESHOLD_MARGIN
        && failure_rate > 0.0
    {
        out.push(format!(
            "Success rate {:.0}% is within {:.0} points of the required {:.0}%.",
            success_rate * 100.0,
            THRESHOLD_MARGIN * 100.0,
            required_rate * 100.0
        ));
    }

    if result.successful.len() < config.min_success_count {
        out.push(format!(
            "Only {} successful jobs, {} required; submit more jobs or lower min_success_count.",
            result.successful.len(),
            config.min_success_count
        ));
    }

    let deadline_skips = result
        .skipped
        .iter()
        .filter(|e| e.skip_reason == Some(SkipReason::BatchDeadline))
        .count();
    if deadline_skips > 0 {
        out.push(format!(
            "{deadline_skips} jobs were skipped by the batch deadline; raise batch_timeout_ms (currently {}ms) or split the batch.",
            config.batch_timeout_ms
        ));
    }
    let early_stop_skips = result.skipped.len() - deadline_skips;
    if early_stop_skips > 0 {
        out.push(format!(
            "{early_stop_skips} jobs were skipped after the failure rate exceeded {:.0}%; fix the dominant failure before resubmitting them.",
            config.max_failure_rate * 100.0
        ));
    }

    if count_of(ErrorCategory::RateLimit) + count_of(ErrorCategory::QuotaExceeded) > 0 {
        out.push(format!(
            "Rate-limit or quota errors occurred; lower max_concurrency (currently {}) or raise retry_delay_ms.",
            config.max_concurrency
        ));
    }

    if count_of(ErrorCategory::Network) + count_of(ErrorCategory::ServiceUnavailable) > 0 {
        out.push("Network or service-unavailable errors occurred; check upstream availability.".to_string());
    }

    let input_errors = count_of(ErrorCategory::InvalidData)
        + count_of(ErrorCategory::ParsingError)
        + count_of(ErrorCategory::InsufficientContent)
        + count_of(ErrorCategory::UnsupportedLanguage);
    if input_errors > 0 {
        out.push(format!(
            "{input_errors} jobs failed with non-retryable input errors; review the source stories."
        ));
    }

    out
}
