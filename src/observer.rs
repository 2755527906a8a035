use std::time::Duration;

use crate::classifier::ErrorCategory;
use crate::job::{Job, SkipReason};

/// Progress hooks fired while a batch runs. All methods default to no-ops.
///
/// Hooks are called from the processing task, between polls of the
/// in-flight jobs, so implementations must not block.
pub trait BatchObserver {
    fn on_group_start(&self, _group: usize, _total_groups: usize, _size: usize) {}

    fn on_retry(&self, _job: &Job, _attempt: u32, _category: ErrorCategory, _delay: Duration) {}

    /// `outcome` is one of `success`, `failed`, `timed_out`.
    fn on_job_finished(&self, _job: &Job, _outcome: &'static str, _duration: Duration) {}

    fn on_skipped(&self, _job: &Job, _reason: SkipReason) {}

    fn on_early_stop(&self, _failure_rate: f64, _remaining: usize) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl BatchObserver for NoopObserver {}
