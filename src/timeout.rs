//! Attempt and batch deadlines.
//!
//! Each attempt gets a fresh [`CancelSignal`]. When the attempt deadline
//! fires the signal is raised and the attempt future is dropped, so an
//! analyzer that ignores the signal is still treated as timed out.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::AnalysisError;

/// Cooperative cancellation signal handed to the analyzer for one attempt.
///
/// Once the owning attempt is over (deadline fired or attempt finished) the
/// signal reads as cancelled, so background work spawned by an analyzer
/// can use it to stop.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the attempt is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // A dropped sender means the attempt is over.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Sender half owned by the controller.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Failure of a single attempt.
#[derive(Debug)]
pub struct AttemptFailure {
    pub error: anyhow::Error,
    /// True when the local deadline cut the attempt off.
    pub deadline_hit: bool,
}

pub struct TimeoutController;

impl TimeoutController {
    /// Run one attempt under `limit`, measured from now.
    pub async fn run_attempt<T, F, Fut>(limit: Duration, attempt: F) -> Result<T, AttemptFailure>
    where
        F: FnOnce(CancelSignal) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let (handle, signal) = cancel_pair();
        match tokio::time::timeout(limit, attempt(signal)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(AttemptFailure {
                error,
                deadline_hit: false,
            }),
            Err(_) => {
                handle.cancel();
                Err(AttemptFailure {
                    error: anyhow::Error::new(AnalysisError::DeadlineExceeded {
                        limit_ms: limit.as_millis() as u64,
                    }),
                    deadline_hit: true,
                })
            }
        }
    }
}

/// Wall-clock budget for a whole batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchDeadline {
    started: Instant,
    limit: Duration,
}

impl BatchDeadline {
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn exceeded(&self) -> bool {
        self.elapsed() > self.limit
    }

    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }
}
