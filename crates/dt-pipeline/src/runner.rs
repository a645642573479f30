//! Run serialization and trigger coalescing.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dt_core::PipelineError;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Handle for requesting a pipeline run.
#[derive(Debug, Clone)]
pub struct RunTrigger {
    notify: Arc<Notify>,
}

impl RunTrigger {
    /// Requests a run. Requests made while a run is in flight collapse into
    /// a single follow-up run.
    pub fn trigger(&self) {
        self.notify.notify_one();
    }
}

/// Outcome counts of a runner's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    pub succeeded: usize,
    pub failed: usize,
}

/// Executes runs one at a time as triggers arrive.
///
/// A run is never interrupted: cancellation is only observed between runs.
pub struct PipelineRunner<F> {
    run: F,
    notify: Arc<Notify>,
    cancel: CancellationToken,
}

impl<F, Fut, R> PipelineRunner<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, PipelineError>>,
    R: fmt::Debug,
{
    pub fn new(run: F, cancel: CancellationToken) -> Self {
        Self {
            run,
            notify: Arc::new(Notify::new()),
            cancel,
        }
    }

    pub fn trigger(&self) -> RunTrigger {
        RunTrigger {
            notify: Arc::clone(&self.notify),
        }
    }

    /// Waits for triggers and runs until cancelled.
    pub async fn serve(mut self) -> RunnerStats {
        let mut stats = RunnerStats::default();
        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    tracing::debug!("pipeline runner shutting down");
                    break;
                }
                () = self.notify.notified() => {}
            }

            match (self.run)().await {
                Ok(report) => {
                    stats.succeeded += 1;
                    tracing::debug!(?report, "pipeline run finished");
                }
                Err(PipelineError::SourceUnavailable(kind)) => {
                    stats.failed += 1;
                    tracing::warn!(%kind, "source unavailable, run skipped");
                }
                Err(err) => {
                    stats.failed += 1;
                    tracing::warn!(%err, "pipeline run failed");
                }
            }
        }
        stats
    }
}
