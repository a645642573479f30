//! Source-querying motion segmentation stage.

use chrono::{DateTime, Utc};
use dt_core::{
    AuthorizationFlags, MotionActivitySegment, MotionError, MotionSource, PipelineError,
    SourceError, Window, segment_samples,
};

/// Queries the motion source for a window and folds the samples into
/// segments, recording whether the source could be queried.
pub struct MotionSegmenter<'a, M, F> {
    source: &'a M,
    flags: &'a F,
}

impl<'a, M, F> MotionSegmenter<'a, M, F>
where
    M: MotionSource,
    F: AuthorizationFlags,
{
    pub const fn new(source: &'a M, flags: &'a F) -> Self {
        Self { source, flags }
    }

    /// Segments covering `window`.
    ///
    /// Fails with [`MotionError::NotAvailable`] (as
    /// [`PipelineError::SourceUnavailable`]) when the source cannot be queried
    /// and with [`MotionError::NoActivities`] when nothing qualifies.
    pub async fn segments(&self, window: &Window) -> Result<Vec<MotionActivitySegment>, PipelineError> {
        let samples = match self.source.query(window.start, window.end).await {
            Ok(samples) => {
                self.record_authorization(true).await;
                samples
            }
            Err(SourceError::NotAvailable(_)) => {
                self.record_authorization(false).await;
                return Err(MotionError::NotAvailable.into());
            }
            Err(SourceError::Store(err)) => return Err(err.into()),
        };

        tracing::debug!(samples = samples.len(), "queried motion samples");
        Ok(segment_samples(&samples, window)?)
    }

    /// Segments of a query starting `lookback` earlier than `window`, so the
    /// motion already in effect at the window start is known.
    pub async fn segments_with_lookback(
        &self,
        window: &Window,
        lookback_start: DateTime<Utc>,
    ) -> Result<Vec<MotionActivitySegment>, PipelineError> {
        let query = Window {
            start: lookback_start.min(window.start),
            end: window.end,
        };
        self.segments(&query).await
    }

    async fn record_authorization(&self, authorized: bool) {
        // Side channel only: a failed write must not change the run outcome.
        if let Err(err) = self.flags.record_motion_authorization(authorized).await {
            tracing::warn!(%err, authorized, "failed to record motion authorization");
        }
    }
}
