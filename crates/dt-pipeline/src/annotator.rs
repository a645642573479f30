//! Source-querying annotation stage.

use chrono::{DateTime, Utc};
use dt_core::{
    AnnotatedEvent, AuthorizationFlags, LocationSource, MotionSource, MotionType, PipelineError,
    TrackSource, Window, annotate, split_at,
};

use crate::segmenter::MotionSegmenter;

/// The merged event stream of one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Motion type in effect when the window starts, if known.
    pub initial_motion: Option<MotionType>,
    pub events: Vec<AnnotatedEvent>,
}

/// Queries all three sources concurrently and merges them.
pub struct EventAnnotator<'a, M, F, L, T> {
    segmenter: MotionSegmenter<'a, M, F>,
    location: &'a L,
    track: &'a T,
}

impl<'a, M, F, L, T> EventAnnotator<'a, M, F, L, T>
where
    M: MotionSource,
    F: AuthorizationFlags,
    L: LocationSource,
    T: TrackSource,
{
    pub const fn new(segmenter: MotionSegmenter<'a, M, F>, location: &'a L, track: &'a T) -> Self {
        Self {
            segmenter,
            location,
            track,
        }
    }

    /// Annotated events for `window`.
    ///
    /// Motion is queried from `motion_lookback` on to learn the motion type in
    /// effect at the window start. Any failing source fails the whole call.
    pub async fn annotate(
        &self,
        window: &Window,
        motion_lookback: DateTime<Utc>,
    ) -> Result<Annotation, PipelineError> {
        let (segments, locations, initial_location, tracks) = tokio::try_join!(
            self.segmenter.segments_with_lookback(window, motion_lookback),
            async {
                self.location
                    .locations(window.start, window.end)
                    .await
                    .map_err(PipelineError::from)
            },
            async {
                self.location
                    .last_known_location(window.start)
                    .await
                    .map_err(PipelineError::from)
            },
            async {
                self.track
                    .track_events(window.start, window.end)
                    .await
                    .map_err(PipelineError::from)
            },
        )?;

        let (initial_motion, segments) = split_at(segments, window.start);
        let events = annotate(&segments, &locations, &tracks, initial_location);
        tracing::debug!(
            segments = segments.len(),
            locations = locations.len(),
            tracks = tracks.len(),
            events = events.len(),
            "annotated window"
        );
        Ok(Annotation {
            initial_motion,
            events,
        })
    }
}
