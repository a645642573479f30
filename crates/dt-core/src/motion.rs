//! Motion segmentation.
//!
//! Folds raw classifier samples into contiguous activity segments. Motion type
//! is the partition key: consecutive samples of the same type only extend the
//! running segment, whatever their density.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::MotionError;
use crate::types::{ConfidenceTier, MotionType, Window};

/// A single classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMotionSample {
    pub timestamp: DateTime<Utc>,
    pub motion: MotionType,
    pub confidence: ConfidenceTier,
}

impl RawMotionSample {
    pub const fn new(timestamp: DateTime<Utc>, motion: MotionType, confidence: ConfidenceTier) -> Self {
        Self {
            timestamp,
            motion,
            confidence,
        }
    }
}

/// A contiguous span of one classified motion type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionActivitySegment {
    pub motion: MotionType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Segments the samples of a query window.
///
/// Low-confidence samples are dropped before folding, so they never create a
/// boundary. The last segment always ends at `window.end`, not at the last
/// sample, so the segments cover the window from the first qualifying sample on.
///
/// Returns [`MotionError::NoActivities`] when no sample in the window qualifies.
pub fn segment_samples(
    samples: &[RawMotionSample],
    window: &Window,
) -> Result<Vec<MotionActivitySegment>, MotionError> {
    let mut qualifying: Vec<&RawMotionSample> = samples
        .iter()
        .filter(|s| s.confidence.qualifies())
        .filter(|s| s.timestamp >= window.start && s.timestamp <= window.end)
        .collect();
    qualifying.sort_by_key(|s| s.timestamp);

    let mut segments: Vec<MotionActivitySegment> = Vec::new();
    for sample in qualifying {
        match segments.last_mut() {
            Some(last) if last.motion == sample.motion => {
                last.end = sample.timestamp;
            }
            Some(last) => {
                last.end = sample.timestamp;
                segments.push(MotionActivitySegment {
                    motion: sample.motion,
                    start: sample.timestamp,
                    end: sample.timestamp,
                });
            }
            None => segments.push(MotionActivitySegment {
                motion: sample.motion,
                start: sample.timestamp,
                end: sample.timestamp,
            }),
        }
    }

    let Some(last) = segments.last_mut() else {
        return Err(MotionError::NoActivities);
    };
    last.end = window.end;

    tracing::debug!(segments = segments.len(), "segmented motion samples");
    Ok(segments)
}

/// Splits segments at `instant`.
///
/// Returns the motion type in effect at `instant` from segments that started
/// before it, and the segments starting at or after it.
pub fn split_at(
    segments: Vec<MotionActivitySegment>,
    instant: DateTime<Utc>,
) -> (Option<MotionType>, Vec<MotionActivitySegment>) {
    let (before, after): (Vec<_>, Vec<_>) = segments.into_iter().partition(|s| s.start < instant);
    let in_effect = before.iter().max_by_key(|s| s.start).map(|s| s.motion);
    (in_effect, after)
}
