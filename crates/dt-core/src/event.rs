//! Event annotation.
//!
//! Merges motion segments, location fixes and user track events into one
//! time-ordered stream. Each annotated event carries the motion and location
//! context in effect at its instant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::motion::MotionActivitySegment;
use crate::types::{Category, Location, MotionType, TrackAction};

/// A user-initiated tracking action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub timestamp: DateTime<Utc>,
    pub action: TrackAction,
    /// The category the action results in.
    pub category: Category,
}

/// Where an annotated event came from.
///
/// Declaration order is tie-break priority: at the same instant an explicit
/// user action sorts before a location fix, which sorts before a motion change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventSource {
    User,
    Location,
    Motion,
}

/// One entry of the merged signal stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedEvent {
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    /// Most recent location at or before this instant.
    pub location: Option<Location>,
    /// Motion type in effect at this instant.
    pub motion: Option<MotionType>,
    /// Present only for [`EventSource::User`] events.
    pub track: Option<TrackEvent>,
}

#[derive(Debug)]
struct PendingEvent {
    timestamp: DateTime<Utc>,
    source: EventSource,
    order: usize,
    location: Option<Location>,
    motion: Option<MotionType>,
    track: Option<TrackEvent>,
}

/// Merges the three sources into annotated events ordered by timestamp, then
/// source priority, then input order.
///
/// `initial_location` is the last fix known before the window and seeds the
/// location context of the earliest events. All events at one instant share
/// the context left by every fix and motion change at that instant.
pub fn annotate(
    segments: &[MotionActivitySegment],
    locations: &[Location],
    tracks: &[TrackEvent],
    initial_location: Option<Location>,
) -> Vec<AnnotatedEvent> {
    let mut pending = Vec::with_capacity(segments.len() + locations.len() + tracks.len());

    for segment in segments {
        pending.push(PendingEvent {
            timestamp: segment.start,
            source: EventSource::Motion,
            order: pending.len(),
            location: None,
            motion: Some(segment.motion),
            track: None,
        });
    }
    for location in locations {
        pending.push(PendingEvent {
            timestamp: location.timestamp,
            source: EventSource::Location,
            order: pending.len(),
            location: Some(*location),
            motion: None,
            track: None,
        });
    }
    for track in tracks {
        pending.push(PendingEvent {
            timestamp: track.timestamp,
            source: EventSource::User,
            order: pending.len(),
            location: None,
            motion: None,
            track: Some(*track),
        });
    }

    pending.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.source.cmp(&b.source))
            .then_with(|| a.order.cmp(&b.order))
    });

    let mut current_location = initial_location;
    let mut current_motion: Option<MotionType> = None;
    let mut annotated = Vec::with_capacity(pending.len());

    // Every update at one instant applies before any event there is emitted.
    for group in pending.chunk_by(|a, b| a.timestamp == b.timestamp) {
        for event in group {
            if event.location.is_some() {
                current_location = event.location;
            }
            if event.motion.is_some() {
                current_motion = event.motion;
            }
        }
        annotated.extend(group.iter().map(|event| AnnotatedEvent {
            timestamp: event.timestamp,
            source: event.source,
            location: current_location,
            motion: current_motion,
            track: event.track,
        }));
    }

    annotated
}
