//! Boundary detection.
//!
//! Reduces the annotated stream to the events that open a new slot: a user
//! action, a change of motion type, or a move away from the anchor location
//! beyond the hysteresis distance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::AnnotatedEvent;
use crate::types::{Category, Location, MotionType, TrackAction};

/// Configuration for boundary detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Distance in meters a fix must be from the current anchor before it
    /// counts as a location change. Default: 150.
    pub location_hysteresis_m: f64,
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            location_hysteresis_m: 150.0,
        }
    }
}

/// Why a boundary was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryKind {
    UserAction(TrackAction),
    MotionChanged(MotionType),
    LocationChanged,
}

/// A slot boundary and the attributes of the slot it opens.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: BoundaryKind,
    pub category: Category,
    pub set_by_user: bool,
    pub location: Option<Location>,
}

/// Extracts boundary events from a time-ordered annotated stream.
///
/// Events sharing a timestamp collapse into at most one boundary. The stream
/// is ordered by source priority within an instant, so a user action at that
/// instant decides the boundary; motion and location only contribute context.
///
/// `initial_motion` is the motion type already in effect when the stream
/// starts. A first motion event of the same type is not a change.
pub fn parse_events(
    events: &[AnnotatedEvent],
    initial_motion: Option<MotionType>,
    config: &ParseConfig,
) -> Vec<ParsedEvent> {
    let mut parsed = Vec::new();
    let mut last_motion = initial_motion;
    let mut anchor: Option<Location> = None;

    for group in events.chunk_by(|a, b| a.timestamp == b.timestamp) {
        let Some(latest) = group.last() else {
            continue;
        };
        let timestamp = latest.timestamp;
        let location = latest.location;
        let motion = latest.motion;

        let user = group.iter().find_map(|e| e.track);
        let motion_changed = motion.is_some() && motion != last_motion;
        let moved = match (anchor, location) {
            (Some(a), Some(l)) => a.distance_m(&l) > config.location_hysteresis_m,
            _ => false,
        };
        if anchor.is_none() {
            anchor = location;
        }
        if motion.is_some() {
            last_motion = motion;
        }

        let boundary = if let Some(track) = user {
            let set_by_user = track.action.sets_category();
            Some(ParsedEvent {
                timestamp,
                kind: BoundaryKind::UserAction(track.action),
                category: if set_by_user {
                    track.category
                } else {
                    Category::Unknown
                },
                set_by_user,
                location,
            })
        } else if let (true, Some(motion)) = (motion_changed, motion) {
            Some(ParsedEvent {
                timestamp,
                kind: BoundaryKind::MotionChanged(motion),
                category: motion.implied_category(),
                set_by_user: false,
                location,
            })
        } else if moved {
            Some(ParsedEvent {
                timestamp,
                kind: BoundaryKind::LocationChanged,
                category: last_motion.map_or(Category::Unknown, MotionType::implied_category),
                set_by_user: false,
                location,
            })
        } else {
            None
        };

        if let Some(boundary) = boundary {
            if boundary.location.is_some() {
                anchor = boundary.location;
            }
            parsed.push(boundary);
        }
    }

    tracing::debug!(
        annotated = events.len(),
        boundaries = parsed.len(),
        "parsed boundary events"
    );
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventSource, TrackEvent};
    use chrono::TimeZone;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    fn place(minutes: i64, latitude: f64) -> Location {
        Location::new(ts(minutes), latitude, 13.0).unwrap()
    }

    fn motion_event(minutes: i64, motion: MotionType, location: Option<Location>) -> AnnotatedEvent {
        AnnotatedEvent {
            timestamp: ts(minutes),
            source: EventSource::Motion,
            location,
            motion: Some(motion),
            track: None,
        }
    }

    fn location_event(minutes: i64, location: Location, motion: Option<MotionType>) -> AnnotatedEvent {
        AnnotatedEvent {
            timestamp: ts(minutes),
            source: EventSource::Location,
            location: Some(location),
            motion,
            track: None,
        }
    }

    fn user_event(minutes: i64, action: TrackAction, category: Category) -> AnnotatedEvent {
        AnnotatedEvent {
            timestamp: ts(minutes),
            source: EventSource::User,
            location: None,
            motion: None,
            track: Some(TrackEvent {
                timestamp: ts(minutes),
                action,
                category,
            }),
        }
    }

    #[test]
    fn motion_changes_are_boundaries() {
        let events = vec![
            motion_event(0, MotionType::Still, None),
            motion_event(30, MotionType::Auto, None),
            motion_event(50, MotionType::Still, None),
        ];

        let parsed = parse_events(&events, None, &ParseConfig::default());

        let kinds: Vec<_> = parsed.iter().map(|p| (p.timestamp, p.category)).collect();
        assert_eq!(
            kinds,
            vec![
                (ts(0), Category::Unknown),
                (ts(30), Category::Commute),
                (ts(50), Category::Unknown),
            ]
        );
    }

    #[test]
    fn small_moves_stay_within_hysteresis() {
        let home = place(0, 52.0);
        let events = vec![
            motion_event(0, MotionType::Still, Some(home)),
            // ~55m away
            location_event(10, place(10, 52.0005), Some(MotionType::Still)),
            // ~111m from the anchor, still inside 150m
            location_event(20, place(20, 52.001), Some(MotionType::Still)),
        ];

        let parsed = parse_events(&events, None, &ParseConfig::default());

        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn large_move_opens_a_boundary() {
        let home = place(0, 52.0);
        let events = vec![
            motion_event(0, MotionType::Still, Some(home)),
            // ~1.1km away
            location_event(40, place(40, 52.01), Some(MotionType::Still)),
        ];

        let parsed = parse_events(&events, None, &ParseConfig::default());

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].kind, BoundaryKind::LocationChanged);
        assert_eq!(parsed[1].location.map(|l| l.latitude), Some(52.01));
    }

    #[test]
    fn user_action_dominates_same_instant() {
        let events = vec![
            user_event(0, TrackAction::SetCategory, Category::Work),
            motion_event(0, MotionType::Auto, None),
        ];

        let parsed = parse_events(&events, None, &ParseConfig::default());

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kind, BoundaryKind::UserAction(TrackAction::SetCategory));
        assert_eq!(parsed[0].category, Category::Work);
        assert!(parsed[0].set_by_user);
    }

    #[test]
    fn motion_seen_with_user_action_is_not_repeated_later() {
        let events = vec![
            user_event(0, TrackAction::SetCategory, Category::Work),
            motion_event(0, MotionType::Still, None),
            location_event(5, place(5, 52.0), Some(MotionType::Still)),
        ];

        let parsed = parse_events(&events, None, &ParseConfig::default());

        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn stop_tracking_opens_an_inferred_slot() {
        let events = vec![user_event(0, TrackAction::StopTracking, Category::Work)];

        let parsed = parse_events(&events, None, &ParseConfig::default());

        assert_eq!(parsed[0].category, Category::Unknown);
        assert!(!parsed[0].set_by_user);
    }

    #[test]
    fn motion_in_effect_before_the_stream_is_not_a_change() {
        let events = vec![
            motion_event(15, MotionType::Still, None),
            motion_event(40, MotionType::Walk, None),
        ];

        let parsed = parse_events(&events, Some(MotionType::Still), &ParseConfig::default());

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].timestamp, ts(40));
        assert_eq!(parsed[0].category, Category::Commute);
    }
}
