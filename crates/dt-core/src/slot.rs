//! Slot types and the temporary-slot builder.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::parse::ParsedEvent;
use crate::types::{Category, Location, Window};

/// A persisted slot. The end is never stored; it is the next slot's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub category: Category,
    pub set_by_user: bool,
}

/// An in-pipeline slot candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporaryTimeSlot {
    pub start: DateTime<Utc>,
    /// `None` while the slot is still running.
    pub end: Option<DateTime<Utc>>,
    pub category: Category,
    pub set_by_user: bool,
    pub location: Option<Location>,
}

impl TemporaryTimeSlot {
    /// Duration of a closed slot; `None` for the running slot.
    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }

    pub const fn to_time_slot(&self) -> TimeSlot {
        TimeSlot {
            start: self.start,
            category: self.category,
            set_by_user: self.set_by_user,
        }
    }
}

/// A fully bounded slot as produced by the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub category: Category,
    pub set_by_user: bool,
}

impl Slot {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// How the last temporary slot ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotEnd {
    /// The last slot is still running (the window ends now).
    Open,
    /// The last slot is closed at the window end (a past day).
    Closed,
}

/// Attributes of the slot that is already running when the window starts.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SlotSeed {
    pub category: Category,
    pub set_by_user: bool,
}

impl From<&TimeSlot> for SlotSeed {
    fn from(slot: &TimeSlot) -> Self {
        Self {
            category: slot.category,
            set_by_user: slot.set_by_user,
        }
    }
}

/// Turns boundary events into a gapless slot sequence covering `window`.
///
/// The first slot starts at `window.start` with the seed's attributes. Each
/// event closes the current slot and opens the next at its timestamp; an
/// event at or before the current slot's start replaces that slot's
/// attributes instead, so no zero-length slot is ever produced. Events at or
/// after `window.end` are ignored.
pub fn build_temporary_slots(
    events: &[ParsedEvent],
    window: &Window,
    seed: SlotSeed,
    end: SlotEnd,
) -> Vec<TemporaryTimeSlot> {
    let mut slots = Vec::with_capacity(events.len() + 1);
    let mut current = TemporaryTimeSlot {
        start: window.start,
        end: None,
        category: seed.category,
        set_by_user: seed.set_by_user,
        location: None,
    };

    for event in events.iter().take_while(|e| e.timestamp < window.end) {
        if event.timestamp <= current.start {
            current.category = event.category;
            current.set_by_user = event.set_by_user;
            current.location = event.location;
            continue;
        }

        let next = TemporaryTimeSlot {
            start: event.timestamp,
            end: None,
            category: event.category,
            set_by_user: event.set_by_user,
            location: event.location,
        };
        let mut closed = std::mem::replace(&mut current, next);
        closed.end = Some(event.timestamp);
        slots.push(closed);
    }

    if end == SlotEnd::Closed {
        current.end = Some(window.end);
    }
    slots.push(current);
    slots
}
