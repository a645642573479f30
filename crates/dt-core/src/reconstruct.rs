//! Read-path slot reconstruction.
//!
//! Stored slots carry no end time and are not split at midnight, so a day's
//! display-ready slots are derived from the stored starts: each slot ends
//! where the next one starts, the last one ends now (today) or at the end of
//! the day, and everything is cropped to the day.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::slot::{Slot, TimeSlot};

/// A calendar day as a half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBounds {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayBounds {
    /// Bounds of `date` from local midnight to the next local midnight in `tz`.
    pub fn for_date<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Self {
        let next = date + Duration::days(1);
        Self {
            date,
            start: local_midnight_to_utc(date, tz),
            end: local_midnight_to_utc(next, tz),
        }
    }

    /// Bounds of the day in `tz` that contains `instant`.
    pub fn containing<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> Self {
        Self::for_date(instant.with_timezone(tz).date_naive(), tz)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Storage range to fetch for this day: one extra day on each side so a
    /// slot that started before midnight is found.
    pub fn fetch_range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start - Duration::days(1), self.end + Duration::days(1))
    }
}

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn local_midnight_to_utc<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // DST spring-forward gap at midnight; 1am local exists instead.
            let one_am = midnight + Duration::hours(1);
            tz.from_local_datetime(&one_am)
                .earliest()
                .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
        }
    }
}

/// Builds the fully bounded slots of `day` from stored records.
///
/// `records` should cover [`DayBounds::fetch_range`]; order does not matter.
/// The chronologically last record ends at `now` when `day` contains it and
/// at the end of the day otherwise. Slots entirely outside the day are
/// dropped, the rest are cropped to the day, and slots left with no duration
/// are filtered out.
pub fn reconstruct_day(records: &[TimeSlot], day: &DayBounds, now: DateTime<Utc>) -> Vec<Slot> {
    let mut records = records.to_vec();
    records.sort_by_key(|r| r.start);
    records.dedup_by_key(|r| r.start);

    let mut next_start = if day.contains(now) { now } else { day.end };
    let mut slots = Vec::with_capacity(records.len());
    for record in records.iter().rev() {
        slots.push(Slot {
            start: record.start,
            end: next_start,
            category: record.category,
            set_by_user: record.set_by_user,
        });
        next_start = record.start;
    }
    slots.reverse();

    slots
        .into_iter()
        .filter(|slot| slot.end > day.start && slot.start < day.end)
        .map(|mut slot| {
            if slot.start < day.start {
                slot.start = day.start;
            }
            if slot.end > day.end {
                slot.end = day.end;
            }
            slot
        })
        .filter(|slot| slot.end > slot.start)
        .collect()
}
