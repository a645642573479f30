//! Timeline smoothing.
//!
//! Merges adjacent slots that share a category and folds slots shorter than
//! the minimum duration into a neighbor, suppressing transient noise from
//! motion misclassification.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::slot::TemporaryTimeSlot;

/// Which neighbor absorbs a short slot sitting between two slots of
/// different categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// The preceding slot represents already-committed activity.
    #[default]
    PreferPreceding,
    PreferFollowing,
}

/// Configuration for timeline smoothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Closed, inferred slots shorter than this are merged into a neighbor.
    /// Default: 300,000 (5 min).
    pub min_slot_duration_ms: i64,

    /// Tie-break between two differently categorized neighbors.
    pub merge_policy: MergePolicy,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            min_slot_duration_ms: 300_000, // 5 minutes
            merge_policy: MergePolicy::PreferPreceding,
        }
    }
}

/// Smooths a gapless temporary-slot sequence.
///
/// User-set slots are never absorbed and the running slot is never
/// considered short. The output is still gapless and covers the same range.
pub fn process_timeline(
    slots: Vec<TemporaryTimeSlot>,
    config: &TimelineConfig,
) -> Vec<TemporaryTimeSlot> {
    let min_duration = Duration::milliseconds(config.min_slot_duration_ms);
    let input_len = slots.len();
    let mut slots = merge_same_category(slots);

    while slots.len() > 1 {
        let Some(index) = slots.iter().position(|s| is_noise(s, min_duration)) else {
            break;
        };
        absorb(&mut slots, index, config.merge_policy);
        slots = merge_same_category(slots);
    }

    tracing::debug!(
        before = input_len,
        after = slots.len(),
        "smoothed timeline"
    );
    slots
}

fn is_noise(slot: &TemporaryTimeSlot, min_duration: Duration) -> bool {
    !slot.set_by_user && slot.duration().is_some_and(|d| d < min_duration)
}

/// Removes the slot at `index`, extending a neighbor over its interval.
fn absorb(slots: &mut Vec<TemporaryTimeSlot>, index: usize, policy: MergePolicy) {
    let has_prev = index > 0;
    let has_next = index + 1 < slots.len();

    let into_prev = match (has_prev, has_next) {
        (true, true) => {
            slots[index - 1].category == slots[index + 1].category
                || policy == MergePolicy::PreferPreceding
        }
        (true, false) => true,
        (false, true) => false,
        (false, false) => return,
    };

    let short = slots.remove(index);
    if into_prev {
        slots[index - 1].end = short.end;
    } else {
        slots[index].start = short.start;
    }
}

/// Joins neighbors that share a category and were both set by the user or
/// both inferred.
fn merge_same_category(slots: Vec<TemporaryTimeSlot>) -> Vec<TemporaryTimeSlot> {
    let mut merged: Vec<TemporaryTimeSlot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last_mut() {
            Some(last)
                if last.category == slot.category && last.set_by_user == slot.set_by_user =>
            {
                last.end = slot.end;
                if last.location.is_none() {
                    last.location = slot.location;
                }
            }
            _ => merged.push(slot),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    fn slot(start: i64, end: Option<i64>, category: Category) -> TemporaryTimeSlot {
        TemporaryTimeSlot {
            start: ts(start),
            end: end.map(ts),
            category,
            set_by_user: false,
            location: None,
        }
    }

    fn summary(slots: &[TemporaryTimeSlot]) -> Vec<(DateTime<Utc>, Category)> {
        slots.iter().map(|s| (s.start, s.category)).collect()
    }

    #[test]
    fn adjacent_same_category_slots_merge() {
        let slots = vec![
            slot(0, Some(30), Category::Commute),
            slot(30, Some(60), Category::Commute),
            slot(60, None, Category::Unknown),
        ];

        let result = process_timeline(slots, &TimelineConfig::default());

        assert_eq!(
            summary(&result),
            vec![(ts(0), Category::Commute), (ts(60), Category::Unknown)]
        );
        assert_eq!(result[0].end, Some(ts(60)));
    }

    #[test]
    fn user_set_slot_does_not_merge_with_inferred_neighbor() {
        let mut user = slot(30, Some(60), Category::Commute);
        user.set_by_user = true;
        let slots = vec![
            slot(0, Some(30), Category::Commute),
            user,
            slot(60, None, Category::Commute),
        ];

        let result = process_timeline(slots, &TimelineConfig::default());

        let flags: Vec<_> = result.iter().map(|s| (s.start, s.set_by_user)).collect();
        assert_eq!(flags, vec![(ts(0), false), (ts(30), true), (ts(60), false)]);
        assert_eq!(result[0].end, Some(ts(30)));
    }

    #[test]
    fn sandwiched_blip_joins_both_neighbors() {
        let slots = vec![
            slot(0, Some(30), Category::Unknown),
            slot(30, Some(32), Category::Commute),
            slot(32, None, Category::Unknown),
        ];

        let result = process_timeline(slots, &TimelineConfig::default());

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].end, None);
    }

    #[test]
    fn short_slot_between_different_neighbors_prefers_preceding() {
        let slots = vec![
            slot(0, Some(30), Category::Unknown),
            slot(30, Some(32), Category::Fitness),
            slot(32, None, Category::Commute),
        ];

        let result = process_timeline(slots, &TimelineConfig::default());

        assert_eq!(
            summary(&result),
            vec![(ts(0), Category::Unknown), (ts(32), Category::Commute)]
        );
    }

    #[test]
    fn following_policy_extends_next_slot_backwards() {
        let slots = vec![
            slot(0, Some(30), Category::Unknown),
            slot(30, Some(32), Category::Fitness),
            slot(32, None, Category::Commute),
        ];
        let config = TimelineConfig {
            merge_policy: MergePolicy::PreferFollowing,
            ..TimelineConfig::default()
        };

        let result = process_timeline(slots, &config);

        assert_eq!(
            summary(&result),
            vec![(ts(0), Category::Unknown), (ts(30), Category::Commute)]
        );
    }

    #[test]
    fn user_set_and_running_slots_are_kept() {
        let mut user = slot(30, Some(31), Category::Food);
        user.set_by_user = true;
        let slots = vec![
            slot(0, Some(30), Category::Unknown),
            user,
            slot(31, None, Category::Commute),
        ];

        let result = process_timeline(slots, &TimelineConfig::default());

        assert_eq!(result.len(), 3);
        assert_eq!(result[2].end, None);
    }

    #[test]
    fn short_first_slot_merges_forward() {
        let slots = vec![
            slot(0, Some(2), Category::Commute),
            slot(2, Some(40), Category::Unknown),
        ];

        let result = process_timeline(slots, &TimelineConfig::default());

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].start, ts(0));
        assert_eq!(result[0].category, Category::Unknown);
    }

    #[test]
    fn single_short_slot_is_left_alone() {
        let slots = vec![slot(0, Some(1), Category::Commute)];

        let result = process_timeline(slots, &TimelineConfig::default());

        assert_eq!(result.len(), 1);
    }
}
