//! Write-back planning for the persister and the cleaner.
//!
//! Persisted slots are append-only: everything before the latest stored slot
//! is immutable, the latest (running) slot may be rewritten in place, and new
//! slots are appended after it. Planning is pure; the store applies a plan in
//! one transaction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::guess::{GuessConfig, SmartGuess};
use crate::slot::{TemporaryTimeSlot, TimeSlot};

/// Everything one successful run writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitPlan {
    /// New attributes for the stored trailing slot, keyed by its start.
    pub replaced: Option<TimeSlot>,
    /// Slots starting after the stored trailing slot.
    pub appended: Vec<TimeSlot>,
    /// Smart guesses to upsert by ID.
    pub guesses: Vec<SmartGuess>,
}

impl CommitPlan {
    pub fn is_empty(&self) -> bool {
        self.replaced.is_none() && self.appended.is_empty() && self.guesses.is_empty()
    }

    /// Every slot the plan creates or rewrites, in order.
    pub fn changed_slots(&self) -> Vec<TimeSlot> {
        self.replaced.iter().chain(&self.appended).copied().collect()
    }

    /// Start of the earliest slot the plan writes.
    pub fn earliest_boundary(&self) -> Option<DateTime<Utc>> {
        self.replaced
            .as_ref()
            .or_else(|| self.appended.first())
            .map(|slot| slot.start)
    }
}

/// Plans the slot write-back for a run.
///
/// `latest` is the stored trailing slot. Temporary slots starting before it
/// are skipped, one starting exactly at it replaces it when its attributes
/// differ, and later ones are appended. A slot that would continue the
/// category of the slot before it is folded into that slot instead, so
/// re-running over the same input never creates a new boundary.
pub fn plan_commit(
    slots: &[TemporaryTimeSlot],
    latest: Option<&TimeSlot>,
    guesses: Vec<SmartGuess>,
) -> CommitPlan {
    let mut plan = CommitPlan {
        guesses,
        ..CommitPlan::default()
    };
    let mut previous = latest.copied();

    for slot in slots.iter().map(TemporaryTimeSlot::to_time_slot) {
        match latest {
            Some(stored) if slot.start < stored.start => {}
            Some(stored) if slot.start == stored.start => {
                if slot != *stored {
                    plan.replaced = Some(slot);
                }
                previous = Some(slot);
            }
            _ => {
                if previous.is_some_and(|p| p.category == slot.category) {
                    continue;
                }
                plan.appended.push(slot);
                previous = Some(slot);
            }
        }
    }

    tracing::debug!(
        replaced = plan.replaced.is_some(),
        appended = plan.appended.len(),
        guesses = plan.guesses.len(),
        "planned commit"
    );
    plan
}

/// Configuration for the cleaner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// Raw data this far behind the earliest persisted boundary is kept.
    /// Default: 3,600,000 (1 hour).
    pub retention_margin_ms: i64,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            retention_margin_ms: 3_600_000, // 1 hour
        }
    }
}

/// What the cleaner deletes after a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgePlan {
    /// Raw samples, fixes and track events before this instant are deleted.
    pub raw_before: Option<DateTime<Utc>>,
    /// The newest location fix before this instant survives `raw_before`.
    /// It is where the next run starts and seeds that run's location.
    pub keep_fix_before: Option<DateTime<Utc>>,
    /// Guesses last used before this instant are deleted.
    pub guesses_unused_since: DateTime<Utc>,
}

/// Rows removed by a purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeStats {
    pub motion_samples: usize,
    pub location_fixes: usize,
    pub track_events: usize,
    pub guesses: usize,
}

/// Plans the cleanup that follows `commit`.
///
/// When the commit wrote no slot, the stored trailing slot's start is the
/// boundary; with no slot at all, raw data is kept. The last known location
/// at the start of the trailing slot left by `commit` is always kept.
pub fn plan_purge(
    commit: &CommitPlan,
    latest: Option<&TimeSlot>,
    now: DateTime<Utc>,
    cleaner: &CleanerConfig,
    guess: &GuessConfig,
) -> PurgePlan {
    let boundary = commit
        .earliest_boundary()
        .or_else(|| latest.map(|slot| slot.start));
    let trailing = commit
        .appended
        .last()
        .or(commit.replaced.as_ref())
        .or(latest)
        .map(|slot| slot.start);
    PurgePlan {
        raw_before: boundary.map(|b| b - Duration::milliseconds(cleaner.retention_margin_ms)),
        keep_fix_before: trailing,
        guesses_unused_since: now - Duration::days(guess.max_age_days),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use chrono::TimeZone;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    fn temp(start: i64, end: Option<i64>, category: Category) -> TemporaryTimeSlot {
        TemporaryTimeSlot {
            start: ts(start),
            end: end.map(ts),
            category,
            set_by_user: false,
            location: None,
        }
    }

    fn stored(start: i64, category: Category) -> TimeSlot {
        TimeSlot {
            start: ts(start),
            category,
            set_by_user: false,
        }
    }

    #[test]
    fn first_run_appends_everything() {
        let slots = vec![temp(0, Some(30), Category::Commute), temp(30, None, Category::Work)];

        let plan = plan_commit(&slots, None, Vec::new());

        assert_eq!(plan.replaced, None);
        assert_eq!(
            plan.appended,
            vec![stored(0, Category::Commute), stored(30, Category::Work)]
        );
    }

    #[test]
    fn trailing_slot_is_replaced_and_later_ones_appended() {
        let latest = stored(30, Category::Unknown);
        let slots = vec![temp(30, Some(50), Category::Work), temp(50, None, Category::Commute)];

        let plan = plan_commit(&slots, Some(&latest), Vec::new());

        assert_eq!(plan.replaced, Some(stored(30, Category::Work)));
        assert_eq!(plan.appended, vec![stored(50, Category::Commute)]);
        assert_eq!(plan.earliest_boundary(), Some(ts(30)));
    }

    #[test]
    fn unchanged_input_plans_nothing() {
        let latest = stored(30, Category::Work);
        let slots = vec![temp(30, None, Category::Work)];

        let plan = plan_commit(&slots, Some(&latest), Vec::new());

        assert!(plan.is_empty());
    }

    #[test]
    fn earlier_slots_are_immutable() {
        let latest = stored(30, Category::Work);
        let slots = vec![temp(0, Some(30), Category::Food), temp(30, None, Category::Work)];

        let plan = plan_commit(&slots, Some(&latest), Vec::new());

        assert!(plan.is_empty());
    }

    #[test]
    fn continuation_of_previous_category_is_folded() {
        let latest = stored(30, Category::Work);
        let slots = vec![temp(30, Some(32), Category::Work), temp(32, None, Category::Work)];

        let plan = plan_commit(&slots, Some(&latest), Vec::new());

        assert!(plan.appended.is_empty());
    }

    #[test]
    fn purge_keeps_margin_behind_boundary() {
        let plan = CommitPlan {
            appended: vec![stored(120, Category::Work)],
            ..CommitPlan::default()
        };

        let purge = plan_purge(
            &plan,
            Some(&stored(60, Category::Food)),
            ts(180),
            &CleanerConfig::default(),
            &GuessConfig::default(),
        );

        assert_eq!(purge.raw_before, Some(ts(60)));
        assert_eq!(purge.keep_fix_before, Some(ts(120)));
        assert_eq!(purge.guesses_unused_since, ts(180) - Duration::days(30));
    }

    #[test]
    fn purge_after_empty_commit_keeps_fix_for_stored_trailing_slot() {
        let purge = plan_purge(
            &CommitPlan::default(),
            Some(&stored(90, Category::Work)),
            ts(180),
            &CleanerConfig::default(),
            &GuessConfig::default(),
        );

        assert_eq!(purge.raw_before, Some(ts(30)));
        assert_eq!(purge.keep_fix_before, Some(ts(90)));
    }

    #[test]
    fn purge_keeps_fix_for_last_appended_slot() {
        let plan = CommitPlan {
            replaced: Some(stored(60, Category::Food)),
            appended: vec![stored(120, Category::Commute), stored(150, Category::Work)],
            ..CommitPlan::default()
        };

        let purge = plan_purge(
            &plan,
            Some(&stored(60, Category::Unknown)),
            ts(180),
            &CleanerConfig::default(),
            &GuessConfig::default(),
        );

        assert_eq!(purge.raw_before, Some(ts(0)));
        assert_eq!(purge.keep_fix_before, Some(ts(150)));
    }

    #[test]
    fn purge_without_any_slot_keeps_raw_data() {
        let purge = plan_purge(
            &CommitPlan::default(),
            None,
            ts(0),
            &CleanerConfig::default(),
            &GuessConfig::default(),
        );

        assert_eq!(purge.raw_before, None);
        assert_eq!(purge.keep_fix_before, None);
    }
}
