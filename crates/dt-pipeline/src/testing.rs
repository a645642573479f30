//! In-memory collaborators for unit tests.

use std::future::{Future, ready};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use dt_core::{
    AuthorizationFlags, Clock, CommitPlan, Location, LocationSource, MotionSource, PurgePlan,
    PurgeStats, RawMotionSample, SlotStore, SmartGuess, SourceError, SourceKind, StoreError,
    TimeSlot, TrackEvent, TrackSource,
};

pub fn ts(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

#[derive(Debug, Default)]
pub struct MockState {
    pub samples: Vec<RawMotionSample>,
    pub locations: Vec<Location>,
    pub tracks: Vec<TrackEvent>,
    pub slots: Vec<TimeSlot>,
    pub guesses: Vec<SmartGuess>,

    pub motion_denied: bool,
    pub location_denied: bool,
    pub fail_reads: Option<StoreError>,
    pub fail_commit: Option<StoreError>,

    pub authorized: Option<bool>,
    pub commits: Vec<CommitPlan>,
    pub purges: Vec<PurgePlan>,
    pub range_queries: usize,
}

/// Every collaborator trait over one shared in-memory state.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&MockState) -> T) -> T {
        f(&self.state.lock().unwrap())
    }

    fn read_result<T>(&self, f: impl FnOnce(&MockState) -> T) -> Result<T, StoreError> {
        let state = self.state.lock().unwrap();
        match &state.fail_reads {
            Some(err) => Err(err.clone()),
            None => Ok(f(&state)),
        }
    }
}

fn in_range(timestamp: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start <= timestamp && timestamp <= end
}

impl MotionSource for MockBackend {
    fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<RawMotionSample>, SourceError>> + Send {
        let result = if self.read(|s| s.motion_denied) {
            Err(SourceError::NotAvailable(SourceKind::Motion))
        } else {
            self.read_result(|s| {
                s.samples
                    .iter()
                    .filter(|m| in_range(m.timestamp, start, end))
                    .copied()
                    .collect()
            })
            .map_err(SourceError::from)
        };
        ready(result)
    }
}

impl AuthorizationFlags for MockBackend {
    fn record_motion_authorization(
        &self,
        authorized: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.update(|s| s.authorized = Some(authorized));
        ready(Ok(()))
    }
}

impl LocationSource for MockBackend {
    fn locations(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Location>, SourceError>> + Send {
        let result = if self.read(|s| s.location_denied) {
            Err(SourceError::NotAvailable(SourceKind::Location))
        } else {
            self.read_result(|s| {
                s.locations
                    .iter()
                    .filter(|l| in_range(l.timestamp, start, end))
                    .copied()
                    .collect()
            })
            .map_err(SourceError::from)
        };
        ready(result)
    }

    fn last_known_location(
        &self,
        before: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Location>, SourceError>> + Send {
        ready(
            self.read_result(|s| {
                s.locations
                    .iter()
                    .filter(|l| l.timestamp < before)
                    .max_by_key(|l| l.timestamp)
                    .copied()
            })
            .map_err(SourceError::from),
        )
    }
}

impl TrackSource for MockBackend {
    fn track_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<TrackEvent>, SourceError>> + Send {
        ready(
            self.read_result(|s| {
                s.tracks
                    .iter()
                    .filter(|t| in_range(t.timestamp, start, end))
                    .copied()
                    .collect()
            })
            .map_err(SourceError::from),
        )
    }
}

impl SlotStore for MockBackend {
    fn slots_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<TimeSlot>, StoreError>> + Send {
        self.update(|s| s.range_queries += 1);
        ready(self.read_result(|s| {
            s.slots
                .iter()
                .filter(|slot| start <= slot.start && slot.start < end)
                .copied()
                .collect()
        }))
    }

    fn latest_slot(&self) -> impl Future<Output = Result<Option<TimeSlot>, StoreError>> + Send {
        ready(self.read_result(|s| s.slots.iter().max_by_key(|slot| slot.start).copied()))
    }

    fn guesses_near(
        &self,
        location: &Location,
        radius_m: f64,
    ) -> impl Future<Output = Result<Vec<SmartGuess>, StoreError>> + Send {
        ready(self.read_result(|s| {
            s.guesses
                .iter()
                .filter(|g| g.location.distance_m(location) <= radius_m)
                .cloned()
                .collect()
        }))
    }

    fn commit(&self, plan: &CommitPlan) -> impl Future<Output = Result<(), StoreError>> + Send {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.fail_commit.clone() {
            return ready(Err(err));
        }
        for slot in plan.changed_slots() {
            state.slots.retain(|s| s.start != slot.start);
            state.slots.push(slot);
        }
        state.slots.sort_by_key(|s| s.start);
        for guess in &plan.guesses {
            state.guesses.retain(|g| g.id != guess.id);
            state.guesses.push(guess.clone());
        }
        state.commits.push(plan.clone());
        ready(Ok(()))
    }

    fn purge(&self, plan: &PurgePlan) -> impl Future<Output = Result<PurgeStats, StoreError>> + Send {
        let mut state = self.state.lock().unwrap();
        let mut stats = PurgeStats::default();
        if let Some(before) = plan.raw_before {
            let samples = state.samples.len();
            state.samples.retain(|m| m.timestamp >= before);
            stats.motion_samples = samples - state.samples.len();
            let kept = plan.keep_fix_before.and_then(|keep| {
                state
                    .locations
                    .iter()
                    .map(|l| l.timestamp)
                    .filter(|t| *t < keep)
                    .max()
            });
            let locations = state.locations.len();
            state
                .locations
                .retain(|l| l.timestamp >= before || Some(l.timestamp) == kept);
            stats.location_fixes = locations - state.locations.len();
            let tracks = state.tracks.len();
            state.tracks.retain(|t| t.timestamp >= before);
            stats.track_events = tracks - state.tracks.len();
        }
        let guesses = state.guesses.len();
        state
            .guesses
            .retain(|g| g.last_used_at >= plan.guesses_unused_since);
        stats.guesses = guesses - state.guesses.len();
        state.purges.push(*plan);
        ready(Ok(stats))
    }
}

/// A clock the test moves by hand.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A clock that follows tokio's (possibly paused) time.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    base: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl TokioClock {
    pub fn starting_at(base: DateTime<Utc>) -> Self {
        Self {
            base,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        self.base + chrono::Duration::from_std(self.origin.elapsed()).unwrap()
    }
}
