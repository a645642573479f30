//! Collaborator interfaces consumed by the pipeline.
//!
//! Signal sources and the store are queried asynchronously; these are the
//! only suspension points of a pipeline run. Implementations exist for the
//! SQLite store (`dt-db`) and for test doubles.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::{SourceError, StoreError};
use crate::event::TrackEvent;
use crate::guess::SmartGuess;
use crate::motion::RawMotionSample;
use crate::persist::{CommitPlan, PurgePlan, PurgeStats};
use crate::slot::TimeSlot;
use crate::types::Location;

/// Raw motion classifier output.
pub trait MotionSource: Send + Sync {
    /// Samples with `start <= timestamp <= end`.
    fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<RawMotionSample>, SourceError>> + Send;
}

/// Side channel recording whether the motion source could be queried.
pub trait AuthorizationFlags: Send + Sync {
    fn record_motion_authorization(
        &self,
        authorized: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Location fixes.
pub trait LocationSource: Send + Sync {
    /// Fixes with `start <= timestamp <= end`, oldest first.
    fn locations(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Location>, SourceError>> + Send;

    /// The newest fix strictly before `before`.
    fn last_known_location(
        &self,
        before: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Location>, SourceError>> + Send;
}

/// Explicit user tracking actions.
pub trait TrackSource: Send + Sync {
    fn track_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<TrackEvent>, SourceError>> + Send;
}

/// Durable slots and smart guesses.
pub trait SlotStore: Send + Sync {
    /// Stored slots with `start <= slot.start < end`, oldest first.
    fn slots_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<TimeSlot>, StoreError>> + Send;

    /// The stored slot with the greatest start.
    fn latest_slot(&self) -> impl Future<Output = Result<Option<TimeSlot>, StoreError>> + Send;

    /// Guesses whose centroid is within `radius_m` of `location`.
    fn guesses_near(
        &self,
        location: &Location,
        radius_m: f64,
    ) -> impl Future<Output = Result<Vec<SmartGuess>, StoreError>> + Send;

    /// Applies a run's writes atomically.
    fn commit(&self, plan: &CommitPlan) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Deletes consumed raw data and expired guesses.
    fn purge(&self, plan: &PurgePlan) -> impl Future<Output = Result<PurgeStats, StoreError>> + Send;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
