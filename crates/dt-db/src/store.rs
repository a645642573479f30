//! Collaborator trait implementations over a shared SQLite connection.

use std::future::{Future, ready};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dt_core::{
    AuthorizationFlags, CommitPlan, Location, LocationSource, MotionSource, PurgePlan,
    PurgeStats, RawMotionSample, SlotStore, SmartGuess, SourceError, SourceKind, StoreError,
    TimeSlot, TrackEvent, TrackSource,
};

use crate::{Database, DbError};

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows) => Self::NoResults,
            DbError::TimestampParse { record, .. } => Self::CouldNotParse {
                record,
                message: err.to_string(),
            },
            DbError::InvalidRecord { record, message } => Self::CouldNotParse { record, message },
            DbError::Sqlite(_) => Self::Backend(err.to_string()),
        }
    }
}

/// A [`Database`] shared between the pipeline, the read path and the CLI.
///
/// Every call locks the connection for the duration of one statement or
/// transaction. SQLite work is short and local, so the futures complete
/// immediately.
#[derive(Clone)]
pub struct SharedDatabase {
    inner: Arc<Mutex<Database>>,
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with<T>(&self, f: impl FnOnce(&mut Database) -> Result<T, DbError>) -> Result<T, StoreError> {
        let mut db = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("database lock poisoned".to_string()))?;
        f(&mut db).map_err(StoreError::from)
    }
}

impl MotionSource for SharedDatabase {
    fn query(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<RawMotionSample>, SourceError>> + Send {
        let result = self.with(|db| {
            if !db.motion_access_granted()? {
                return Ok(None);
            }
            db.motion_samples_in_range(start, end).map(Some)
        });
        ready(match result {
            Ok(Some(samples)) => Ok(samples),
            Ok(None) => Err(SourceError::NotAvailable(SourceKind::Motion)),
            Err(err) => Err(err.into()),
        })
    }
}

impl AuthorizationFlags for SharedDatabase {
    fn record_motion_authorization(
        &self,
        authorized: bool,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.with(|db| db.set_motion_authorized(authorized)))
    }
}

impl LocationSource for SharedDatabase {
    fn locations(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Location>, SourceError>> + Send {
        ready(
            self.with(|db| db.location_fixes_in_range(start, end))
                .map_err(SourceError::from),
        )
    }

    fn last_known_location(
        &self,
        before: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Location>, SourceError>> + Send {
        ready(
            self.with(|db| db.last_location_before(before))
                .map_err(SourceError::from),
        )
    }
}

impl TrackSource for SharedDatabase {
    fn track_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<TrackEvent>, SourceError>> + Send {
        ready(
            self.with(|db| db.track_events_in_range(start, end))
                .map_err(SourceError::from),
        )
    }
}

impl SlotStore for SharedDatabase {
    fn slots_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<TimeSlot>, StoreError>> + Send {
        ready(self.with(|db| db.slots_in_range(start, end)))
    }

    fn latest_slot(&self) -> impl Future<Output = Result<Option<TimeSlot>, StoreError>> + Send {
        ready(self.with(|db| db.latest_slot()))
    }

    fn guesses_near(
        &self,
        location: &Location,
        radius_m: f64,
    ) -> impl Future<Output = Result<Vec<SmartGuess>, StoreError>> + Send {
        ready(self.with(|db| db.guesses_near(location, radius_m)))
    }

    fn commit(&self, plan: &CommitPlan) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.with(|db| db.commit(plan)))
    }

    fn purge(&self, plan: &PurgePlan) -> impl Future<Output = Result<PurgeStats, StoreError>> + Send {
        ready(self.with(|db| db.purge(plan)))
    }
}
