//! End-to-end pipeline runs against an in-memory SQLite store.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use dt_core::{
    Category, Clock, CommitPlan, ConfidenceTier, DayBounds, Location, MotionType, PipelineError,
    RawMotionSample, SmartGuess, SourceKind, TimeSlot, TrackAction, TrackEvent,
};
use dt_db::{Database, SharedDatabase};
use dt_pipeline::{Collaborators, Pipeline, PipelineConfig, get_slots};

#[derive(Clone)]
struct TestClock(Arc<Mutex<DateTime<Utc>>>);

impl TestClock {
    fn set(&self, now: DateTime<Utc>) {
        *self.0.lock().unwrap() = now;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

type TestPipeline = Pipeline<SharedDatabase, SharedDatabase, SharedDatabase, SharedDatabase, TestClock>;

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, hour, minute, 0).unwrap()
}

fn sample(hour: u32, minute: u32, motion: MotionType, confidence: ConfidenceTier) -> RawMotionSample {
    RawMotionSample::new(at(hour, minute), motion, confidence)
}

fn setup(now: DateTime<Utc>) -> (SharedDatabase, TestClock, TestPipeline) {
    let db = SharedDatabase::new(Database::open_in_memory().unwrap());
    let clock = TestClock(Arc::new(Mutex::new(now)));
    let pipeline = Pipeline::new(
        Collaborators::from_backend(&db, clock.clone()),
        PipelineConfig::default(),
    );
    (db, clock, pipeline)
}

fn ingest_morning(db: &SharedDatabase) {
    db.with(|db| {
        db.insert_motion_samples(&[
            sample(7, 0, MotionType::Still, ConfidenceTier::High),
            sample(8, 0, MotionType::Auto, ConfidenceTier::High),
            sample(8, 10, MotionType::Auto, ConfidenceTier::Medium),
            sample(8, 30, MotionType::Still, ConfidenceTier::High),
            sample(8, 50, MotionType::Walk, ConfidenceTier::Low),
            sample(9, 0, MotionType::Still, ConfidenceTier::High),
        ])?;
        db.insert_location_fixes(&[
            Location::new(at(7, 0), 52.50, 13.40).unwrap(),
            Location::new(at(8, 30), 52.52, 13.45).unwrap(),
        ])?;
        Ok(())
    })
    .unwrap();
}

fn slots(db: &SharedDatabase) -> Vec<TimeSlot> {
    db.with(|db| db.list_slots()).unwrap()
}

fn slot(start: DateTime<Utc>, category: Category, set_by_user: bool) -> TimeSlot {
    TimeSlot {
        start,
        category,
        set_by_user,
    }
}

#[tokio::test]
async fn morning_commute_is_reconstructed() {
    let (db, _clock, pipeline) = setup(at(9, 30));
    ingest_morning(&db);

    let report = pipeline.run().await.unwrap();

    assert_eq!(report.appended, 3);
    assert_eq!(
        slots(&db),
        vec![
            slot(at(9, 30) - chrono::Duration::days(1), Category::Unknown, false),
            slot(at(8, 0), Category::Commute, false),
            slot(at(8, 30), Category::Unknown, false),
        ]
    );

    let day = DayBounds::for_date(NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(), &Utc);
    let view = get_slots(&db, &TestClock(Arc::new(Mutex::new(at(9, 30)))), &day)
        .await
        .unwrap();
    let bounds: Vec<_> = view.iter().map(|s| (s.start, s.end, s.category)).collect();
    assert_eq!(
        bounds,
        vec![
            (at(0, 0), at(8, 0), Category::Unknown),
            (at(8, 0), at(8, 30), Category::Commute),
            (at(8, 30), at(9, 30), Category::Unknown),
        ]
    );
}

#[tokio::test]
async fn rerunning_without_new_input_is_idempotent() {
    let (db, clock, pipeline) = setup(at(9, 30));
    ingest_morning(&db);

    pipeline.run().await.unwrap();
    let first = slots(&db);

    clock.set(at(9, 35));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.appended, 0);
    assert!(!report.replaced);
    assert_eq!(slots(&db), first);
}

#[tokio::test]
async fn guessed_trailing_slot_survives_purge_of_its_fix() {
    let (db, clock, pipeline) = setup(at(9, 30));
    let office = Location::new(at(7, 0), 52.52, 13.405).unwrap();
    db.with(|db| {
        db.insert_motion_samples(&[
            sample(7, 0, MotionType::Still, ConfidenceTier::High),
            sample(8, 0, MotionType::Walk, ConfidenceTier::High),
            sample(8, 30, MotionType::Still, ConfidenceTier::High),
        ])?;
        db.insert_location_fixes(&[office])?;
        db.commit(&CommitPlan {
            guesses: vec![SmartGuess::learned(office, Category::Work, at(6, 0))],
            ..CommitPlan::default()
        })
    })
    .unwrap();

    pipeline.run().await.unwrap();
    let stored = slots(&db);
    let guesses = db.with(|db| db.list_guesses()).unwrap();
    assert_eq!(stored.last(), Some(&slot(at(8, 30), Category::Work, false)));

    // The window now starts at 08:30, so data before 07:30 is purged.
    clock.set(at(9, 35));
    let report = pipeline.run().await.unwrap();
    assert_eq!(report.purged.motion_samples, 1);
    assert_eq!(report.purged.location_fixes, 0);
    assert_eq!(slots(&db), stored);
    assert_eq!(db.with(|db| db.list_guesses()).unwrap(), guesses);

    clock.set(at(9, 40));
    let report = pipeline.run().await.unwrap();
    assert_eq!(report.appended, 0);
    assert!(!report.replaced);
    assert_eq!(slots(&db), stored);
    assert_eq!(db.with(|db| db.list_guesses()).unwrap(), guesses);
    assert_eq!(db.with(|db| db.table_counts()).unwrap().location_fixes, 1);
}

#[tokio::test]
async fn user_category_is_kept_and_learned_once() {
    let (db, clock, pipeline) = setup(at(9, 30));
    ingest_morning(&db);
    pipeline.run().await.unwrap();

    db.with(|db| {
        db.insert_track_events(&[TrackEvent {
            timestamp: at(8, 45),
            action: TrackAction::SetCategory,
            category: Category::Work,
        }])
    })
    .unwrap();
    clock.set(at(9, 40));
    let report = pipeline.run().await.unwrap();

    assert_eq!(report.appended, 1);
    assert_eq!(report.guesses, 1);
    assert_eq!(slots(&db).last(), Some(&slot(at(8, 45), Category::Work, true)));

    let stored = slots(&db);
    let guesses = db.with(|db| db.list_guesses()).unwrap();
    clock.set(at(9, 45));
    pipeline.run().await.unwrap();

    assert_eq!(slots(&db), stored);
    let rerun = db.with(|db| db.list_guesses()).unwrap();
    assert_eq!(rerun, guesses);
    assert_eq!(rerun[0].category, Category::Work);
    assert_eq!(rerun[0].usage_count, 1);
}

#[tokio::test]
async fn denied_motion_access_leaves_store_untouched() {
    let (db, _clock, pipeline) = setup(at(9, 30));
    ingest_morning(&db);
    db.with(|db| db.set_motion_access(false)).unwrap();

    let err = pipeline.run().await.unwrap_err();

    assert_eq!(err, PipelineError::SourceUnavailable(SourceKind::Motion));
    assert!(slots(&db).is_empty());
    assert_eq!(db.with(|db| db.motion_authorized()).unwrap(), Some(false));
    assert_eq!(db.with(|db| db.table_counts()).unwrap().motion_samples, 6);
}
