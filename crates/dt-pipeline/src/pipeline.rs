//! The transactional write pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use dt_core::{
    AuthorizationFlags, Category, Clock, LocationSource, MotionSource, PipelineError, PurgeStats,
    SlotEnd, SlotSeed, SlotStore, SmartGuess, TemporaryTimeSlot, TrackSource, Window,
    apply_guesses, build_temporary_slots, parse_events, plan_commit, plan_purge, process_timeline,
};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};

use crate::annotator::EventAnnotator;
use crate::config::{Collaborators, PipelineConfig};
use crate::notify::{Notifier, SlotNotification};
use crate::segmenter::MotionSegmenter;

/// Summary of one successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Slots in the smoothed sequence.
    pub slots: usize,
    /// Whether the stored trailing slot was rewritten.
    pub replaced: bool,
    pub appended: usize,
    /// Smart guesses created or changed.
    pub guesses: usize,
    pub notifications: usize,
    pub purged: PurgeStats,
}

/// Runs the stages in order against the collaborators.
///
/// Only one run is in flight at a time; a concurrent call waits for the
/// running one to finish. A failing stage aborts the run before anything is
/// written, and cleanup only follows a successful commit.
pub struct Pipeline<M, L, T, S, C> {
    collaborators: Collaborators<M, L, T, S, C>,
    config: PipelineConfig,
    notifier: Notifier,
    run_lock: Mutex<()>,
}

impl<M, L, T, S, C> Pipeline<M, L, T, S, C>
where
    M: MotionSource,
    L: LocationSource,
    T: TrackSource,
    S: SlotStore + AuthorizationFlags,
    C: Clock,
{
    pub fn new(collaborators: Collaborators<M, L, T, S, C>, config: PipelineConfig) -> Self {
        Self {
            collaborators,
            config,
            notifier: Notifier::default(),
            run_lock: Mutex::new(()),
        }
    }

    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub const fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SlotNotification> {
        self.notifier.subscribe()
    }

    /// Executes one run.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let _running = self.run_lock.lock().await;
        let Collaborators {
            motion,
            location,
            track,
            store,
            clock,
        } = &self.collaborators;

        let now = clock.now();
        let latest = store.latest_slot().await?;
        let window_start = latest.map_or_else(
            || now - Duration::milliseconds(self.config.initial_lookback_ms),
            |slot| slot.start.min(now),
        );
        let window = Window {
            start: window_start,
            end: now,
        };
        let motion_lookback = window.start - Duration::milliseconds(self.config.cleaner.retention_margin_ms);
        tracing::debug!(start = %window.start, end = %window.end, "starting pipeline run");

        let annotator = EventAnnotator::new(MotionSegmenter::new(motion, store), location, track);
        let annotation = annotator.annotate(&window, motion_lookback).await?;

        let parsed = parse_events(&annotation.events, annotation.initial_motion, &self.config.parse);
        let seed = latest.as_ref().map(SlotSeed::from).unwrap_or_default();
        let built = build_temporary_slots(&parsed, &window, seed, SlotEnd::Open);
        let smoothed = process_timeline(built, &self.config.timeline);

        let known = self.nearby_guesses(&smoothed).await?;
        let outcome = apply_guesses(smoothed, known, &self.config.guess);

        let plan = plan_commit(&outcome.slots, latest.as_ref(), outcome.updated);
        store.commit(&plan).await?;
        let notifications = self.notifier.publish(&plan);

        let purge = plan_purge(
            &plan,
            latest.as_ref(),
            now,
            &self.config.cleaner,
            &self.config.guess,
        );
        let purged = store.purge(&purge).await?;

        let report = RunReport {
            window_start: window.start,
            window_end: window.end,
            slots: outcome.slots.len(),
            replaced: plan.replaced.is_some(),
            appended: plan.appended.len(),
            guesses: plan.guesses.len(),
            notifications,
            purged,
        };
        tracing::info!(
            appended = report.appended,
            replaced = report.replaced,
            guesses = report.guesses,
            "pipeline run committed"
        );
        Ok(report)
    }

    /// Stored guesses near every slot the guesser will look at.
    async fn nearby_guesses(&self, slots: &[TemporaryTimeSlot]) -> Result<Vec<SmartGuess>, PipelineError> {
        let radius = self.config.guess.radius_m;
        let mut found: BTreeMap<String, SmartGuess> = BTreeMap::new();
        for slot in slots {
            let Some(location) = slot.location else {
                continue;
            };
            if !slot.set_by_user && slot.category != Category::Unknown {
                continue;
            }
            for guess in self.collaborators.store.guesses_near(&location, radius).await? {
                found.entry(guess.id.clone()).or_insert(guess);
            }
        }
        Ok(found.into_values().collect())
    }
}
