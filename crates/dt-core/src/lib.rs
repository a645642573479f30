//! Core domain logic for day timeline reconstruction.
//!
//! This crate contains the pure, synchronous stages of the pipeline:
//! - Motion segmentation: raw classifier samples into activity segments
//! - Annotation and parsing: merged signal streams into slot boundaries
//! - Slot building and smoothing: boundaries into a gapless slot sequence
//! - Smart guessing: categories inferred from location history
//! - Write-back planning and read-path reconstruction
//!
//! It also defines the collaborator traits the async pipeline drives.

mod types;

pub mod error;
pub mod event;
pub mod guess;
pub mod motion;
pub mod parse;
pub mod persist;
pub mod reconstruct;
pub mod slot;
pub mod source;
pub mod timeline;

pub use error::{MotionError, PipelineError, SourceError, SourceKind, StoreError};
pub use event::{AnnotatedEvent, EventSource, TrackEvent, annotate};
pub use guess::{GuessConfig, GuessOutcome, SmartGuess, apply_guesses};
pub use motion::{MotionActivitySegment, RawMotionSample, segment_samples, split_at};
pub use parse::{BoundaryKind, ParseConfig, ParsedEvent, parse_events};
pub use persist::{
    CleanerConfig, CommitPlan, PurgePlan, PurgeStats, plan_commit, plan_purge,
};
pub use reconstruct::{DayBounds, reconstruct_day};
pub use slot::{Slot, SlotEnd, SlotSeed, TemporaryTimeSlot, TimeSlot, build_temporary_slots};
pub use source::{
    AuthorizationFlags, Clock, FixedClock, LocationSource, MotionSource, SlotStore, SystemClock,
    TrackSource,
};
pub use timeline::{MergePolicy, TimelineConfig, process_timeline};
pub use types::{
    Category, ConfidenceTier, Location, MotionType, TrackAction, ValidationError, Window,
};
