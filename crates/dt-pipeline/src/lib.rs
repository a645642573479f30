//! Async orchestration for day timeline reconstruction.
//!
//! This crate drives the pure stages of `dt-core` against the collaborator
//! traits:
//! - [`Pipeline`]: one transactional write run (segment, annotate, parse,
//!   build, smooth, guess, persist, clean)
//! - [`PipelineRunner`]: serializes runs and coalesces triggers
//! - [`Notifier`]: "slot created" and "slots updated" change notifications
//! - [`DayView`]: the read path, with debounced refresh and a storage-free tick

mod annotator;
mod config;
mod notify;
mod pipeline;
mod runner;
mod segmenter;
mod view;

#[cfg(test)]
mod testing;

pub use annotator::EventAnnotator;
pub use config::{Collaborators, PipelineConfig, ViewConfig};
pub use notify::{Notifier, SlotNotification};
pub use pipeline::{Pipeline, RunReport};
pub use runner::{PipelineRunner, RunTrigger, RunnerStats};
pub use segmenter::MotionSegmenter;
pub use view::{DayView, get_slots};
