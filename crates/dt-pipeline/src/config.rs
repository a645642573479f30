//! Pipeline configuration and collaborator wiring.

use std::time::Duration;

use dt_core::{CleanerConfig, GuessConfig, ParseConfig, TimelineConfig};
use serde::{Deserialize, Serialize};

/// Policy knobs for a write run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub parse: ParseConfig,
    pub timeline: TimelineConfig,
    pub guess: GuessConfig,
    pub cleaner: CleanerConfig,

    /// Window start when no slot was ever persisted, relative to now.
    /// Default: 86,400,000 (24 hours).
    pub initial_lookback_ms: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            parse: ParseConfig::default(),
            timeline: TimelineConfig::default(),
            guess: GuessConfig::default(),
            cleaner: CleanerConfig::default(),
            initial_lookback_ms: 86_400_000, // 24 hours
        }
    }
}

/// Read-path trigger timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Triggers arriving within this window cause one refresh. Default: 500.
    pub debounce_ms: u64,

    /// Period of the "today" tick. Default: 60,000 (1 min).
    pub tick_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            tick_ms: 60_000,
        }
    }
}

impl ViewConfig {
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// The external collaborators a pipeline is constructed with.
#[derive(Debug, Clone)]
pub struct Collaborators<M, L, T, S, C> {
    pub motion: M,
    pub location: L,
    pub track: T,
    pub store: S,
    pub clock: C,
}

impl<B: Clone, C> Collaborators<B, B, B, B, C> {
    /// Uses one backend for every source and the store.
    pub fn from_backend(backend: &B, clock: C) -> Self {
        Self {
            motion: backend.clone(),
            location: backend.clone(),
            track: backend.clone(),
            store: backend.clone(),
            clock,
        }
    }
}
