//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dt_core::{Category, ConfidenceTier, MotionType, TrackAction};

use crate::commands::util::parse_name;

/// Day timeline reconstruction.
///
/// Turns raw motion, location and tracking signals into a gapless,
/// categorized timeline of the day.
#[derive(Debug, Parser)]
#[command(name = "dt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record a raw signal.
    Ingest {
        #[command(subcommand)]
        signal: IngestSignal,
    },

    /// Run the pipeline once over everything since the last stored slot.
    Run {
        /// Output the run report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the reconstructed slots of a day.
    Slots {
        /// Day to show (YYYY-MM-DD, local time). Defaults to today.
        #[arg(long)]
        day: Option<NaiveDate>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List learned location guesses.
    Guesses {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show storage and authorization status.
    Status,

    /// Run the pipeline periodically and keep today's slots on screen.
    ///
    /// Press Enter to run and refresh immediately, Ctrl-C to stop.
    Watch,
}

/// Signals that can be ingested.
#[derive(Debug, Subcommand)]
pub enum IngestSignal {
    /// Record a motion classifier sample.
    Motion {
        /// Motion type (still, walk, run, cycle, auto, unknown).
        #[arg(long = "type", value_parser = parse_name::<MotionType>)]
        motion: MotionType,

        /// Classifier confidence (low, medium, high).
        #[arg(long, value_parser = parse_name::<ConfidenceTier>)]
        confidence: ConfidenceTier,

        /// When the sample was taken (RFC 3339 or "N minutes ago"). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Record a location fix.
    Location {
        /// Latitude in degrees.
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in degrees.
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        /// Horizontal accuracy in meters.
        #[arg(long)]
        accuracy: Option<f64>,

        /// When the fix was taken. Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Record a user tracking action.
    Track {
        /// Action (start-tracking, set-category, edit-slot, stop-tracking).
        #[arg(long, value_parser = parse_name::<TrackAction>)]
        action: TrackAction,

        /// Category the action results in. Defaults to unknown.
        #[arg(long, value_parser = parse_name::<Category>, default_value = "unknown")]
        category: Category,

        /// When the action happened. Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },

    /// Grant or deny access to motion data.
    MotionAccess {
        /// Allow the pipeline to read motion samples.
        #[arg(long, conflicts_with = "denied", required_unless_present = "denied")]
        granted: bool,

        /// Make motion data unavailable to the pipeline.
        #[arg(long)]
        denied: bool,
    },
}
