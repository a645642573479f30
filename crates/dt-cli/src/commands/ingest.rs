//! Raw signal ingestion.
//!
//! Every signal is written as-is; duplicates (same timestamp, and for track
//! events the same action) are ignored by the store.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dt_core::{Category, ConfidenceTier, Location, MotionType, RawMotionSample, TrackAction, TrackEvent};
use dt_db::Database;

/// Records one motion sample.
pub fn motion<W: Write>(
    writer: &mut W,
    db: &mut Database,
    motion: MotionType,
    confidence: ConfidenceTier,
    at: DateTime<Utc>,
) -> Result<()> {
    let sample = RawMotionSample::new(at, motion, confidence);
    let inserted = db
        .insert_motion_samples(&[sample])
        .context("failed to store motion sample")?;
    report(writer, inserted, &format!("motion {motion} ({confidence})"), at)
}

/// Records one location fix.
pub fn location<W: Write>(
    writer: &mut W,
    db: &mut Database,
    latitude: f64,
    longitude: f64,
    accuracy_m: Option<f64>,
    at: DateTime<Utc>,
) -> Result<()> {
    let mut fix = Location::new(at, latitude, longitude).context("invalid location")?;
    fix.accuracy_m = accuracy_m;
    let inserted = db
        .insert_location_fixes(&[fix])
        .context("failed to store location fix")?;
    report(
        writer,
        inserted,
        &format!("location {latitude:.5}, {longitude:.5}"),
        at,
    )
}

/// Records one user tracking action.
pub fn track<W: Write>(
    writer: &mut W,
    db: &mut Database,
    action: TrackAction,
    category: Category,
    at: DateTime<Utc>,
) -> Result<()> {
    // Stopping always leaves the user in an unknown slot.
    let category = if action.sets_category() {
        category
    } else {
        Category::Unknown
    };
    let event = TrackEvent {
        timestamp: at,
        action,
        category,
    };
    let inserted = db
        .insert_track_events(&[event])
        .context("failed to store track event")?;
    report(writer, inserted, &format!("track {action} -> {category}"), at)
}

/// Grants or denies motion access.
pub fn motion_access<W: Write>(writer: &mut W, db: &mut Database, granted: bool) -> Result<()> {
    db.set_motion_access(granted)
        .context("failed to store motion access")?;
    writeln!(
        writer,
        "Motion access {}",
        if granted { "granted" } else { "denied" }
    )?;
    Ok(())
}

fn report<W: Write>(writer: &mut W, inserted: usize, what: &str, at: DateTime<Utc>) -> Result<()> {
    let at = at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    if inserted == 0 {
        tracing::debug!(what, %at, "duplicate signal ignored");
        writeln!(writer, "Already recorded {what} at {at}")?;
    } else {
        writeln!(writer, "Recorded {what} at {at}")?;
    }
    Ok(())
}
