//! Status command: storage contents and motion authorization.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use dt_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path, timezone: &str) -> Result<()> {
    let counts = db.table_counts().context("failed to count rows")?;
    let access = db.motion_access_granted()?;
    let authorized = db.motion_authorized()?;
    let latest = db.latest_slot().context("failed to load latest slot")?;

    writeln!(writer, "Day timeline status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Timezone: {timezone}")?;
    writeln!(
        writer,
        "Motion access: {}",
        if access { "granted" } else { "denied" }
    )?;
    writeln!(
        writer,
        "Motion authorized: {}",
        match authorized {
            Some(true) => "yes",
            Some(false) => "no",
            None => "not yet queried",
        }
    )?;

    writeln!(writer, "Pending signals:")?;
    writeln!(writer, "- motion samples: {}", counts.motion_samples)?;
    writeln!(writer, "- location fixes: {}", counts.location_fixes)?;
    writeln!(writer, "- track events: {}", counts.track_events)?;
    writeln!(writer, "Slots: {}", counts.time_slots)?;
    writeln!(writer, "Guesses: {}", counts.smart_guesses)?;

    match latest {
        Some(slot) => writeln!(
            writer,
            "Running slot: {} since {}{}",
            slot.category,
            slot.start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            if slot.set_by_user { " (set by user)" } else { "" }
        )?,
        None => writeln!(writer, "No slots recorded.")?,
    }

    Ok(())
}
