//! Reconstructed slots of one day.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use chrono::TimeZone;
use dt_core::{Clock, DayBounds, Slot};
use dt_db::SharedDatabase;
use dt_pipeline::get_slots;

use super::util::{format_clock, format_duration};

/// Prints the slots of `day`, times shown in `tz`.
pub async fn run<W, C, Tz>(
    writer: &mut W,
    db: &SharedDatabase,
    clock: &C,
    day: &DayBounds,
    tz: &Tz,
    json: bool,
) -> Result<()>
where
    W: Write,
    C: Clock,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let slots = get_slots(db, clock, day)
        .await
        .with_context(|| format!("failed to load slots for {}", day.date))?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&slots)?)?;
    } else {
        write!(writer, "{}", format_slots(day, &slots, tz))?;
    }
    Ok(())
}

/// Formats a day's slots as a table.
///
/// User-set slots are marked with `*`.
pub fn format_slots<Tz>(day: &DayBounds, slots: &[Slot], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut output = String::new();
    let _ = writeln!(output, "Slots for {}", day.date.format("%a %Y-%m-%d"));

    if slots.is_empty() {
        let _ = writeln!(output, "No slots recorded.");
        return output;
    }

    for slot in slots {
        let _ = writeln!(
            output,
            "  {}-{}  {:>7}  {}{}",
            format_clock(slot.start, tz),
            format_clock(slot.end, tz),
            format_duration(slot.duration().num_milliseconds()),
            slot.category,
            if slot.set_by_user { " *" } else { "" }
        );
    }
    output
}
