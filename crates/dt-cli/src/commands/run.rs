//! One pipeline run over everything since the last stored slot.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use dt_core::Clock;
use dt_db::SharedDatabase;
use dt_pipeline::{Collaborators, Pipeline, PipelineConfig, RunReport};

use super::util::format_duration;

/// Runs the pipeline once and prints its report.
pub async fn run<W, C>(
    writer: &mut W,
    db: &SharedDatabase,
    clock: C,
    config: PipelineConfig,
    json: bool,
) -> Result<()>
where
    W: Write,
    C: Clock,
{
    let pipeline = Pipeline::new(Collaborators::from_backend(db, clock), config);
    let report = pipeline.run().await.context("pipeline run failed")?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(writer, "{}", format_report(&report))?;
    }
    Ok(())
}

/// Formats a run report as text.
pub fn format_report(report: &RunReport) -> String {
    let mut output = String::new();
    let span = (report.window_end - report.window_start).num_milliseconds();

    let _ = writeln!(
        output,
        "Window: {} .. {} ({})",
        report.window_start.format("%Y-%m-%d %H:%M"),
        report.window_end.format("%Y-%m-%d %H:%M"),
        format_duration(span)
    );
    let _ = writeln!(
        output,
        "Slots: {} ({} new, trailing slot {})",
        report.slots,
        report.appended,
        if report.replaced { "rewritten" } else { "kept" }
    );
    let _ = writeln!(output, "Guesses updated: {}", report.guesses);

    let purged = &report.purged;
    let raw = purged.motion_samples + purged.location_fixes + purged.track_events;
    if raw > 0 || purged.guesses > 0 {
        let _ = writeln!(
            output,
            "Purged: {} motion, {} location, {} track, {} guesses",
            purged.motion_samples, purged.location_fixes, purged.track_events, purged.guesses
        );
    }
    output
}
