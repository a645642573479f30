//! Learned location guesses.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::{Context, Result};
use dt_core::SmartGuess;
use dt_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, json: bool) -> Result<()> {
    let guesses = db.list_guesses().context("failed to load guesses")?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&guesses)?)?;
    } else {
        write!(writer, "{}", format_guesses(&guesses))?;
    }
    Ok(())
}

/// Formats guesses, most recently used first.
pub fn format_guesses(guesses: &[SmartGuess]) -> String {
    let mut output = String::new();
    if guesses.is_empty() {
        let _ = writeln!(output, "No guesses learned yet.");
        return output;
    }

    for guess in guesses {
        let _ = writeln!(
            output,
            "{:<10} {:>9.5}, {:>10.5}  used {}x  strikes {}  last used {}",
            guess.category.as_str(),
            guess.location.latitude,
            guess.location.longitude,
            guess.usage_count,
            guess.strikes,
            guess.last_used_at.format("%Y-%m-%d %H:%M")
        );
    }
    output
}
