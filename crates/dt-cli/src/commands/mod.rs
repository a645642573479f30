//! CLI subcommand implementations.

pub mod guesses;
pub mod ingest;
pub mod run;
pub mod slots;
pub mod status;
pub mod util;
pub mod watch;
