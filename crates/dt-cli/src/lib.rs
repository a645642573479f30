//! Day timeline CLI library.
//!
//! This crate provides the `dt` command-line interface over the storage and
//! pipeline crates.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, IngestSignal};
pub use config::Config;
