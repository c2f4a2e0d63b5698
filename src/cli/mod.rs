//! Command-line interface for silicon-scribe.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
