//! Command-line interface for efficepart.
//!
//! Starts the dispatcher, single tools or all of them, and runs one-off
//! maintenance such as the expiry sweep.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
