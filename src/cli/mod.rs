//! CLI module for planboard - command-line interface and subcommands.

pub mod commands;

pub use commands::{Cli, Commands};
