//! CLI module for mlopt-agent - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
