//! CLI module for itdept - command-line interface, subcommands and run rendering.

pub mod commands;
pub mod render;

pub use commands::Cli;
