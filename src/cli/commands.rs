//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: submit a task and drive it until it stops
//! - resume: continue a paused or interrupted run
//! - status / history: inspect a stored run
//! - sessions: list stored runs
//! - models: show the configured models

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// itdept - a supervisor-routed team of LLM agents
#[derive(Parser, Debug)]
#[command(name = "itdept")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a task to the team
    Run {
        /// Task description
        task: String,

        /// Repository to work in (default: config repo_path, then the current directory)
        #[arg(short, long)]
        repo: Option<PathBuf>,

        /// Session id (default: generated)
        #[arg(short, long)]
        session: Option<String>,

        /// Pause for approval before the configured agents
        #[arg(long)]
        hitl: bool,

        /// Agents to pause before (implies --hitl), comma separated
        #[arg(long, value_delimiter = ',')]
        interrupt_before: Vec<String>,

        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resume a paused, cancelled or crashed run
    Resume {
        /// Session id
        session: String,

        /// Approve the paused dispatch (the default)
        #[arg(long, conflicts_with = "feedback")]
        approve: bool,

        /// Reject the paused dispatch with this feedback for the supervisor
        #[arg(short, long)]
        feedback: Option<String>,

        /// Keep pausing before the configured agents
        #[arg(long)]
        hitl: bool,

        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show where a run stands
    Status {
        /// Session id
        session: String,
    },

    /// Show a run's routing history and conversation log
    History {
        /// Session id
        session: String,
    },

    /// List stored sessions
    Sessions,

    /// Show the provider and the model used by each agent
    Models,
}
