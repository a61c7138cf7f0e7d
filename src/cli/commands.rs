//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - chat: run one goal cycle on the local agent
//! - delegate: synthesize and execute a plan
//! - plans: list, show or resume stored plans

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Arcane - goal-directed agents and a level-barrier plan executor
#[derive(Parser, Debug)]
#[command(name = "arcane")]
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
    /// Send a message to the local agent and run one goal cycle
    Chat {
        /// The message
        message: String,

        /// Who the message is from
        #[arg(short, long, default_value = "user")]
        sender: String,
    },

    /// Break a task into a plan and execute it
    Delegate {
        /// What needs doing
        description: String,

        /// Name of the plan
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Inspect or resume stored plans
    Plans {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

/// Plan subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PlanCommands {
    /// List stored plans
    List,

    /// Show a plan's levels and tasks
    Show {
        /// Plan ID
        id: String,

        /// Include task outputs
        #[arg(short, long)]
        detailed: bool,
    },

    /// Continue a plan from its last checkpoint
    Resume {
        /// Plan ID
        id: String,
    },
}
