//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "warden", version, about = "Policy-guarded terminal tools with a chat agent")]
pub struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the tool server over stdio.
    Serve {
        /// Path to the JSON security policy.
        #[arg(long, default_value = "warden.policy.json")]
        policy: PathBuf,
    },
    /// Chat with the agent, backed by an in-process tool server.
    Chat {
        /// Path to the JSON security policy.
        #[arg(long, default_value = "warden.policy.json")]
        policy: PathBuf,
        /// Model identifier to request from the local model server.
        #[arg(long)]
        model: Option<String>,
        /// Base URL of the local model server.
        #[arg(long)]
        base_url: Option<String>,
        /// Maximum reasoning steps per user turn.
        #[arg(long)]
        max_steps: Option<usize>,
    },
}
