use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// fallsentry: fall alert escalation
///
/// Holds a confirmation countdown when a fall is suspected, then notifies
/// emergency contacts over every configured channel.
#[derive(Parser, Debug)]
#[command(name = "fallsentry")]
#[command(version, about, long_about)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to custom config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive monitoring session (default)
    #[command(alias = "r")]
    Run {
        /// Start with fall detection off
        #[arg(long)]
        disarmed: bool,
    },

    /// Alert every emergency contact right now
    #[command(alias = "s")]
    Send {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration, channels and device preferences
    #[command(alias = "st")]
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show recent alert dispatches
    #[command(alias = "rep")]
    Report {
        /// Number of dispatches to show
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
