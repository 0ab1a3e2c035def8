use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Stream agent turns from an AG-UI server
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Agent endpoint URL (overrides the config file)
    #[arg(long, global = true, env = "TURNSTREAM_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Path to a config file (defaults to the per-user config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Interactive chat on a single thread (default)
    Chat,
    /// Send one prompt, print the reply and exit
    Ask {
        /// Prompt text
        prompt: String,

        /// Print the final snapshot as JSON instead of streaming text
        #[arg(long)]
        json: bool,
    },
    /// Feed a recorded JSONL event stream through the aggregator
    Replay {
        /// Recording with one wire event per line
        file: PathBuf,

        /// Print the final snapshot as JSON instead of streaming text
        #[arg(long)]
        json: bool,

        /// Pause between recorded events, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// User text to open the replayed turn with
        #[arg(long, default_value = "replay")]
        prompt: String,
    },
    /// Inspect or initialize the config file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a config file with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
