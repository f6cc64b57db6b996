//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "newsgate", version, about = "Harvest, validate and fetch article links from news homepages")]
pub struct Cli {
    /// TOML config file (falls back to NEWSGATE_CONFIG_FILE)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process the configured sources
    Run {
        /// Ignore cached verdicts and re-validate every candidate
        #[arg(long)]
        cold_start: bool,

        /// Only process these source ids (repeatable)
        #[arg(long = "source", value_name = "ID")]
        sources: Vec<String>,
    },

    /// Inspect the link history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Write every source's records to one CSV file
    Export {
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },

    /// Print lifecycle counts for one source
    Show {
        #[arg(long, value_name = "ID")]
        source: String,
    },
}
