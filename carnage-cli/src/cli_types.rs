//! CLI type definitions: command enums and argument structs.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "carnage-relay")]
#[command(about = "Relay Halo 3 carnage reports to chat as scoreboard images", long_about = None)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.config/carnage-relay/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug logging (timestamps + debug-level messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments for the long-running watcher.
#[derive(Args, Clone, Debug)]
pub(crate) struct WatchArgs {
    /// Folder the game client writes carnage reports into
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Also process reports already in the folder at startup
    #[arg(long)]
    pub process_existing: bool,

    /// Do not start the chat session (webhook and database only)
    #[arg(long)]
    pub no_session: bool,

    /// Serve the control API on this address (e.g. 127.0.0.1:8787)
    #[arg(long)]
    pub control_addr: Option<SocketAddr>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Watch the report folder and relay every finished match
    Watch {
        #[command(flatten)]
        args: WatchArgs,
    },

    /// Run the full pipeline once per report file, without watching
    Process {
        /// Report files, processed in the order given
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Do not start the chat session (webhook and database only)
        #[arg(long)]
        no_session: bool,
    },

    /// Parse a report and print the match it describes (no side effects)
    Parse {
        file: PathBuf,

        /// Print the parsed record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse and render a report to a PNG file
    Render {
        file: PathBuf,

        /// Output PNG path
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Show match database statistics and recent matches
    Status {
        /// Number of recent matches to list
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Inspect the effective configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show effective settings and where each came from
    Show,

    /// Print the config file path
    Path,
}
