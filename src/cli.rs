use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "nepenthe")]
#[command(author, version, about = "Personal video library indexer and streaming server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Start {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Library roots, comma separated
        #[arg(long)]
        video_paths: Option<String>,
    },

    /// Scan the library once in the foreground and print the summary
    Scan {
        /// Roots to scan, comma separated (defaults to the configured roots)
        #[arg(long)]
        paths: Option<String>,

        /// Only process newly discovered files
        #[arg(long)]
        no_heal: bool,
    },

    /// Remove records outside the given roots and sweep stale thumbnails
    Clean {
        /// Roots to keep, comma separated (defaults to the configured roots)
        #[arg(long)]
        paths: Option<String>,
    },

    /// Probe a video file and display its metadata
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
