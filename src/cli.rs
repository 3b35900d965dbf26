use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lyricsync")]
#[command(author, version, about = "Play time-indexed lyric documents against a clock")]
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
    /// Play a song record and print lyrics as they become active
    Play {
        /// Song record (JSON)
        #[arg(required = true)]
        song: PathBuf,

        /// Ticks per second (overrides config)
        #[arg(long)]
        fps: Option<f64>,

        /// Minimum milliseconds between throttled updates (overrides config)
        #[arg(long)]
        throttle: Option<u64>,

        /// Start position in milliseconds
        #[arg(long, default_value = "0")]
        from: f64,

        /// Print every player event as a JSON line
        #[arg(long)]
        json: bool,
    },

    /// Show the document tree of a song record
    Inspect {
        /// Song record (JSON)
        #[arg(required = true)]
        song: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
