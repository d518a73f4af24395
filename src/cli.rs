use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediarelay")]
#[command(author, version, about = "Range-aware streaming proxy for remote media objects")]
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
    /// Start the streaming server
    Start {
        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses --config if not specified)
        config: Option<PathBuf>,
    },

    /// Show how a byte range would be split into upstream chunks
    Plan {
        /// Object size in bytes
        #[arg(long)]
        size: u64,

        /// Range header value, e.g. "bytes=0-1023". Whole object if omitted.
        #[arg(long)]
        range: Option<String>,

        /// Chunk size in bytes (defaults to the configured chunk size)
        #[arg(long)]
        chunk_size: Option<u64>,
    },

    /// Display version information
    Version,
}
