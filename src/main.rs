//! linkframe - framed bit transport with error detection
//!
//! Sends files as CRC- or checksum-protected frames over TCP and offers
//! offline tools to encode, inspect and corrupt frames and to measure
//! detection coverage.

mod commands;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use linkframe_codec::{Scheme, DEFAULT_FRAME_SIZE};
use linkframe_link::Config;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "linkframe", about = "Framed bit transport with error detection", version)]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "LINKFRAME_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where a payload comes from. Exactly one source must be given.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct PayloadInput {
    /// UTF-8 text
    #[arg(long)]
    text: Option<String>,

    /// Hex digits
    #[arg(long)]
    hex: Option<String>,

    /// A string of 0 and 1
    #[arg(long)]
    bits: Option<String>,

    /// Raw bytes of a file
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a file to a receiver
    Send {
        /// File to send
        file: PathBuf,

        /// Receiver address
        #[arg(short, long)]
        peer: Option<SocketAddr>,

        /// Redundancy scheme (checksum, crc-8, crc-10, crc-16, crc-32)
        #[arg(short, long)]
        scheme: Option<Scheme>,

        /// Frame size in bytes
        #[arg(short, long)]
        frame_size: Option<usize>,
    },

    /// Accept one sender and reassemble its payload
    Receive {
        /// Listen address
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Write the payload here instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the payload of frames that fail validation
        #[arg(long)]
        keep_invalid: bool,

        /// Seconds to wait for a connection or a frame (0 waits forever)
        #[arg(long)]
        idle_timeout: Option<u64>,
    },

    /// Print the frames a payload would be sent as
    Encode {
        #[command(flatten)]
        input: PayloadInput,

        /// Redundancy scheme
        #[arg(short, long)]
        scheme: Option<Scheme>,

        /// Frame size in bytes
        #[arg(short, long)]
        frame_size: Option<usize>,
    },

    /// Decode and validate one frame
    Inspect {
        /// Frame as a string of 0 and 1
        bits: String,
    },

    /// Flip bits of a bit-string with an error model
    Corrupt {
        /// Bits to corrupt
        bits: String,

        /// single, two_isolated, odd[:k], burst[:min-max] or custom
        #[arg(short, long)]
        model: String,

        /// Positions to flip for the custom model, e.g. 0,7,12
        #[arg(short, long)]
        positions: Option<String>,

        /// Seed for reproducible corruption
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Measure how often each scheme detects each error model
    Simulate {
        #[command(flatten)]
        input: PayloadInput,

        /// Schemes to test, comma separated
        #[arg(long, value_delimiter = ',')]
        schemes: Option<Vec<Scheme>>,

        /// Error models to test (repeatable)
        #[arg(long)]
        models: Vec<String>,

        /// Also test a custom model flipping these positions
        #[arg(long)]
        positions: Option<String>,

        /// Frame size in bytes
        #[arg(short, long, default_value_t = DEFAULT_FRAME_SIZE)]
        frame_size: usize,

        /// Corruptions per frame and model
        #[arg(short, long, default_value = "1")]
        trials: usize,

        /// Seed for the error injector
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // An explicit config file must load; otherwise fall back to defaults
    let config = match &cli.config {
        Some(path) => match Config::load_from(Some(path.as_path())) {
            Ok(c) => {
                tracing::info!("Loaded config from {}", path.display());
                c
            }
            Err(e) => {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
        },
        None => Config::load().unwrap_or_else(|e| {
            tracing::warn!("Using default configuration: {}", e);
            Config::default()
        }),
    };

    match commands::execute(config, cli.command).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
