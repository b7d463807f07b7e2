//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::DEFAULT_SCAN_CHUNK;

/// Inspect 802.11 capture containers (pcap and ivs).
#[derive(Parser, Debug)]
#[command(name = "wlanscope")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format for stdout
    #[arg(long = "format", value_enum, default_value = "table", global = true)]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show container kind, link type and record count
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List indexed records with their offsets
    Records {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// First record to show (1-indexed)
        #[arg(long = "start", default_value = "1")]
        start: u64,

        /// Number of records to show (0 = all remaining)
        #[arg(long = "count", default_value = "0")]
        count: usize,
    },

    /// List BSSID / SSID pairs advertised in the container
    Beacons {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Records read per chunk
        #[arg(long = "chunk", default_value_t = DEFAULT_SCAN_CHUNK)]
        chunk: usize,
    },

    /// Concatenate two containers of the same kind
    Concat {
        #[arg(value_name = "FIRST")]
        first: PathBuf,

        #[arg(value_name = "SECOND")]
        second: PathBuf,

        /// Destination file
        #[arg(short = 'o', long = "output", value_name = "DEST")]
        output: PathBuf,
    },
}

impl Args {
    /// `tracing` filter directive for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
