//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use clap::{Parser, Subcommand};

use crate::client::USGS_BASE_URL;
use crate::filters::MagnitudeRange;
use crate::output::Format;

/// Earthquake activity dashboard backed by the USGS summary feeds.
#[derive(Parser, Debug)]
#[command(name = "quakeboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the live dashboard over HTTP
    Serve(ServeArgs),

    /// Fetch both feeds once and print the dashboard
    Snapshot(SnapshotArgs),
}

/// Arguments for the `serve` command.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Base URL of the feed host
    #[arg(long, default_value = USGS_BASE_URL)]
    pub base_url: String,

    /// Current-day refresh interval in seconds
    #[arg(long, default_value = "300")]
    pub refresh_secs: u64,

    /// Initial magnitude filter: min,max
    #[arg(long, default_value = "0,10", value_parser = parse_range)]
    pub range: MagnitudeRange,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Arguments for the `snapshot` command.
#[derive(Parser, Debug)]
pub struct SnapshotArgs {
    /// Base URL of the feed host
    #[arg(long, default_value = USGS_BASE_URL)]
    pub base_url: String,

    /// Magnitude filter: min,max
    #[arg(long, default_value = "0,10", value_parser = parse_range)]
    pub range: MagnitudeRange,

    /// Maximum list rows per collection (human format)
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a magnitude range from string.
fn parse_range(s: &str) -> Result<MagnitudeRange, String> {
    s.parse()
}
