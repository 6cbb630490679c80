//! quakeboard - Global earthquake activity dashboard.
//!
//! Polls the USGS current-day and significant-month feeds, derives map
//! markers, chronological lists, magnitude histograms and summary stats,
//! and serves them to a browser or prints them to the terminal.

use std::io;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing::error;

mod cli;
mod client;
mod dashboard;
mod errors;
mod filters;
mod models;
mod output;
mod refresh;
mod server;
mod stats;
mod style;

use cli::{Cli, Command};
use client::UsgsClient;
use dashboard::ViewModel;
use refresh::{Dashboard, RefreshConfig};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let runtime = tokio::runtime::Runtime::new().context("failed to create tokio runtime")?;

    match cli.command {
        Command::Serve(args) => runtime.block_on(cmd_serve(args)),
        Command::Snapshot(args) => runtime.block_on(cmd_snapshot(args)),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the `serve` command - run the live dashboard.
async fn cmd_serve(args: cli::ServeArgs) -> Result<()> {
    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
        base_url: args.base_url.clone(),
        refresh: RefreshConfig {
            interval: Duration::from_secs(args.refresh_secs.max(1)),
        },
        initial_filter: args.range,
    };

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m🌍 quakeboard\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:    \x1b[96m{url}\x1b[0m");
    println!("  Refresh:  {}s", config.refresh.interval.as_secs());
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    server::run_server(config).await
}

/// Execute the `snapshot` command - one-shot fetch of both feeds.
async fn cmd_snapshot(args: cli::SnapshotArgs) -> Result<()> {
    let client = UsgsClient::with_base_url(args.base_url).context("failed to create USGS client")?;

    let dashboard = Dashboard::new();
    dashboard.set_filter(args.range).await;
    tokio::join!(
        dashboard.refresh_current(&client),
        dashboard.refresh_historical(&client),
    );
    dashboard.close().await;

    let view = dashboard.view_model(Utc::now()).await;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_view(&mut handle, &view, args.format, args.limit)?;

    if let ViewModel::Error { message } = view {
        anyhow::bail!(message);
    }
    Ok(())
}

