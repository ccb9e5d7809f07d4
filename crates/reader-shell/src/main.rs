// Application crate: items are documented where it helps, not exhaustively.
#![allow(missing_docs)]

mod command;
mod config;
mod host;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eink_protocol::{FramebufferDisplay, MonotonicClock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use crate::config::ShellConfig;
use crate::host::{Flow, Host, ManualCleanup};

#[derive(Parser)]
#[command(name = "reader-shell")]
#[command(about = "E-ink refresh host for the reading surfaces", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON config file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Override the framebuffer node path
    #[arg(long, global = true)]
    device: Option<PathBuf>,
    /// Override the panel width
    #[arg(long, global = true)]
    width: Option<u32>,
    /// Override the panel height
    #[arg(long, global = true)]
    height: Option<u32>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read producer commands from stdin and drive the panel
    Run,
    /// Clear all ghosting now and wait until the panel shows it
    Cleanup,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ShellConfig::load(cli.config.as_deref())?;
    if let Some(device) = cli.device {
        config.device.device_path = device;
    }
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }

    match cli.command {
        Commands::Run => run(&config),
        Commands::Cleanup => {
            let mut fb = FramebufferDisplay::open(config.device.clone());
            fb.manual_cleanup(config.width, config.height);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(config: &ShellConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building event loop")?;
    runtime.block_on(event_loop(config))
}

async fn event_loop(config: &ShellConfig) -> Result<()> {
    let fb = FramebufferDisplay::open(config.device.clone());
    let mut host = Host::new(fb, MonotonicClock, config);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    tracing::info!(width = config.width, height = config.height, "reader shell running");
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    tracing::info!("stdin closed");
                    break;
                };
                if host.handle_line(&line) == Flow::Quit {
                    break;
                }
            }
            () = sleep_until(host.next_deadline()) => host.poll(),
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }
    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
