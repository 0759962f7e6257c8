mod cli;
mod commands;
mod error;
mod listener;
mod models;
mod parser;
mod pipeline;
mod platform;
mod probe;
mod process;
mod state;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use cli::Args;
use error::PipelineError;
use indicatif::{ProgressBar, ProgressStyle};
use listener::ChannelListener;
use models::{DownloadRequest, PipelineEvent};
use pipeline::Pipeline;
use platform::{HostPlatform, PlatformContext};
use process::SystemLauncher;
use state::{AppSettings, SettingsStore};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Conventional exit status after an interrupt.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let store = SettingsStore::in_home_dir()?;
    let mut settings = store.load().unwrap_or_else(|error| {
        warn!("Ignoring unreadable settings {}: {error:#}", store.path().display());
        AppSettings::default()
    });

    let output_dir = args
        .output
        .clone()
        .or_else(|| settings.download_dir.clone())
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("./downloads"));
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;
    let quality = args.quality.or(settings.quality).unwrap_or_default();

    if args.remember {
        settings.download_dir = Some(output_dir.clone());
        settings.quality = Some(quality);
        store.save(&settings)?;
        info!("Saved defaults to {}", store.path().display());
    }

    let platform = match args.assets_dir {
        Some(dir) => PlatformContext::new(HostPlatform::current(), dir),
        None => PlatformContext::detect()?,
    };
    info!(
        host = ?platform.host(),
        assets = %platform.assets_dir().display(),
        "resolved tool directory"
    );

    println!("{} -> {} [{}]", args.url, output_dir.display(), quality);

    let pipeline = Pipeline::new(platform, Arc::new(SystemLauncher));
    let (tx, mut rx) = unbounded_channel();
    let run = pipeline.start(
        DownloadRequest::new(args.url, &output_dir, quality),
        Arc::new(ChannelListener::new(tx)),
    );

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:12} {bar:40} {pos:>3}%")?
            .progress_chars("=>-"),
    );
    pb.set_message("Working");

    let mut outcome = None;
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(PipelineEvent::Progress(percent)) => pb.set_position(u64::from(percent)),
                Some(PipelineEvent::Log(line)) => {
                    if args.verbose {
                        pb.println(line);
                    }
                }
                Some(PipelineEvent::Finished { success, message }) => {
                    outcome = Some((success, message));
                    break;
                }
                None => break,
            },
            interrupted = tokio::signal::ctrl_c() => {
                if interrupted.is_ok() {
                    pb.set_message("Cancelling");
                    run.cancel();
                }
            }
        }
    }
    run.wait().await;

    match outcome {
        Some((true, path)) => {
            pb.finish_with_message("Done");
            println!("Saved to {path}");
            Ok(())
        }
        Some((false, message)) if message == PipelineError::Cancelled.to_string() => {
            pb.abandon_with_message("Cancelled");
            std::process::exit(EXIT_CANCELLED);
        }
        Some((false, message)) => {
            pb.abandon_with_message("Failed");
            Err(anyhow!(message))
        }
        None => Err(anyhow!("Pipeline stopped without reporting a result")),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
