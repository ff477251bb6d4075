//! Photo Reel slideshow runner (reel-slideshow) - Main entry point
//!
//! Plays the photos of a library folder as a narrated slideshow, reading
//! narrations and metadata sidecars from a store folder. Presentation itself is
//! left to the log: each advance, narration and timeout is reported there.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use reel_common::events::{FinishReason, ReelEvent};
use reel_slideshow::audio::{list_devices, SymphoniaBackend};
use reel_slideshow::stores::fs::{FsAudioStore, FsImageSource, FsMetadataStore};
use reel_slideshow::stores::Stores;
use reel_slideshow::{Slideshow, SlideshowConfig};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for reel-slideshow
#[derive(Parser, Debug)]
#[command(name = "reel-slideshow")]
#[command(about = "Narrated photo slideshow for Photo Reel")]
#[command(version)]
struct Args {
    /// Folder containing the photos to play
    #[arg(short, long, env = "REEL_LIBRARY", required_unless_present = "list_audio_devices")]
    library: Option<PathBuf>,

    /// Folder holding metadata sidecars and narrations
    #[arg(short, long, env = "REEL_STORE_ROOT", required_unless_present = "list_audio_devices")]
    store_root: Option<PathBuf>,

    /// Account whose narrations and metadata are used
    #[arg(short, long, env = "REEL_USER")]
    user: Option<String>,

    /// Config file (overrides REEL_CONFIG and the platform config file)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Index of the first photo to show
    #[arg(long, default_value_t = 0)]
    start_index: usize,

    /// Seconds to show photos without narration
    #[arg(long, env = "REEL_SLIDE_SECONDS")]
    slide_seconds: Option<u64>,

    /// Output device for narrations (host default when omitted)
    #[arg(long, env = "REEL_AUDIO_DEVICE")]
    audio_device: Option<String>,

    /// Print the available output devices and exit
    #[arg(long)]
    list_audio_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reel_slideshow=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting reel-slideshow (git {}, built {}, {})",
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if args.list_audio_devices {
        for name in list_devices().context("Failed to list audio devices")? {
            println!("{}", name);
        }
        return Ok(());
    }
    let (Some(library), Some(store_root)) = (args.library, args.store_root) else {
        bail!("--library and --store-root are required");
    };

    let mut config =
        SlideshowConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(user) = args.user {
        config.user_id = user;
    }
    if let Some(seconds) = args.slide_seconds {
        config.slide_duration_ms = seconds.saturating_mul(1000);
    }
    if args.audio_device.is_some() {
        config.audio_device = args.audio_device;
    }
    config.validate().context("Invalid configuration")?;

    info!("Library: {}", library.display());
    info!("Store root: {}", store_root.display());

    let images = FsImageSource::new(&library);
    let assets = images
        .scan()
        .with_context(|| format!("Failed to scan library {}", library.display()))?;
    if assets.is_empty() {
        bail!("No photos found in {}", library.display());
    }
    info!("Found {} photos", assets.len());

    let stores = Stores::new(
        Arc::new(FsMetadataStore::new(&store_root)),
        Arc::new(FsAudioStore::new(&store_root)),
        Arc::new(images),
    );

    let backend = Arc::new(SymphoniaBackend::with_device(config.audio_device.clone()));
    let slideshow = Slideshow::spawn(assets, stores, backend, config)
        .context("Failed to start slideshow")?;
    let mut events = slideshow.subscribe();

    if args.start_index > 0 {
        slideshow
            .jump_to(args.start_index)
            .await
            .context("Invalid start index")?;
    } else {
        slideshow.play().await.context("Failed to start playback")?;
    }

    let finished = async {
        loop {
            match events.recv().await {
                Ok(ReelEvent::SlideshowFinished { reason, .. }) => return Some(reason),
                Ok(ReelEvent::Advanced { index, asset_id, .. }) => {
                    info!("Showing {} ({}/{})", asset_id, index + 1, slideshow.len());
                }
                Ok(ReelEvent::AudioFailed { asset_id, reason }) => {
                    warn!("Narration for {} unavailable: {}", asset_id, reason);
                }
                Ok(event) => debug!("{}", event.event_type()),
                Err(RecvError::Lagged(skipped)) => warn!("Skipped {} events", skipped),
                Err(RecvError::Closed) => return None,
            }
        }
    };

    tokio::select! {
        reason = finished => match reason {
            Some(FinishReason::EndOfList) => info!("Slideshow complete"),
            Some(FinishReason::LoadTimeout) => warn!("Slideshow stopped: photos took too long to load"),
            None => warn!("Slideshow session closed unexpectedly"),
        },
        _ = shutdown_signal() => {
            slideshow.stop().await.ok();
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
