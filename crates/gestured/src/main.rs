//! Gesture-switch daemon.
//!
//! Turns hand gestures from a landmark feed into device commands on the
//! message bus, and keeps the local view of every device synchronized
//! with the status reports coming back.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gesture_common::{config::CONFIG_PATH, AppConfig, VERSION};
use gestured::bus;
use gestured::classifier::{GestureClassifier, GestureModel};
use gestured::debounce::CommandDebouncer;
use gestured::dispatcher::CommandDispatcher;
use gestured::feed;
use gestured::pipeline::GesturePipeline;
use gestured::sync::StateSyncController;

#[derive(Parser, Debug)]
#[command(author, version, about = "Gesture-controlled switch daemon")]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override the model artifact path from the config file.
    #[arg(long)]
    model: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("gestured v{VERSION} starting");

    let config = AppConfig::load_or_default(&args.config).context("loading configuration")?;
    let model_path = args.model.unwrap_or_else(|| config.pipeline.model_path.clone());

    // Fatal: without the frozen model there is nothing to classify with.
    let model = GestureModel::load(&model_path)
        .with_context(|| format!("loading gesture model from {}", model_path.display()))?;
    let classifier = GestureClassifier::new(model);

    let (controller, sync) = StateSyncController::new(
        Duration::from_millis(config.pipeline.intent_expiry_ms),
        Duration::from_millis(config.pipeline.expiry_sweep_ms),
    );
    tokio::spawn(controller.run());

    // Log state changes for the operator; the broadcast channel is also
    // where an embedding presentation layer would subscribe.
    let mut changes = sync.subscribe();
    tokio::spawn(async move {
        while let Ok(change) = changes.recv().await {
            info!(device = %change.device, status = %change.status, "device state");
        }
    });

    let (bus, _bus_task) = bus::connect(&config.bus, sync.clone());
    let dispatcher = CommandDispatcher::new(Arc::new(bus), sync.clone());

    match &config.pipeline.landmark_feed {
        Some(path) => match feed::open(path) {
            Ok((source, extractor)) => {
                let pipeline = GesturePipeline::new(
                    source,
                    extractor,
                    classifier,
                    CommandDebouncer::new(Duration::from_millis(
                        config.pipeline.debounce_quiet_ms,
                    )),
                    dispatcher,
                    Duration::from_millis(config.pipeline.tick_interval_ms),
                );
                tokio::spawn(pipeline.run());
            }
            Err(e) => {
                // State sync still runs; the operator restarts the feed.
                warn!(error = %e, "capture loop idle");
            }
        },
        None => warn!("no landmark feed configured, capture loop idle"),
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
