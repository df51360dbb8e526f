pub mod config;
pub mod pipeline;

use anyhow::Result;
use config::TrackerConfig;
use jt_state::{Indicator, TrackingSnapshot};
use pipeline::Pipeline;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

pub use pipeline::{TrackerService, TrackerStatus, VisionStage};

/// Binary entry: `jungle-tracker [config.json]`. Runs until Ctrl-C.
pub async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "jungle_tracker=info,jungle_tracker_lib=info,jt_capture=info,jt_vision=info,jt_client=info,jt_state=info"
                    .into()
            }),
        )
        .init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = TrackerConfig::load_or_default(config_path.as_deref())?;

    let pipeline = Pipeline::start(&config)?;
    let mut snapshots = pipeline.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    log_snapshot(&pipeline, &snapshot);
                }
            }
        }
    }

    let status = pipeline.status();
    pipeline.shutdown().await;
    info!(
        "Stopped: {} ticks, {} failed",
        status.ticks, status.failed_ticks
    );
    Ok(())
}

fn log_snapshot(pipeline: &Pipeline, snapshot: &TrackingSnapshot) {
    let Some(state) = &snapshot.state else {
        return;
    };
    match snapshot.indicator(pipeline.layout(), pipeline.capture_size(), Instant::now()) {
        Some(Indicator::Dead { respawn_in, base }) => {
            info!("{} dead, respawning in {:.0}s at {}", state.identity, respawn_in, base)
        }
        Some(Indicator::LastSeen {
            location,
            zone,
            confidence,
        }) => info!(
            "{} last seen at ({}, {}) in {} ({:.0}%)",
            state.identity,
            location.x,
            location.y,
            zone.map(|z| z.to_string()).unwrap_or_else(|| "unknown zone".to_string()),
            confidence * 100.0
        ),
        None if state.visible_now => {
            if let Some(p) = state.last_seen {
                info!("{} visible at ({}, {})", state.identity, p.x, p.y);
            }
        }
        None => {}
    }
}
