//! CLI harness for the stereo vision streaming core.
//!
//! Stands in for the host-language binding layer this crate does not
//! itself provide: loads a TOML config, wires it into a `Session`,
//! assigns cameras, starts streaming, and logs callbacks until Ctrl-C.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use stereo_vision_core::config::Config;
use stereo_vision_core::{CaptureConfig, Role, Session};

#[derive(Parser, Debug)]
#[command(name = "stereo-vision-core")]
#[command(about = "Dual-camera capture, JPEG encode, and stereo detection streaming core")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    info!(config_path = %cli.config, "loading configuration");
    let config = Config::load(&cli.config)?;
    let vision = &config.vision;

    let session = Arc::new(Session::new());

    let status = session.init(&vision.grpc_target);
    if status != stereo_vision_core::AivStatus::Ok {
        bail!("session init failed: {:?}", status);
    }

    session.set_jpeg_config(0, 0, vision.jpeg_quality);
    session.set_score_threshold(vision.score_threshold);
    session.set_image_id_prefix(&vision.image_prefix);
    session.set_stereo_stream_base_id(&vision.stream_base);

    session.set_callbacks(
        Some(Box::new(|result| {
            info!(
                image_id = %result.image_id,
                frame_index = result.frame_index,
                detections = result.detections.len(),
                "detection result"
            );
        })),
        Some(Box::new(|status, message| {
            error!(status = ?status, message = %message, "session error");
        })),
        Some(Box::new(|image_id, frame_index, timestamp_sec| {
            tracing::debug!(image_id = %image_id, frame_index, timestamp_sec, "frame sent");
        })),
    );

    let mut assigned = false;
    if vision.camera_left.enabled {
        let cfg = CaptureConfig {
            width: vision.camera_left.width,
            height: vision.camera_left.height,
            fps: vision.camera_left.fps,
        };
        session.set_camera_for_role(Role::Left, &vision.camera_left.device, cfg);
        assigned = true;
    }
    if vision.camera_right.enabled {
        let cfg = CaptureConfig {
            width: vision.camera_right.width,
            height: vision.camera_right.height,
            fps: vision.camera_right.fps,
        };
        session.set_camera_for_role(Role::Right, &vision.camera_right.device, cfg);
        assigned = true;
    }
    if !assigned {
        bail!("no camera role enabled in configuration");
    }

    let status = session.start_streaming_stereo();
    if status != stereo_vision_core::AivStatus::Ok {
        bail!("failed to start streaming: {:?}", status);
    }
    info!("streaming started, press Ctrl+C to stop");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to wait for ctrl-c");
        }
    });

    info!("shutting down");
    session.shutdown();
    Ok(())
}
