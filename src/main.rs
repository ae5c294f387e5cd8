//! Depth Conditioner - demo entry point
//!
//! Runs the grabber against the synthetic sensor and logs what comes out.
//! Usage: `depth-conditioner [config.json]`

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use depth_conditioner::sensor::synthetic::SyntheticSensor;
use depth_conditioner::{DepthGrabber, FilterConfig, RoiRect};

const DEPTH_WIDTH: usize = 128;
const DEPTH_HEIGHT: usize = 106;
const BATCHES: usize = 120;
const BATCH_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    log::info!("Depth Conditioner v{}", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => FilterConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FilterConfig {
            warmup_frames: 30,
            ..FilterConfig::default()
        },
    };

    let sensor = SyntheticSensor::new(DEPTH_WIDTH, DEPTH_HEIGHT, 42)
        .with_hand(90)
        .with_mapping_dropout(25)
        .with_frame_interval(Duration::from_millis(5));
    let mut grabber = DepthGrabber::start(sensor, config).context("Failed to start depth grabber")?;

    let (cw, ch) = grabber.color_size();
    grabber.set_roi(RoiRect::new(cw as f32 * 0.2, ch as f32 * 0.2, cw as f32 * 0.6, ch as f32 * 0.6));
    grabber.set_inpainting(true);

    let started = Instant::now();
    let mut received = 0;
    while received < BATCHES {
        let Some(batch) = grabber.wait_for_batch(BATCH_TIMEOUT) else {
            log::warn!("No frame within {:?}", BATCH_TIMEOUT);
            continue;
        };
        received += 1;

        let roi = grabber.mirrored_roi();
        let center = batch.depth.get((roi.min_x + roi.max_x) / 2, (roi.min_y + roi.max_y) / 2);
        if received % 20 == 0 {
            log::info!(
                "Batch {}: center depth {:?} mm, stabilized {}, interaction {}, color {}",
                received,
                center,
                grabber.is_stabilized(),
                grabber.is_interaction_detected(),
                batch.color.is_some()
            );
            if let Some(report) = grabber.last_report() {
                log::info!("Last report: {:?}", report);
            }
        }
        grabber.notify_consumed();
    }

    let elapsed = started.elapsed().as_secs_f32();
    log::info!(
        "Received {} batches from {} filtered frames in {:.2}s",
        received,
        grabber.frame_count(),
        elapsed
    );

    grabber.stop();
    Ok(())
}
