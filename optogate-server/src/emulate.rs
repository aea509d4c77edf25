//! Offline emulation mode (§10.9, grounded on `timebox.py`'s `emulate`):
//! replay a directory of single-page TIFF frames, or one multi-page TIFF
//! stack, through the same `Gater` core used for live WebSocket frames, at
//! a configurable simulated framerate. Useful for deterministic demos and
//! smoke tests without camera hardware attached.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use optogate_core::frame::{Frame, PixelData};
use optogate_core::GaterSettings;

use crate::config::ServerConfig;
use crate::session::GatingSession;

fn image_to_pixels(image: DynamicImage) -> (usize, usize, PixelData) {
    match image {
        DynamicImage::ImageLuma16(buf) => {
            let (w, h) = (buf.width() as usize, buf.height() as usize);
            (w, h, PixelData::Mono16(buf.into_raw()))
        }
        other => {
            let luma = other.into_luma8();
            let (w, h) = (luma.width() as usize, luma.height() as usize);
            (w, h, PixelData::Mono8(luma.into_raw()))
        }
    }
}

/// Load every `*.tiff`/`*.tif` file in `dir`, sorted by filename, as one
/// frame each, spaced `1/framerate` seconds apart starting at `t0`.
fn load_frame_directory(dir: &Path, framerate: f64, t0: f64) -> anyhow::Result<Vec<Frame>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()),
                Some(ext) if ext == "tiff" || ext == "tif"
            )
        })
        .collect();
    paths.sort();

    let mut frames = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        let image = image::open(path)?;
        let (w, h, pixels) = image_to_pixels(image);
        let timestamp_s = t0 + i as f64 / framerate;
        frames.push(Frame::new(h, w, pixels, timestamp_s));
    }
    Ok(frames)
}

pub async fn emulate(
    config: ServerConfig,
    input_dir: PathBuf,
    framerate: f64,
) -> anyhow::Result<()> {
    let frames = load_frame_directory(&input_dir, framerate, 0.0)?;
    tracing::info!(count = frames.len(), "loaded emulated frames");

    let settings = GaterSettings::new(config.gater.clone())?;
    let mut session = GatingSession::new(
        settings,
        config.period_dir.clone(),
        Box::new(optogate_trigger::LoggingTriggerSink::default()),
    );

    let mut fired = 0usize;
    for frame in frames {
        let outcome = session.process_frame(frame)?;
        if outcome.send_trigger {
            fired += 1;
        }
    }
    tracing::info!(fired, "emulation complete");
    Ok(())
}
