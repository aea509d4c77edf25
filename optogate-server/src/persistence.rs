//! Reference-cycle persistence (§6 "Persisted state" / §10.5): every
//! accepted reference cycle is written as one `NNN.tiff` per frame under
//! `<period_dir>/<ISO8601 timestamp>/`, grounding the original
//! `ref.save_period`/`io.imsave` behaviour with the `image` crate's TIFF
//! encoder instead of scikit-image/tifffile.

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Luma};
use optogate_core::frame::{Frame, PixelData};

#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error("creating period directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding reference frame {index}: {source}")]
    Image {
        index: usize,
        #[source]
        source: image::ImageError,
    },
}

/// Write `reference_cycle` to a freshly created, timestamped subdirectory
/// of `period_dir`, one zero-padded `NNN.tiff` per frame. Returns the
/// directory written to.
pub fn save_reference_cycle(
    period_dir: &Path,
    reference_cycle: &[Frame],
) -> Result<PathBuf, PersistError> {
    let stamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ");
    let dir = period_dir.join(stamp.to_string());
    std::fs::create_dir_all(&dir)?;

    for (index, frame) in reference_cycle.iter().enumerate() {
        let path = dir.join(format!("{index:03}.tiff"));
        save_frame(frame, &path).map_err(|source| PersistError::Image { index, source })?;
    }

    Ok(dir)
}

fn save_frame(frame: &Frame, path: &Path) -> Result<(), image::ImageError> {
    match &frame.pixels {
        PixelData::Mono8(data) => {
            let buf: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(frame.width as u32, frame.height as u32, data.clone())
                    .expect("pixel buffer length already validated by Frame::new");
            buf.save(path)
        }
        PixelData::Mono16(data) => {
            let buf: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_raw(frame.width as u32, frame.height as u32, data.clone())
                    .expect("pixel buffer length already validated by Frame::new");
            buf.save(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(val: u8) -> Frame {
        Frame::new(2, 2, PixelData::Mono8(vec![val; 4]), 0.0)
    }

    #[test]
    fn writes_one_tiff_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = vec![frame(0), frame(50), frame(100)];
        let written = save_reference_cycle(dir.path(), &cycle).unwrap();
        for i in 0..3 {
            assert!(written.join(format!("{i:03}.tiff")).is_file());
        }
    }
}
