//! Ambient light estimation from the live video frame.

use crate::{
    constants::{LIGHT_SAMPLE_GRID, LIGHT_SAMPLE_INTERVAL, LUMA_B, LUMA_G, LUMA_R},
    Error, Result,
};
use image::{imageops, imageops::FilterType, RgbaImage};

/// Samples a downscaled copy of the frame for its mean relative luminance
#[derive(Debug, Clone, Copy)]
pub struct LightEstimator {
    grid: u32,
    interval: u64,
}

impl Default for LightEstimator {
    fn default() -> Self {
        Self::new(LIGHT_SAMPLE_GRID, LIGHT_SAMPLE_INTERVAL)
    }
}

impl LightEstimator {
    /// Create an estimator sampling a `grid` x `grid` thumbnail every
    /// `interval` face frames
    #[must_use]
    pub fn new(grid: u32, interval: u64) -> Self {
        Self {
            grid: grid.max(1),
            interval: interval.max(1),
        }
    }

    /// Whether the `face_frame`-th processed face frame should be sampled
    #[must_use]
    pub fn is_due(&self, face_frame: u64) -> bool {
        face_frame > 0 && face_frame % self.interval == 0
    }

    /// Mean relative luminance of the frame, in `[0, 1]`
    ///
    /// # Errors
    ///
    /// Returns an error if the frame has no pixels.
    #[allow(clippy::cast_precision_loss)] // Grid holds at most u32::MAX^2 pixels
    pub fn estimate(&self, frame: &RgbaImage) -> Result<f64> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(Error::FrameRead("Video frame is empty".to_string()));
        }

        let sample = imageops::resize(frame, self.grid, self.grid, FilterType::Triangle);
        let total: f64 = sample.pixels().map(|p| relative_luminance(p.0)).sum();
        let count = f64::from(sample.width()) * f64::from(sample.height());

        Ok((total / count).clamp(0.0, 1.0))
    }
}

/// Rec. 709 luminance of an 8-bit pixel, alpha ignored
#[must_use]
pub fn relative_luminance([r, g, b, _]: [u8; 4]) -> f64 {
    LUMA_R * f64::from(r) / 255.0 + LUMA_G * f64::from(g) / 255.0 + LUMA_B * f64::from(b) / 255.0
}
