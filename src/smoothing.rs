//! Persistent smoothed placement state.

use crate::{
    constants::DEFAULT_LIGHT_LEVEL,
    filters::{create_filter, exponential::ExponentialFilter, filter_factor, SignalFilter},
    landmarks::RawFrameMetrics,
    Result,
};

/// Fully seeded, smoothed placement for one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Overlay center, pixels
    pub x: f64,
    /// Overlay center, pixels
    pub y: f64,
    /// Overlay width before the appearance scale, pixels
    pub width: f64,
    /// Overlay height before the appearance scale, pixels
    pub height: f64,
    /// Roll angle, radians
    pub angle: f64,
    /// Head-tilt proxy used for the shadow drop
    pub depth: f64,
}

/// Smoothed placement channels, ambient light and the in-frame flag.
///
/// Positional channels start unset and are seeded by the first detection.
/// The light channel starts at [`DEFAULT_LIGHT_LEVEL`] and survives
/// [`SmoothedState::reset_positional`].
pub struct SmoothedState {
    x: Box<dyn SignalFilter>,
    y: Box<dyn SignalFilter>,
    width: Box<dyn SignalFilter>,
    height: Box<dyn SignalFilter>,
    angle: Box<dyn SignalFilter>,
    depth: Box<dyn SignalFilter>,
    light: ExponentialFilter,
    in_frame: bool,
}

impl SmoothedState {
    /// Create a state whose positional channels use the named filter.
    ///
    /// A factor given as `exponential:<factor>` replaces `factor` for the
    /// light channel too.
    ///
    /// # Errors
    ///
    /// Returns an error if the filter name or factor is invalid.
    pub fn new(filter: &str, factor: f64, initial_light: f64) -> Result<Self> {
        let factor = filter_factor(filter, factor)?;
        let make = || create_filter(filter, factor);
        Ok(Self {
            x: make()?,
            y: make()?,
            width: make()?,
            height: make()?,
            angle: make()?,
            depth: make()?,
            light: ExponentialFilter::seeded(factor, initial_light.clamp(0.0, 1.0)),
            in_frame: false,
        })
    }

    /// Exponential smoothing on every channel with the given factor
    ///
    /// # Errors
    ///
    /// Returns an error if `factor` is outside `[0, 1)`.
    pub fn exponential(factor: f64) -> Result<Self> {
        Self::new("exponential", factor, DEFAULT_LIGHT_LEVEL)
    }

    /// Blend one frame of raw metrics and return the smoothed placement
    pub fn update(&mut self, raw: &RawFrameMetrics) -> Placement {
        self.in_frame = true;
        Placement {
            x: self.x.apply(raw.center_x),
            y: self.y.apply(raw.center_y),
            width: self.width.apply(raw.width),
            height: self.height.apply(raw.height),
            angle: self.angle.apply(raw.angle),
            depth: self.depth.apply(raw.depth_indicator),
        }
    }

    /// Blend a fresh ambient light sample
    pub fn update_light(&mut self, sample: f64) -> f64 {
        self.light.apply(sample.clamp(0.0, 1.0))
    }

    /// Current smoothed placement, `None` until seeded
    #[must_use]
    pub fn placement(&self) -> Option<Placement> {
        Some(Placement {
            x: self.x.value()?,
            y: self.y.value()?,
            width: self.width.value()?,
            height: self.height.value()?,
            angle: self.angle.value()?,
            depth: self.depth.value()?,
        })
    }

    /// Clear the positional channels so the next detection seeds them
    pub fn reset_positional(&mut self) {
        for channel in [
            &mut self.x,
            &mut self.y,
            &mut self.width,
            &mut self.height,
            &mut self.angle,
            &mut self.depth,
        ] {
            channel.reset();
        }
    }

    /// Record that the current cycle had no face
    pub fn mark_lost(&mut self) {
        self.in_frame = false;
    }

    #[must_use]
    pub fn light_level(&self) -> f64 {
        self.light.value().unwrap_or(DEFAULT_LIGHT_LEVEL)
    }

    #[must_use]
    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    #[must_use]
    pub fn factor(&self) -> f64 {
        self.light.factor()
    }
}

impl std::fmt::Debug for SmoothedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmoothedState")
            .field("placement", &self.placement())
            .field("light_level", &self.light_level())
            .field("in_frame", &self.in_frame)
            .field("filter", &self.x.name())
            .finish()
    }
}
