//! Overlay image and its derived drop shadow.

use crate::{
    constants::{SHADOW_BLUR_SIGMA, SHADOW_DARKEN_ALPHA},
    Error, Result,
};
use image::{imageops, Rgba, RgbaImage};
use tiny_skia::{IntSize, Pixmap, PixmapRef};

/// Eyewear image with transparency plus its lazily derived shadow
#[derive(Debug, Clone)]
pub struct OverlayAsset {
    source: String,
    image: RgbaImage,
    overlay: Pixmap,
    shadow: Option<Pixmap>,
}

impl OverlayAsset {
    /// Wrap a decoded overlay image; the shadow is derived separately
    ///
    /// # Errors
    ///
    /// Returns an error if the image has no pixels.
    pub fn from_image(source: impl Into<String>, image: RgbaImage) -> Result<Self> {
        let source = source.into();
        let overlay = to_pixmap(&image)
            .ok_or_else(|| Error::AssetUnavailable(format!("Overlay image '{source}' is empty")))?;
        Ok(Self {
            source,
            image,
            overlay,
            shadow: None,
        })
    }

    /// Decode an overlay image from encoded bytes (PNG or JPEG)
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails or the image is empty.
    pub fn from_bytes(source: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Self::from_image(source, image)
    }

    /// Derive the shadow layer if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns an error if the shadow surface cannot be allocated.
    pub fn derive_shadow(&mut self) -> Result<()> {
        if self.shadow.is_none() {
            let shadow = derive_shadow_image(&self.image);
            self.shadow = Some(to_pixmap(&shadow).ok_or_else(|| {
                Error::AssetUnavailable(format!("Shadow for '{}' could not be allocated", self.source))
            })?);
            log::debug!("Derived shadow for overlay {}", self.source);
        }
        Ok(())
    }

    /// Same asset with its shadow derived
    ///
    /// # Errors
    ///
    /// See [`OverlayAsset::derive_shadow`].
    pub fn with_shadow(mut self) -> Result<Self> {
        self.derive_shadow()?;
        Ok(self)
    }

    /// Natural height / width of the overlay image
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.image.height()) / f64::from(self.image.width())
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Premultiplied overlay ready for drawing
    #[must_use]
    pub fn overlay(&self) -> PixmapRef<'_> {
        self.overlay.as_ref()
    }

    /// Premultiplied shadow, `None` until derived
    #[must_use]
    pub fn shadow(&self) -> Option<PixmapRef<'_>> {
        self.shadow.as_ref().map(Pixmap::as_ref)
    }
}

/// Darken the overlay's opaque pixels and soften them with a blurred copy.
///
/// Colour keeps 40% of its value while alpha is preserved; the blurred
/// copy is then composited over the darkened image.
#[must_use]
pub fn derive_shadow_image(image: &RgbaImage) -> RgbaImage {
    let keep = 1.0 - SHADOW_DARKEN_ALPHA;
    let mut darkened = image.clone();
    for pixel in darkened.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        *pixel = Rgba([scale(r, keep), scale(g, keep), scale(b, keep), a]);
    }

    let blurred = imageops::blur(&darkened, SHADOW_BLUR_SIGMA);
    imageops::overlay(&mut darkened, &blurred, 0, 0);
    darkened
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Result is within 0..=255
fn scale(channel: u8, factor: f32) -> u8 {
    (f32::from(channel) * factor).round().clamp(0.0, 255.0) as u8
}

#[allow(clippy::cast_possible_truncation)] // c * a / 255 <= 255
fn premultiply(channel: u8, alpha: u8) -> u8 {
    ((u16::from(channel) * u16::from(alpha) + 127) / 255) as u8
}

/// Convert straight-alpha RGBA into a premultiplied pixmap
pub(crate) fn to_pixmap(image: &RgbaImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(image.width(), image.height())?;
    let mut data = Vec::with_capacity(image.as_raw().len());
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        data.extend_from_slice(&[premultiply(r, a), premultiply(g, a), premultiply(b, a), a]);
    }
    Pixmap::from_vec(data, size)
}
