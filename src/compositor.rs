//! Draws the shadow, the overlay and synthetic lens highlights onto the
//! output surface.
//!
//! Each layer is drawn in its own transform scope: the shadow is translated
//! and rotated, the overlay and highlights additionally get a horizontal
//! shear proportional to the roll angle to fake a curved frame.

use crate::{
    asset::{to_pixmap, OverlayAsset},
    constants::{
        LENS_LIFT_DIVISOR, LENS_SIZE_RATIO, PERSPECTIVE_SKEW_DEGREES, PRIMARY_LENS_DIVISOR,
        REFLECTION_BASE_OPACITY, REFLECTION_LIGHT_GAIN, SECONDARY_LENS_DIVISOR, SECONDARY_REFLECTION_RATIO,
        SHADOW_BASE_OPACITY, SHADOW_DROP_BASE, SHADOW_DROP_PER_DEPTH,
    },
    settings::AppearanceSettings,
    smoothing::{Placement, SmoothedState},
    Error, Result,
};
use image::{Rgba, RgbaImage};
use std::f64::consts::{FRAC_PI_3, FRAC_PI_6};
use tiny_skia::{
    BlendMode, Color, FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, PixmapRef, Rect, Transform,
};

/// Horizontal shear applied for a given roll angle, radians
#[must_use]
pub fn perspective_skew(angle: f64) -> f64 {
    angle * PERSPECTIVE_SKEW_DEGREES.to_radians()
}

/// Opacity of the primary lens highlights
#[must_use]
pub fn reflection_opacity(light_level: f64, appearance: &AppearanceSettings) -> f64 {
    (REFLECTION_BASE_OPACITY + light_level * REFLECTION_LIGHT_GAIN) * appearance.reflection_opacity_scale
}

/// Shadow drop inside the rotated frame for a given depth indicator
#[must_use]
pub fn shadow_drop(depth: f64) -> f64 {
    SHADOW_DROP_BASE + depth * SHADOW_DROP_PER_DEPTH
}

/// One elliptical lens highlight in overlay-local coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Highlight {
    pub center_x: f64,
    pub center_y: f64,
    pub radius_x: f64,
    pub radius_y: f64,
    pub rotation: f64,
    pub opacity: f64,
}

/// Primary and secondary highlight for both lenses, left lens first
#[must_use]
pub fn lens_highlights(width: f64, height: f64, opacity: f64, appearance: &AppearanceSettings) -> [Highlight; 4] {
    let lens_size = width * LENS_SIZE_RATIO * appearance.reflection_size_scale;
    let lens_y = -height / LENS_LIFT_DIVISOR + appearance.reflection_offset_y;

    let primary = |side: f64| Highlight {
        center_x: side * width / PRIMARY_LENS_DIVISOR,
        center_y: lens_y,
        radius_x: lens_size / 4.0,
        radius_y: lens_size / 6.0,
        rotation: FRAC_PI_3,
        opacity,
    };
    let secondary = |side: f64| Highlight {
        center_x: side * width / SECONDARY_LENS_DIVISOR,
        center_y: lens_y + lens_size / 10.0,
        radius_x: lens_size / 6.0,
        radius_y: lens_size / 10.0,
        rotation: FRAC_PI_6,
        opacity: opacity * SECONDARY_REFLECTION_RATIO,
    };

    [primary(-1.0), secondary(-1.0), primary(1.0), secondary(1.0)]
}

/// Which layers made it onto the surface for a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderedLayers {
    pub shadow: bool,
    pub overlay: bool,
    pub reflections: bool,
}

impl RenderedLayers {
    #[must_use]
    pub fn any(&self) -> bool {
        self.shadow || self.overlay || self.reflections
    }
}

#[allow(clippy::cast_possible_truncation)]
fn rotation(angle: f64) -> Transform {
    let (sin, cos) = (angle.sin() as f32, angle.cos() as f32);
    Transform::from_row(cos, sin, -sin, cos, 0.0, 0.0)
}

#[allow(clippy::cast_possible_truncation)]
fn translation(x: f64, y: f64) -> Transform {
    Transform::from_translate(x as f32, y as f32)
}

#[allow(clippy::cast_possible_truncation)]
fn shear_x(skew: f64) -> Transform {
    Transform::from_row(1.0, 0.0, skew as f32, 1.0, 0.0, 0.0)
}

/// Overlay compositor; stateless apart from its sampling quality
#[derive(Debug, Clone, Copy)]
pub struct OverlayCompositor {
    quality: FilterQuality,
}

impl Default for OverlayCompositor {
    fn default() -> Self {
        Self {
            quality: FilterQuality::Bilinear,
        }
    }
}

impl OverlayCompositor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear `surface` and draw the current placement.
    ///
    /// Missing inputs degrade the frame instead of failing it: without a
    /// seeded placement or an overlay nothing is drawn, and without a
    /// shadow only the shadow layer is omitted.
    pub fn render(
        &self,
        surface: &mut Pixmap,
        state: &SmoothedState,
        asset: Option<&OverlayAsset>,
        appearance: &AppearanceSettings,
    ) -> RenderedLayers {
        surface.fill(Color::TRANSPARENT);

        let (Some(placement), Some(asset)) = (state.placement(), asset) else {
            return RenderedLayers::default();
        };
        self.draw(surface, &placement, state.light_level(), asset, appearance)
    }

    /// Draw a placement without clearing the surface first
    pub fn draw(
        &self,
        surface: &mut Pixmap,
        placement: &Placement,
        light_level: f64,
        asset: &OverlayAsset,
        appearance: &AppearanceSettings,
    ) -> RenderedLayers {
        let width = placement.width * appearance.size_scale;
        let height = placement.height * appearance.size_scale;
        if !(width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite()) {
            log::debug!("Skipping frame with degenerate overlay size {width}x{height}");
            return RenderedLayers::default();
        }

        let x = placement.x + appearance.offset_x;
        let y = placement.y + appearance.offset_y;
        let mut layers = RenderedLayers::default();

        if let Some(shadow) = asset.shadow() {
            let scope = translation(x, y + appearance.shadow_offset_y).pre_concat(rotation(placement.angle));
            let opacity = SHADOW_BASE_OPACITY * appearance.shadow_opacity_scale;
            let drop = shadow_drop(placement.depth);
            self.draw_image(surface, shadow, scope, width, height, drop, opacity);
            layers.shadow = true;
        }

        let scope = translation(x, y)
            .pre_concat(rotation(placement.angle))
            .pre_concat(shear_x(perspective_skew(placement.angle)));

        self.draw_image(surface, asset.overlay(), scope, width, height, 0.0, 1.0);
        layers.overlay = true;

        let opacity = reflection_opacity(light_level, appearance);
        if opacity > 0.0 {
            for highlight in lens_highlights(width, height, opacity, appearance) {
                fill_highlight(surface, scope, &highlight);
            }
            layers.reflections = true;
        }

        layers
    }

    /// Draw `image` stretched to `width` x `height`, centered on the scope
    /// origin and shifted down by `drop`
    #[allow(clippy::cast_possible_truncation, clippy::too_many_arguments)]
    fn draw_image(
        &self,
        surface: &mut Pixmap,
        image: PixmapRef<'_>,
        scope: Transform,
        width: f64,
        height: f64,
        drop: f64,
        opacity: f64,
    ) {
        let scale = Transform::from_scale(
            (width / f64::from(image.width())) as f32,
            (height / f64::from(image.height())) as f32,
        );
        let transform = scope
            .pre_concat(translation(-width / 2.0, -height / 2.0 + drop))
            .pre_concat(scale);
        let paint = PixmapPaint {
            opacity: opacity.clamp(0.0, 1.0) as f32,
            blend_mode: BlendMode::SourceOver,
            quality: self.quality,
        };
        surface.draw_pixmap(0, 0, image, &paint, transform, None);
    }
}

/// Composite the overlay surface over a video frame
///
/// # Errors
///
/// Returns an error if the frame is empty or its size differs from the
/// surface.
pub fn flatten(frame: &RgbaImage, surface: &Pixmap) -> Result<RgbaImage> {
    if (frame.width(), frame.height()) != (surface.width(), surface.height()) {
        return Err(Error::Render(format!(
            "Surface is {}x{} but frame is {}x{}",
            surface.width(),
            surface.height(),
            frame.width(),
            frame.height()
        )));
    }
    let mut canvas = to_pixmap(frame).ok_or_else(|| Error::Render("Video frame is empty".to_string()))?;
    canvas.draw_pixmap(0, 0, surface.as_ref(), &PixmapPaint::default(), Transform::identity(), None);

    let mut output = RgbaImage::new(frame.width(), frame.height());
    for (out, pixel) in output.pixels_mut().zip(canvas.pixels()) {
        let color = pixel.demultiply();
        *out = Rgba([color.red(), color.green(), color.blue(), color.alpha()]);
    }
    Ok(output)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn fill_highlight(surface: &mut Pixmap, scope: Transform, highlight: &Highlight) {
    let Some(oval) = Rect::from_xywh(
        (-highlight.radius_x) as f32,
        (-highlight.radius_y) as f32,
        (highlight.radius_x * 2.0) as f32,
        (highlight.radius_y * 2.0) as f32,
    ) else {
        return;
    };
    let Some(path) = PathBuilder::from_oval(oval) else {
        return;
    };

    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, (highlight.opacity.clamp(0.0, 1.0) * 255.0).round() as u8);
    paint.blend_mode = BlendMode::Plus;
    paint.anti_alias = true;

    let transform = scope
        .pre_concat(translation(highlight.center_x, highlight.center_y))
        .pre_concat(rotation(highlight.rotation));
    surface.fill_path(&path, &paint, FillRule::Winding, transform, None);
}
