//! Landmark sets and the per-frame placement geometry derived from them.
//!
//! The detector reports points with x and y normalized to the frame and z
//! as a relative depth around zero. Placement is anchored horizontally on
//! the eye corners and vertically on the mid nose bridge.

use crate::{
    constants::{landmark, DEPTH_INDICATOR_SCALE, EYE_SPAN_TO_WIDTH, NOSE_DEPTH_SCALE},
    Error, Result,
};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// One detected face: an ordered sequence of normalized 3D landmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    points: Vec<Point3<f64>>,
}

impl LandmarkSet {
    #[must_use]
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Landmark at `index`
    ///
    /// # Errors
    ///
    /// Returns an error if the set has fewer than `index + 1` points.
    pub fn get(&self, index: usize) -> Result<&Point3<f64>> {
        self.points.get(index).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Landmark {index} missing from a set of {} points",
                self.points.len()
            ))
        })
    }

    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

impl From<Vec<Point3<f64>>> for LandmarkSet {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Self::new(points)
    }
}

/// Raw placement derived from a single detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFrameMetrics {
    /// Eye-corner midpoint, pixels
    pub center_x: f64,
    /// Mid nose bridge, pixels
    pub center_y: f64,
    /// Overlay width, pixels
    pub width: f64,
    /// Overlay height, pixels
    pub height: f64,
    /// Signed eye-line angle, radians
    pub angle: f64,
    /// Non-negative head-tilt proxy
    pub depth_indicator: f64,
}

impl RawFrameMetrics {
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [
            self.center_x,
            self.center_y,
            self.width,
            self.height,
            self.angle,
            self.depth_indicator,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

fn to_pixels(point: &Point3<f64>, frame_width: f64, frame_height: f64) -> Point2<f64> {
    Point2::new(point.x * frame_width, point.y * frame_height)
}

/// Derive the raw overlay placement for one landmark set.
///
/// `overlay_aspect_ratio` is the overlay image's height / width, so the
/// derived height keeps the asset's proportions at any face size.
///
/// # Errors
///
/// Returns an error if a required landmark is missing, the frame size is
/// zero, the aspect ratio is not positive, the eye corners coincide, or a
/// landmark coordinate makes any derived value non-finite.
pub fn derive_metrics(
    landmarks: &LandmarkSet,
    frame_width: u32,
    frame_height: u32,
    overlay_aspect_ratio: f64,
) -> Result<RawFrameMetrics> {
    if frame_width == 0 || frame_height == 0 {
        return Err(Error::InvalidInput(format!(
            "Invalid frame size: {frame_width}x{frame_height}"
        )));
    }
    if !(overlay_aspect_ratio.is_finite() && overlay_aspect_ratio > 0.0) {
        return Err(Error::InvalidInput(format!(
            "Overlay aspect ratio must be positive, got {overlay_aspect_ratio}"
        )));
    }

    let (fw, fh) = (f64::from(frame_width), f64::from(frame_height));

    let left_eye = to_pixels(landmarks.get(landmark::LEFT_EYE_OUTER)?, fw, fh);
    let right_eye = to_pixels(landmarks.get(landmark::RIGHT_EYE_OUTER)?, fw, fh);
    let bridge = to_pixels(landmarks.get(landmark::NOSE_BRIDGE_MID)?, fw, fh);
    let nose_tip = landmarks.get(landmark::NOSE_TIP)?;
    let nose_bottom = landmarks.get(landmark::NOSE_BOTTOM)?;
    let forehead = landmarks.get(landmark::FOREHEAD_CENTER)?;

    let eye_line = right_eye - left_eye;
    let eye_span = eye_line.norm();
    if !(eye_span.is_finite() && eye_span > 0.0) {
        return Err(Error::InvalidInput(format!(
            "Degenerate eye corners at ({:.1}, {:.1}) and ({:.1}, {:.1})",
            left_eye.x, left_eye.y, right_eye.x, right_eye.y
        )));
    }

    let depth_scale = 1.0 + nose_tip.z.abs() * NOSE_DEPTH_SCALE;
    let width = eye_span * EYE_SPAN_TO_WIDTH;
    let height = width * overlay_aspect_ratio;

    let metrics = RawFrameMetrics {
        center_x: (left_eye.x + right_eye.x) / 2.0,
        center_y: bridge.y,
        width: width * depth_scale,
        height: height * depth_scale,
        angle: eye_line.y.atan2(eye_line.x),
        depth_indicator: (nose_bottom.z - forehead.z).abs() * DEPTH_INDICATOR_SCALE,
    };
    if !metrics.is_finite() {
        return Err(Error::InvalidInput(format!("Non-finite placement derived: {metrics:?}")));
    }
    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MESH_SIZE: usize = 468;

    fn face(left: (f64, f64), right: (f64, f64), bridge: (f64, f64)) -> LandmarkSet {
        let mut points = vec![Point3::origin(); MESH_SIZE];
        points[landmark::LEFT_EYE_OUTER] = Point3::new(left.0, left.1, 0.0);
        points[landmark::RIGHT_EYE_OUTER] = Point3::new(right.0, right.1, 0.0);
        points[landmark::NOSE_BRIDGE_MID] = Point3::new(bridge.0, bridge.1, 0.0);
        LandmarkSet::new(points)
    }

    #[test]
    fn test_level_eyes_scenario() {
        // 1000x1000 frame: eyes at (200,300) and (400,300), bridge at (300,310)
        let set = face((0.2, 0.3), (0.4, 0.3), (0.3, 0.31));
        let metrics = derive_metrics(&set, 1000, 1000, 0.5).unwrap();

        assert!((metrics.center_x - 300.0).abs() < 1e-9);
        assert!((metrics.center_y - 310.0).abs() < 1e-9);
        assert!((metrics.width - 520.0).abs() < 1e-9);
        assert!((metrics.height - 260.0).abs() < 1e-9);
        assert_eq!(metrics.angle, 0.0);
        assert_eq!(metrics.depth_indicator, 0.0);
    }

    #[test]
    fn test_depth_scale_grows_overlay() {
        let mut points = face((0.2, 0.3), (0.4, 0.3), (0.3, 0.31)).points().to_vec();
        points[landmark::NOSE_TIP].z = -0.2;
        let metrics = derive_metrics(&LandmarkSet::new(points), 1000, 1000, 0.5).unwrap();

        // 1 + 0.2 * 0.5
        assert!((metrics.width - 520.0 * 1.1).abs() < 1e-9);
        assert!((metrics.height - 260.0 * 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_depth_indicator() {
        let mut points = face((0.2, 0.3), (0.4, 0.3), (0.3, 0.31)).points().to_vec();
        points[landmark::NOSE_BOTTOM].z = -0.05;
        points[landmark::FOREHEAD_CENTER].z = 0.03;
        let metrics = derive_metrics(&LandmarkSet::new(points), 640, 480, 0.4).unwrap();
        assert!((metrics.depth_indicator - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_tilted_eyes_give_signed_angle() {
        let set = face((0.2, 0.3), (0.4, 0.5), (0.3, 0.4));
        let metrics = derive_metrics(&set, 1000, 1000, 0.5).unwrap();
        assert!((metrics.angle - std::f64::consts::FRAC_PI_4).abs() < 1e-9);

        let set = face((0.2, 0.5), (0.4, 0.3), (0.3, 0.4));
        let metrics = derive_metrics(&set, 1000, 1000, 0.5).unwrap();
        assert!((metrics.angle + std::f64::consts::FRAC_PI_4).abs() < 1e-9);
    }

    #[test]
    fn test_uses_frame_dimensions_per_axis() {
        let set = face((0.25, 0.5), (0.75, 0.5), (0.5, 0.5));
        let metrics = derive_metrics(&set, 640, 480, 0.5).unwrap();
        assert!((metrics.center_x - 320.0).abs() < 1e-9);
        assert!((metrics.center_y - 240.0).abs() < 1e-9);
        assert!((metrics.width - 320.0 * 2.6).abs() < 1e-9);
    }

    #[test]
    fn test_missing_landmarks() {
        let set = LandmarkSet::new(vec![Point3::origin(); 10]);
        assert!(derive_metrics(&set, 640, 480, 0.5).is_err());
        assert!(LandmarkSet::new(Vec::new()).is_empty());
    }

    #[test]
    fn test_invalid_inputs() {
        let set = face((0.2, 0.3), (0.4, 0.3), (0.3, 0.31));
        assert!(derive_metrics(&set, 0, 480, 0.5).is_err());
        assert!(derive_metrics(&set, 640, 480, 0.0).is_err());
        assert!(derive_metrics(&set, 640, 480, f64::NAN).is_err());

        let same = face((0.3, 0.3), (0.3, 0.3), (0.3, 0.31));
        assert!(derive_metrics(&same, 640, 480, 0.5).is_err());
    }

    #[test]
    fn test_non_finite_depth_is_rejected() {
        for (index, value) in [
            (landmark::NOSE_TIP, f64::NAN),
            (landmark::NOSE_TIP, f64::INFINITY),
            (landmark::NOSE_BOTTOM, f64::NEG_INFINITY),
            (landmark::FOREHEAD_CENTER, f64::NAN),
        ] {
            let mut points = face((0.2, 0.3), (0.4, 0.3), (0.3, 0.31)).points().to_vec();
            points[index].z = value;
            let result = derive_metrics(&LandmarkSet::new(points), 640, 480, 0.5);
            assert!(
                matches!(result, Err(Error::InvalidInput(_))),
                "landmark {index} z={value} gave {result:?}"
            );
        }

        let mut points = face((0.2, 0.3), (0.4, 0.3), (0.3, 0.31)).points().to_vec();
        points[landmark::NOSE_BRIDGE_MID].y = f64::INFINITY;
        assert!(derive_metrics(&LandmarkSet::new(points), 640, 480, 0.5).is_err());
    }

    proptest! {
        #[test]
        fn prop_size_is_positive_and_keeps_aspect(
            lx in 0.05f64..0.45,
            rx in 0.55f64..0.95,
            ly in 0.2f64..0.8,
            ry in 0.2f64..0.8,
            tip_z in -0.3f64..0.3,
            aspect in 0.1f64..2.0
        ) {
            let mut points = face((lx, ly), (rx, ry), (0.5, 0.5)).points().to_vec();
            points[landmark::NOSE_TIP].z = tip_z;
            let metrics = derive_metrics(&LandmarkSet::new(points), 640, 480, aspect).unwrap();
            prop_assert!(metrics.width > 0.0);
            prop_assert!(metrics.height > 0.0);
            prop_assert!((metrics.height / metrics.width - aspect).abs() < 1e-9);
            prop_assert!(metrics.depth_indicator >= 0.0);
        }
    }
}
