//! Constants used throughout the renderer

/// Face mesh landmark indices (468-point topology)
pub mod landmark {
    /// Left eye outer corner
    pub const LEFT_EYE_OUTER: usize = 33;
    /// Right eye outer corner
    pub const RIGHT_EYE_OUTER: usize = 263;
    /// Nose tip
    pub const NOSE_TIP: usize = 4;
    /// Middle of the nose bridge
    pub const NOSE_BRIDGE_MID: usize = 6;
    /// Bottom of the nose
    pub const NOSE_BOTTOM: usize = 94;
    /// Forehead center
    pub const FOREHEAD_CENTER: usize = 10;
    /// Points in a mesh with refined iris landmarks
    pub const MESH_POINTS_REFINED: usize = 478;
}

/// Overlay width relative to the eye-corner distance
pub const EYE_SPAN_TO_WIDTH: f64 = 2.6;

/// Growth per unit of nose-tip depth
pub const NOSE_DEPTH_SCALE: f64 = 0.5;

/// Multiplier for the nose-bottom/forehead depth difference
pub const DEPTH_INDICATOR_SCALE: f64 = 10.0;

/// Aspect ratio assumed while the overlay image is still loading
pub const FALLBACK_OVERLAY_ASPECT_RATIO: f64 = 0.4;

/// Weight of the previous value in exponential smoothing
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.6;

/// Smoothing factor bounds
pub const SMOOTHING_FACTOR_MIN: f64 = 0.0;
pub const SMOOTHING_FACTOR_MAX: f64 = 1.0;

/// Ambient light level before the first sample
pub const DEFAULT_LIGHT_LEVEL: f64 = 0.5;

/// Side length of the light sampling grid
pub const LIGHT_SAMPLE_GRID: u32 = 50;

/// Light is sampled on every Nth face frame
pub const LIGHT_SAMPLE_INTERVAL: u64 = 30;

/// Rec. 709 luminance weights
pub const LUMA_R: f64 = 0.2126;
pub const LUMA_G: f64 = 0.7152;
pub const LUMA_B: f64 = 0.0722;

/// Reflection opacity at zero ambient light
pub const REFLECTION_BASE_OPACITY: f64 = 0.15;
/// Reflection opacity gained per unit of ambient light
pub const REFLECTION_LIGHT_GAIN: f64 = 0.25;
/// Secondary highlight opacity relative to the primary
pub const SECONDARY_REFLECTION_RATIO: f64 = 0.7;
/// Lens size relative to the adjusted overlay width
pub const LENS_SIZE_RATIO: f64 = 0.28;
/// Primary highlights sit at +/- width / 4.5
pub const PRIMARY_LENS_DIVISOR: f64 = 4.5;
/// Secondary highlights sit at +/- width / 6
pub const SECONDARY_LENS_DIVISOR: f64 = 6.0;
/// Highlights are lifted by height / 20 before the configured offset
pub const LENS_LIFT_DIVISOR: f64 = 20.0;

/// Perspective shear per radian of roll, in degrees
pub const PERSPECTIVE_SKEW_DEGREES: f64 = 2.0;

/// Shadow opacity before the per-target scale
pub const SHADOW_BASE_OPACITY: f64 = 1.0;
/// Minimum shadow drop in the rotated frame
pub const SHADOW_DROP_BASE: f64 = 5.0;
/// Shadow drop per unit of depth indicator
pub const SHADOW_DROP_PER_DEPTH: f64 = 2.0;
/// Darkening applied atop the overlay to derive the shadow
pub const SHADOW_DARKEN_ALPHA: f32 = 0.6;
/// Gaussian blur sigma for the shadow, in pixels
pub const SHADOW_BLUR_SIGMA: f32 = 3.0;

/// Default requested camera resolution
pub const DEFAULT_CAMERA_WIDTH: u32 = 640;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 480;

/// Default camera acquisition timeout in milliseconds
pub const DEFAULT_ACQUISITION_TIMEOUT_MS: u64 = 10_000;

/// Default detector confidence thresholds
pub const DEFAULT_DETECTION_CONFIDENCE: f32 = 0.5;
pub const DEFAULT_TRACKING_CONFIDENCE: f32 = 0.5;

/// Guidance rotates every this many milliseconds while a face is visible
pub const GUIDANCE_ROTATION_MS: u64 = 3_000;
/// Guidance fades after this many consecutive face frames
pub const GUIDANCE_FADE_AFTER_FRAMES: u64 = 300;
/// Guidance opacity once faded
pub const GUIDANCE_FADED_OPACITY: f32 = 0.5;

/// Default prompts
pub const DEFAULT_INSTRUCTIONS: [&str; 3] = [
    "Position your face in the center of the screen",
    "Move slightly closer for better fit",
    "Turn your head slowly to each side",
];
pub const DEFAULT_NO_FACE_PROMPT: &str = "Position your face in the center of the screen";
pub const DEFAULT_ERROR_MESSAGE: &str =
    "Could not access webcam. Please ensure you've granted camera permissions.";
pub const DEFAULT_RETRY_TEXT: &str = "Try Again";
