//! Configuration management for the try-on renderer

use crate::{
    constants::{
        DEFAULT_ACQUISITION_TIMEOUT_MS, DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, DEFAULT_DETECTION_CONFIDENCE,
        DEFAULT_ERROR_MESSAGE, DEFAULT_INSTRUCTIONS, DEFAULT_LIGHT_LEVEL, DEFAULT_NO_FACE_PROMPT, DEFAULT_RETRY_TEXT,
        DEFAULT_SMOOTHING_FACTOR, DEFAULT_TRACKING_CONFIDENCE, GUIDANCE_FADED_OPACITY, GUIDANCE_FADE_AFTER_FRAMES,
        GUIDANCE_ROTATION_MS, LIGHT_SAMPLE_GRID, LIGHT_SAMPLE_INTERVAL,
    },
    filters::{create_filter, SignalFilter},
    settings::AppearanceSettings,
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// Renderer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Landmark detector options
    pub detector: DetectorConfig,

    /// Camera request
    pub camera: CameraConfig,

    /// Placement smoothing
    pub smoothing: SmoothingConfig,

    /// Ambient light sampling
    pub lighting: LightingConfig,

    /// User guidance texts and timing
    pub guidance: GuidanceConfig,

    /// Global default appearance for targets without overrides
    pub appearance: AppearanceSettings,
}

/// Options handed to the landmark detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Maximum number of faces to track
    pub max_faces: usize,

    /// Request refined eye/lip landmarks
    pub refine_landmarks: bool,

    /// Minimum detection confidence (0.0-1.0)
    pub min_detection_confidence: f32,

    /// Minimum tracking confidence (0.0-1.0)
    pub min_tracking_confidence: f32,
}

/// Requested camera stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Requested frame width
    pub width: u32,

    /// Requested frame height
    pub height: u32,

    /// Give up on camera acquisition after this many milliseconds
    pub acquisition_timeout_ms: u64,
}

/// Smoothing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Filter type for the placement channels
    pub filter: String,

    /// Weight of the previous value, shared by every channel; a factor in
    /// `exponential:<factor>` takes precedence
    pub factor: f64,
}

/// Light sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Side of the downsampled grid
    pub sample_grid: u32,

    /// Sample on every Nth face frame
    pub sample_interval_frames: u64,

    /// Light level before the first sample
    pub initial_level: f64,
}

/// Guidance texts and timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// Prompts cycled while a face is tracked
    pub instructions: Vec<String>,

    /// Prompt shown while no face is detected
    pub no_face_prompt: String,

    /// Message shown when the camera cannot be acquired
    pub error_message: String,

    /// Label of the retry action
    pub retry_text: String,

    /// Rotation period in milliseconds
    pub rotation_interval_ms: u64,

    /// Face frames before the banner fades
    pub fade_after_frames: u64,

    /// Banner opacity once faded
    pub faded_opacity: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
            min_tracking_confidence: DEFAULT_TRACKING_CONFIDENCE,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
            acquisition_timeout_ms: DEFAULT_ACQUISITION_TIMEOUT_MS,
        }
    }
}

impl CameraConfig {
    #[must_use]
    pub fn acquisition_timeout(&self) -> Duration {
        Duration::from_millis(self.acquisition_timeout_ms)
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            filter: "exponential".to_string(),
            factor: DEFAULT_SMOOTHING_FACTOR,
        }
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            sample_grid: LIGHT_SAMPLE_GRID,
            sample_interval_frames: LIGHT_SAMPLE_INTERVAL,
            initial_level: DEFAULT_LIGHT_LEVEL,
        }
    }
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            instructions: DEFAULT_INSTRUCTIONS.iter().map(ToString::to_string).collect(),
            no_face_prompt: DEFAULT_NO_FACE_PROMPT.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            retry_text: DEFAULT_RETRY_TEXT.to_string(),
            rotation_interval_ms: GUIDANCE_ROTATION_MS,
            fade_after_frames: GUIDANCE_FADE_AFTER_FRAMES,
            faded_opacity: GUIDANCE_FADED_OPACITY,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid configuration.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Create the placement filter from configuration
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown filter or invalid factor.
    pub fn create_filter(&self) -> Result<Box<dyn SignalFilter>> {
        create_filter(&self.smoothing.filter, self.smoothing.factor)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        if self.detector.max_faces == 0 {
            return Err(Error::ConfigError("Detector max_faces must be at least 1".to_string()));
        }
        for (name, value) in [
            ("Detection confidence", self.detector.min_detection_confidence),
            ("Tracking confidence", self.detector.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::ConfigError(format!("{name} must be between 0.0 and 1.0")));
            }
        }

        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(Error::ConfigError("Camera resolution must be non-zero".to_string()));
        }
        if self.camera.acquisition_timeout_ms == 0 {
            return Err(Error::ConfigError(
                "Camera acquisition timeout must be greater than 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.smoothing.factor) {
            return Err(Error::ConfigError("Smoothing factor must be in [0, 1)".to_string()));
        }
        self.create_filter()
            .map_err(|e| Error::ConfigError(format!("Invalid smoothing settings: {e}")))?;

        if self.lighting.sample_grid == 0 {
            return Err(Error::ConfigError("Light sample grid must be greater than 0".to_string()));
        }
        if self.lighting.sample_interval_frames == 0 {
            return Err(Error::ConfigError(
                "Light sample interval must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.lighting.initial_level) {
            return Err(Error::ConfigError(
                "Initial light level must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.guidance.instructions.is_empty() {
            return Err(Error::ConfigError("At least one instruction is required".to_string()));
        }
        if self.guidance.rotation_interval_ms == 0 {
            return Err(Error::ConfigError(
                "Guidance rotation interval must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.guidance.faded_opacity) {
            return Err(Error::ConfigError(
                "Faded guidance opacity must be between 0.0 and 1.0".to_string(),
            ));
        }

        self.appearance.validate()
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Virtual try-on overlay configuration

# Landmark detector
detector:
  max_faces: 1
  refine_landmarks: true
  min_detection_confidence: 0.5
  min_tracking_confidence: 0.5

# Camera request
camera:
  width: 640
  height: 480
  acquisition_timeout_ms: 10000

# Placement smoothing (exponential, exponential:<factor>, none)
smoothing:
  filter: "exponential"
  factor: 0.6

# Ambient light sampling
lighting:
  sample_grid: 50
  sample_interval_frames: 30
  initial_level: 0.5

# User guidance
guidance:
  instructions:
    - "Position your face in the center of the screen"
    - "Move slightly closer for better fit"
    - "Turn your head slowly to each side"
  no_face_prompt: "Position your face in the center of the screen"
  error_message: "Could not access webcam. Please ensure you've granted camera permissions."
  retry_text: "Try Again"
  rotation_interval_ms: 3000
  fade_after_frames: 300
  faded_opacity: 0.5

# Global default appearance (per-target settings override these)
appearance:
  offset_x: -2
  offset_y: -4
  size_scale: 0.9
  reflection_offset_y: 8
  reflection_size_scale: 0.5
  reflection_opacity_scale: 0.7
  shadow_opacity_scale: 0.4
  shadow_offset_y: 10
"#;
