//! Try-on session: lifecycle state machine and per-frame pipeline.
//!
//! A session owns the collaborators that talk to the outside world
//! (camera, landmark detector, settings provider, asset loader) and drives
//! geometry, smoothing, light estimation, guidance and compositing for
//! every detection cycle while it is active.

use crate::{
    asset::OverlayAsset,
    compositor::{OverlayCompositor, RenderedLayers},
    config::{Config, DetectorConfig},
    constants::FALLBACK_OVERLAY_ASPECT_RATIO,
    error::AcquisitionError,
    guidance::{Guidance, GuidanceView},
    landmarks::{derive_metrics, LandmarkSet},
    lighting::LightEstimator,
    settings::{AppearanceSettings, SettingsProvider},
    smoothing::SmoothedState,
    Error, Result,
};
use async_trait::async_trait;
use image::RgbaImage;
use log::{debug, error, info, warn};
use std::time::Instant;
use tiny_skia::{Color, Pixmap};

/// Actual size of the frames a camera delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Live video source
#[async_trait]
pub trait CameraSource: Send {
    /// Start streaming; `width` x `height` is a request, the returned size
    /// is what the device actually delivers
    async fn start(&mut self, width: u32, height: u32) -> Result<FrameSize>;

    /// Stop streaming and release the device
    async fn stop(&mut self);
}

/// Facial landmark detector
#[async_trait]
pub trait LandmarkDetector: Send {
    /// Load the model with the given options
    async fn load(&mut self, config: &DetectorConfig) -> Result<()>;

    /// Detect landmark sets in one frame; an empty result means no face
    async fn detect(&mut self, frame: &RgbaImage) -> Result<Vec<LandmarkSet>>;

    /// Release the model
    async fn stop(&mut self);
}

/// Fetches encoded overlay images
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, source: &str) -> Result<Vec<u8>>;
}

/// Everything a session needs from the outside world
pub struct Collaborators {
    pub camera: Box<dyn CameraSource>,
    pub detector: Box<dyn LandmarkDetector>,
    pub settings: Box<dyn SettingsProvider>,
    pub assets: Box<dyn AssetLoader>,
}

/// Session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Initializing,
    Active,
    /// Acquisition or frame failure, with the technical detail
    Error(String),
    Closed,
}

/// What happened to one detection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The session was not active
    Ignored,
    /// No usable face; placement kept, surface cleared
    NoFace,
    /// A face was tracked and the surface redrawn
    Rendered(RenderedLayers),
}

/// Error banner for the host UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorView {
    pub message: String,
    pub retry_text: String,
    pub detail: String,
}

/// Appearance, name and overlay of one target, ready to swap in
struct LoadedTarget {
    name: Option<String>,
    appearance: AppearanceSettings,
    asset: Result<OverlayAsset>,
}

/// Virtual try-on session
pub struct TryOnSession {
    config: Config,
    camera: Box<dyn CameraSource>,
    detector: Box<dyn LandmarkDetector>,
    settings: Box<dyn SettingsProvider>,
    assets: Box<dyn AssetLoader>,
    state: SessionState,
    smoothed: SmoothedState,
    guidance: Guidance,
    light: LightEstimator,
    compositor: OverlayCompositor,
    appearance: AppearanceSettings,
    asset: Option<OverlayAsset>,
    asset_warning: Option<String>,
    target_id: Option<String>,
    target_name: Option<String>,
    frame_size: Option<FrameSize>,
    surface: Option<Pixmap>,
    face_frames: u64,
    devices_live: bool,
}

impl TryOnSession {
    /// Create an idle session
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let smoothed = SmoothedState::new(
            &config.smoothing.filter,
            config.smoothing.factor,
            config.lighting.initial_level,
        )?;
        let light = LightEstimator::new(config.lighting.sample_grid, config.lighting.sample_interval_frames);
        let guidance = Guidance::new(config.guidance.clone());
        let appearance = config.appearance;

        Ok(Self {
            config,
            camera: collaborators.camera,
            detector: collaborators.detector,
            settings: collaborators.settings,
            assets: collaborators.assets,
            state: SessionState::Idle,
            smoothed,
            guidance,
            light,
            compositor: OverlayCompositor::new(),
            appearance,
            asset: None,
            asset_warning: None,
            target_id: None,
            target_name: None,
            frame_size: None,
            surface: None,
            face_frames: 0,
            devices_live: false,
        })
    }

    /// Open the session for a try-on target.
    ///
    /// From `Idle` or `Error` the target and the devices are acquired
    /// concurrently. Opening another target while active swaps appearance
    /// and overlay in one step and restarts smoothing. Reopening the same
    /// target after `close` only restarts the devices.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error when the camera or detector cannot be
    /// brought up; the session is then in `Error`.
    pub async fn open(&mut self, target_id: &str) -> Result<()> {
        match self.state {
            SessionState::Active if self.target_id.as_deref() == Some(target_id) => {
                debug!("Target {target_id} already open");
                Ok(())
            }
            SessionState::Active => {
                info!("Switching try-on target to {target_id}");
                let loaded = load_target(self.settings.as_ref(), self.assets.as_ref(), target_id, &self.config).await;
                self.apply_target(target_id, loaded);
                Ok(())
            }
            SessionState::Closed if self.target_id.as_deref() == Some(target_id) => {
                info!("Resuming try-on session for {target_id}");
                self.state = SessionState::Initializing;
                let acquired = acquire_devices(self.camera.as_mut(), self.detector.as_mut(), &self.config).await;
                self.finish_initialization(acquired)
            }
            SessionState::Initializing => Err(Error::InvalidState("Session is already initializing".to_string())),
            SessionState::Idle | SessionState::Error(_) | SessionState::Closed => self.initialize(target_id).await,
        }
    }

    /// Retry after an acquisition failure
    ///
    /// # Errors
    ///
    /// Fails if the session is not in `Error`, or if acquisition fails again.
    pub async fn retry(&mut self) -> Result<()> {
        let SessionState::Error(detail) = &self.state else {
            return Err(Error::InvalidState(format!("Cannot retry from {:?}", self.state)));
        };
        let target_id = self
            .target_id
            .clone()
            .ok_or_else(|| Error::InvalidState("No target to retry".to_string()))?;

        info!("Retrying session after: {detail}");
        self.initialize(&target_id).await
    }

    /// Stop the camera and detector, then release the surface.
    ///
    /// Frames delivered afterwards are ignored. Smoothed state and the
    /// overlay are kept for a later reopen of the same target.
    pub async fn close(&mut self) {
        if matches!(self.state, SessionState::Idle | SessionState::Closed) {
            return;
        }

        self.release_devices().await;
        self.surface = None;
        self.state = SessionState::Closed;
        info!("Try-on session closed");
    }

    /// Run the detector on a frame and process its results
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be read; the session is then
    /// in `Error` with the camera and detector released.
    pub async fn process_frame(&mut self, frame: &RgbaImage, now: Instant) -> Result<FrameOutcome> {
        if self.state != SessionState::Active {
            return Ok(FrameOutcome::Ignored);
        }

        let outcome = match self.detector.detect(frame).await {
            Ok(results) => self.on_results(frame, &results, now),
            Err(e) if e.is_fatal() => Err(self.fail(e)),
            Err(e) => {
                warn!("Detection failed, treating cycle as empty: {e}");
                self.on_results(frame, &[], now)
            }
        };

        if outcome.is_err() {
            self.release_devices().await;
        }
        outcome
    }

    /// Process one detection cycle.
    ///
    /// Only the first landmark set is used. An empty result marks the face
    /// as lost without touching the smoothed placement.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be read or the surface cannot
    /// be allocated; the session is then in `Error`. The devices stay up
    /// until `retry`, `open` or `close` releases them.
    pub fn on_results(&mut self, frame: &RgbaImage, results: &[LandmarkSet], now: Instant) -> Result<FrameOutcome> {
        if self.state != SessionState::Active {
            debug!("Ignoring detection results while {:?}", self.state);
            return Ok(FrameOutcome::Ignored);
        }

        if frame.width() == 0 || frame.height() == 0 {
            return Err(self.fail(Error::FrameRead("Video frame is empty".to_string())));
        }
        if let Err(e) = self.ensure_surface(frame.width(), frame.height()) {
            return Err(self.fail(e));
        }

        let Some(face) = results.first() else {
            self.lose_face(now);
            return Ok(FrameOutcome::NoFace);
        };

        let aspect_ratio = self
            .asset
            .as_ref()
            .map_or(FALLBACK_OVERLAY_ASPECT_RATIO, OverlayAsset::aspect_ratio);
        let raw = match derive_metrics(face, frame.width(), frame.height(), aspect_ratio) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Unusable landmarks: {e}");
                self.lose_face(now);
                return Ok(FrameOutcome::NoFace);
            }
        };

        self.face_frames += 1;
        if self.light.is_due(self.face_frames) {
            match self.light.estimate(frame) {
                Ok(sample) => {
                    let level = self.smoothed.update_light(sample);
                    debug!("Light sample {sample:.3}, smoothed {level:.3}");
                }
                Err(e) => return Err(self.fail(e)),
            }
        }

        self.smoothed.update(&raw);
        self.guidance.update(true, now);

        let layers = match self.surface.as_mut() {
            Some(surface) => self
                .compositor
                .render(surface, &self.smoothed, self.asset.as_ref(), &self.appearance),
            None => RenderedLayers::default(),
        };
        Ok(FrameOutcome::Rendered(layers))
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub fn guidance(&self) -> GuidanceView {
        self.guidance.view()
    }

    /// Overlay surface sized to the video frame, `None` unless active
    #[must_use]
    pub fn surface(&self) -> Option<&Pixmap> {
        self.surface.as_ref()
    }

    /// Message and retry action while in `Error`
    #[must_use]
    pub fn error_view(&self) -> Option<ErrorView> {
        match &self.state {
            SessionState::Error(detail) => Some(ErrorView {
                message: self.config.guidance.error_message.clone(),
                retry_text: self.config.guidance.retry_text.clone(),
                detail: detail.clone(),
            }),
            _ => None,
        }
    }

    /// Set when the overlay for the current target could not be loaded
    #[must_use]
    pub fn asset_warning(&self) -> Option<&str> {
        self.asset_warning.as_deref()
    }

    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    /// Display name reported by the settings provider
    #[must_use]
    pub fn target_name(&self) -> Option<&str> {
        self.target_name.as_deref()
    }

    #[must_use]
    pub fn appearance(&self) -> &AppearanceSettings {
        &self.appearance
    }

    #[must_use]
    pub fn smoothed(&self) -> &SmoothedState {
        &self.smoothed
    }

    #[must_use]
    pub fn frame_size(&self) -> Option<FrameSize> {
        self.frame_size
    }

    /// Face frames processed since the session was created
    #[must_use]
    pub fn face_frames(&self) -> u64 {
        self.face_frames
    }

    async fn initialize(&mut self, target_id: &str) -> Result<()> {
        info!("Initializing try-on session for {target_id}");
        self.release_devices().await;
        self.state = SessionState::Initializing;

        let (loaded, acquired) = tokio::join!(
            load_target(self.settings.as_ref(), self.assets.as_ref(), target_id, &self.config),
            acquire_devices(self.camera.as_mut(), self.detector.as_mut(), &self.config),
        );

        self.apply_target(target_id, loaded);
        self.finish_initialization(acquired)
    }

    fn finish_initialization(&mut self, acquired: Result<FrameSize>) -> Result<()> {
        let size = match acquired {
            Ok(size) => size,
            Err(e) => {
                error!("Failed to acquire camera or detector: {e}");
                self.state = SessionState::Error(e.to_string());
                return Err(e);
            }
        };

        self.devices_live = true;
        if let Err(e) = self.ensure_surface(size.width, size.height) {
            return Err(self.fail(e));
        }
        self.frame_size = Some(size);
        self.state = SessionState::Active;
        info!("Try-on session active at {}x{}", size.width, size.height);
        Ok(())
    }

    /// Swap in a freshly loaded target; smoothing restarts from the next
    /// detection so the old placement is never blended into the new one
    fn apply_target(&mut self, target_id: &str, loaded: LoadedTarget) {
        if self.target_id.as_deref() != Some(target_id) {
            self.smoothed.reset_positional();
            self.guidance.reset();
        }

        self.appearance = loaded.appearance;
        self.target_name = loaded.name;
        match loaded.asset {
            Ok(asset) => {
                self.asset = Some(asset);
                self.asset_warning = None;
            }
            Err(e) => {
                warn!("Overlay for {target_id} unavailable: {e}");
                self.asset = None;
                self.asset_warning = Some(format!("Could not load eyewear image: {e}"));
            }
        }
        self.target_id = Some(target_id.to_string());

        if let Some(surface) = self.surface.as_mut() {
            surface.fill(Color::TRANSPARENT);
        }
    }

    fn ensure_surface(&mut self, width: u32, height: u32) -> Result<()> {
        let matches = self
            .surface
            .as_ref()
            .is_some_and(|s| s.width() == width && s.height() == height);
        if !matches {
            debug!("Allocating {width}x{height} overlay surface");
            self.surface = Some(
                Pixmap::new(width, height)
                    .ok_or_else(|| Error::Render(format!("Cannot allocate {width}x{height} surface")))?,
            );
        }
        Ok(())
    }

    fn lose_face(&mut self, now: Instant) {
        self.smoothed.mark_lost();
        self.guidance.update(false, now);
        if let Some(surface) = self.surface.as_mut() {
            surface.fill(Color::TRANSPARENT);
        }
    }

    /// Stop the camera, then the detector, if both are still running
    async fn release_devices(&mut self) {
        if !self.devices_live {
            return;
        }
        self.camera.stop().await;
        self.detector.stop().await;
        self.devices_live = false;
        debug!("Camera and detector released");
    }

    fn fail(&mut self, e: Error) -> Error {
        error!("Try-on session failed: {e}");
        self.state = SessionState::Error(e.to_string());
        e
    }
}

impl std::fmt::Debug for TryOnSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TryOnSession")
            .field("state", &self.state)
            .field("target_id", &self.target_id)
            .field("frame_size", &self.frame_size)
            .field("face_frames", &self.face_frames)
            .finish_non_exhaustive()
    }
}

/// Start the camera under the acquisition timeout while the detector loads
async fn acquire_devices(
    camera: &mut dyn CameraSource,
    detector: &mut dyn LandmarkDetector,
    config: &Config,
) -> Result<FrameSize> {
    let timeout = config.camera.acquisition_timeout();
    let (camera_result, detector_result) = tokio::join!(
        tokio::time::timeout(timeout, camera.start(config.camera.width, config.camera.height)),
        detector.load(&config.detector),
    );

    let camera_result = camera_result.unwrap_or_else(|_| Err(Error::Acquisition(AcquisitionError::Timeout(timeout))));
    match (camera_result, detector_result) {
        (Ok(size), Ok(())) => Ok(size),
        (Ok(_), Err(e)) => {
            camera.stop().await;
            Err(e)
        }
        (Err(e), detector_result) => {
            if detector_result.is_ok() {
                detector.stop().await;
            }
            Err(e)
        }
    }
}

/// Fetch settings and the overlay for a target; failures degrade to the
/// global defaults or a missing overlay
async fn load_target(
    settings: &dyn SettingsProvider,
    assets: &dyn AssetLoader,
    target_id: &str,
    config: &Config,
) -> LoadedTarget {
    let target = match settings.target(target_id).await {
        Ok(target) => target,
        Err(e) => {
            warn!("Using default appearance for {target_id}: {e}");
            return LoadedTarget {
                name: None,
                appearance: config.appearance,
                asset: Err(Error::AssetUnavailable(format!("No overlay source for '{target_id}'"))),
            };
        }
    };

    let appearance = match target.appearance {
        Some(appearance) => match appearance.validate() {
            Ok(()) => appearance,
            Err(e) => {
                warn!("Ignoring invalid appearance for {target_id}: {e}");
                config.appearance
            }
        },
        None => config.appearance,
    };

    let asset = match assets.load(&target.overlay_source).await {
        Ok(bytes) => OverlayAsset::from_bytes(&target.overlay_source, &bytes).map(|mut asset| {
            if let Err(e) = asset.derive_shadow() {
                warn!("Drawing {} without shadow: {e}", target.overlay_source);
            }
            asset
        }),
        Err(e) => Err(e),
    };

    LoadedTarget {
        name: (!target.name.is_empty()).then_some(target.name),
        appearance,
        asset,
    }
}
