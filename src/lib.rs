//! Face-relative eyewear overlay rendering for virtual try-on.
//!
//! This library places an eyewear image on a tracked face in a live video
//! stream using:
//! - Facial landmarks from an external detector (normalized coordinates)
//! - Exponential smoothing of the derived placement across frames
//! - Ambient light sampled from the video frame
//! - `tiny-skia` compositing of a drop shadow, the overlay and lens highlights
//!
//! Each detection cycle runs:
//! 1. Geometry: landmarks to raw center, size, angle and depth
//! 2. Smoothing: raw metrics blended into the persistent placement
//! 3. Light estimation on a fixed cadence
//! 4. Compositing onto a transparent surface sized to the video frame
//!
//! # Examples
//!
//! ## Geometry and Smoothing
//!
//! ```no_run
//! use tryon_overlay::{landmarks::{derive_metrics, LandmarkSet}, smoothing::SmoothedState};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let landmarks = LandmarkSet::new(Vec::new());
//! // Landmarks come from the detector in normalized coordinates
//! let raw = derive_metrics(&landmarks, 640, 480, 0.4)?;
//!
//! let mut state = SmoothedState::exponential(0.6)?;
//! let placement = state.update(&raw);
//! println!("Overlay at ({:.1}, {:.1}), {:.1} px wide", placement.x, placement.y, placement.width);
//! # Ok(())
//! # }
//! ```
//!
//! ## Compositing
//!
//! ```no_run
//! use tryon_overlay::{
//!     asset::OverlayAsset, compositor::OverlayCompositor, settings::AppearanceSettings,
//!     smoothing::SmoothedState,
//! };
//! use tiny_skia::Pixmap;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("frames/aviator.png")?;
//! let asset = OverlayAsset::from_bytes("frames/aviator.png", &bytes)?.with_shadow()?;
//!
//! let state = SmoothedState::exponential(0.6)?;
//! let mut surface = Pixmap::new(640, 480).ok_or("surface")?;
//! let layers = OverlayCompositor::new().render(&mut surface, &state, Some(&asset), &AppearanceSettings::default());
//! println!("Overlay drawn: {}", layers.overlay);
//! # Ok(())
//! # }
//! ```
//!
//! ## Replaying a Session
//!
//! ```no_run
//! use tryon_overlay::{
//!     config::Config,
//!     replay::{FileAssetLoader, ReplayDetector, StillCamera},
//!     session::{Collaborators, TryOnSession},
//!     settings::SettingsCatalog,
//! };
//! use std::time::Instant;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let camera = StillCamera::from_file("frame.png")?;
//! let frame = camera.frame().clone();
//!
//! let mut session = TryOnSession::new(
//!     Config::default(),
//!     Collaborators {
//!         camera: Box::new(camera),
//!         detector: Box::new(ReplayDetector::from_file("detections.yaml")?),
//!         settings: Box::new(SettingsCatalog::from_file("catalog.yaml")?),
//!         assets: Box::new(FileAssetLoader::new(".")),
//!     },
//! )?;
//!
//! session.open("aviator").await?;
//! session.process_frame(&frame, Instant::now()).await?;
//! println!("{}", session.guidance().text);
//! session.close().await;
//! # Ok(())
//! # }
//! ```

/// Overlay image and derived drop shadow
pub mod asset;

/// Shadow, overlay and lens highlight compositing
pub mod compositor;

/// Configuration management
pub mod config;

/// Constants used throughout the library
pub mod constants;

/// Error types and result handling
pub mod error;

/// Signal filtering for smoothing placement channels
pub mod filters;

/// Rotating user guidance
pub mod guidance;

/// Landmark sets and overlay geometry
pub mod landmarks;

/// Ambient light estimation
pub mod lighting;

/// File-backed camera, detector and asset loader
pub mod replay;

/// Session lifecycle and per-frame pipeline
pub mod session;

/// Per-target appearance settings
pub mod settings;

/// Persistent smoothed placement state
pub mod smoothing;

pub use error::{Error, Result};
