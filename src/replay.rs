//! File-backed collaborators for replaying recorded detections.
//!
//! These drive a [`TryOnSession`](crate::session::TryOnSession) without a
//! live camera or detector: a still image stands in for the video stream
//! and a YAML script supplies the landmark sets of each detection cycle.

use crate::{
    config::DetectorConfig,
    constants::landmark,
    landmarks::LandmarkSet,
    session::{AssetLoader, CameraSource, FrameSize, LandmarkDetector},
    Error, Result,
};
use async_trait::async_trait;
use image::RgbaImage;
use nalgebra::Point3;
use serde::Deserialize;
use std::{
    collections::{BTreeMap, VecDeque},
    path::{Path, PathBuf},
};

/// Camera that delivers one still image
#[derive(Debug, Clone)]
pub struct StillCamera {
    frame: RgbaImage,
    running: bool,
}

impl StillCamera {
    #[must_use]
    pub fn new(frame: RgbaImage) -> Self {
        Self { frame, running: false }
    }

    /// Load the still frame from an image file
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be opened or decoded.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let frame = image::open(path)?.to_rgba8();
        Ok(Self::new(frame))
    }

    #[must_use]
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[async_trait]
impl CameraSource for StillCamera {
    async fn start(&mut self, width: u32, height: u32) -> Result<FrameSize> {
        let size = FrameSize {
            width: self.frame.width(),
            height: self.frame.height(),
        };
        if (size.width, size.height) != (width, height) {
            log::info!(
                "Requested {width}x{height}, still frame is {}x{}",
                size.width,
                size.height
            );
        }
        self.running = true;
        Ok(size)
    }

    async fn stop(&mut self) {
        self.running = false;
    }
}

/// One face in a detection script: either every landmark in order, or
/// only the landmarks that matter keyed by index
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum FaceRecord {
    Dense(Vec<[f64; 3]>),
    Sparse(BTreeMap<usize, [f64; 3]>),
}

impl TryFrom<FaceRecord> for LandmarkSet {
    type Error = Error;

    fn try_from(record: FaceRecord) -> Result<Self> {
        let points = match record {
            FaceRecord::Dense(points) => points.into_iter().map(|[x, y, z]| Point3::new(x, y, z)).collect(),
            FaceRecord::Sparse(points) => {
                let len = points.keys().next_back().map_or(0, |last| last + 1);
                if len > landmark::MESH_POINTS_REFINED {
                    return Err(Error::ConfigError(format!(
                        "Landmark index {} is beyond the {}-point mesh",
                        len - 1,
                        landmark::MESH_POINTS_REFINED
                    )));
                }
                let mut dense = vec![Point3::origin(); len];
                for (index, [x, y, z]) in points {
                    dense[index] = Point3::new(x, y, z);
                }
                dense
            }
        };
        Ok(Self::new(points))
    }
}

/// Detector that replays scripted detection cycles, then reports no face
#[derive(Debug, Clone, Default)]
pub struct ReplayDetector {
    cycles: VecDeque<Vec<LandmarkSet>>,
    loaded: bool,
}

impl ReplayDetector {
    #[must_use]
    pub fn new(cycles: Vec<Vec<LandmarkSet>>) -> Self {
        Self {
            cycles: cycles.into(),
            loaded: false,
        }
    }

    /// Load a YAML list of cycles, each a list of faces
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a detection script
    ///
    /// # Errors
    ///
    /// Returns an error if the script is not a list of cycles or a sparse
    /// face names an index beyond the landmark mesh.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let cycles: Vec<Vec<FaceRecord>> = serde_yaml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse detection script: {e}")))?;
        let cycles = cycles
            .into_iter()
            .map(|faces| faces.into_iter().map(LandmarkSet::try_from).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(cycles))
    }

    /// Cycles not yet replayed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cycles.len()
    }
}

#[async_trait]
impl LandmarkDetector for ReplayDetector {
    async fn load(&mut self, config: &DetectorConfig) -> Result<()> {
        log::debug!("Replay detector loaded with {config:?}");
        self.loaded = true;
        Ok(())
    }

    async fn detect(&mut self, _frame: &RgbaImage) -> Result<Vec<LandmarkSet>> {
        if !self.loaded {
            return Err(Error::InvalidState("Detector used before loading".to_string()));
        }
        Ok(self.cycles.pop_front().unwrap_or_default())
    }

    async fn stop(&mut self) {
        self.loaded = false;
    }
}

/// Reads overlay images relative to a base directory
#[derive(Debug, Clone)]
pub struct FileAssetLoader {
    root: PathBuf,
}

impl FileAssetLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetLoader for FileAssetLoader {
    async fn load(&self, source: &str) -> Result<Vec<u8>> {
        let path = self.root.join(source);
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::AssetUnavailable(format!("{}: {e}", path.display())))
    }
}
