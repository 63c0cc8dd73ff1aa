//! User guidance: rotating instructions while a face is tracked, a fixed
//! prompt with warning styling when it is lost.

use crate::config::GuidanceConfig;
use std::time::{Duration, Instant};

/// Visual emphasis of the guidance banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidanceStyle {
    /// No face in frame
    Warning,
    /// Cycling instructions
    Neutral,
}

impl GuidanceStyle {
    /// Banner background as RGBA with alpha in `[0, 1]`
    #[must_use]
    pub fn background(self) -> (u8, u8, u8, f32) {
        match self {
            Self::Warning => (255, 87, 87, 0.7),
            Self::Neutral => (0, 0, 0, 0.6),
        }
    }
}

/// What the host should display this frame
#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceView {
    pub text: String,
    pub style: GuidanceStyle,
    /// Banner opacity; lowered once the user has settled in
    pub opacity: f32,
}

/// Guidance state machine
#[derive(Debug, Clone)]
pub struct Guidance {
    config: GuidanceConfig,
    index: usize,
    in_frame: bool,
    last_change: Option<Instant>,
    face_streak: u64,
    faded: bool,
}

impl Guidance {
    #[must_use]
    pub fn new(config: GuidanceConfig) -> Self {
        Self {
            config,
            index: 0,
            in_frame: false,
            last_change: None,
            face_streak: 0,
            faded: false,
        }
    }

    /// Advance the guidance for one processed detection cycle
    pub fn update(&mut self, face_in_frame: bool, now: Instant) {
        if !face_in_frame {
            if self.in_frame {
                log::debug!("Face lost, showing no-face prompt");
            }
            self.in_frame = false;
            self.index = 0;
            self.face_streak = 0;
            return;
        }

        self.in_frame = true;
        self.face_streak = self.face_streak.saturating_add(1);
        if self.face_streak > self.config.fade_after_frames {
            self.faded = true;
        }

        let interval = Duration::from_millis(self.config.rotation_interval_ms);
        match self.last_change {
            None => self.last_change = Some(now),
            Some(last) if now.saturating_duration_since(last) > interval => {
                self.index = (self.index + 1) % self.config.instructions.len().max(1);
                self.last_change = Some(now);
            }
            Some(_) => {}
        }
    }

    /// Forget rotation progress, e.g. when a new target is opened
    pub fn reset(&mut self) {
        self.index = 0;
        self.in_frame = false;
        self.last_change = None;
        self.face_streak = 0;
        self.faded = false;
    }

    #[must_use]
    pub fn view(&self) -> GuidanceView {
        let (text, style) = if self.in_frame {
            let text = self
                .config
                .instructions
                .get(self.index)
                .cloned()
                .unwrap_or_else(|| self.config.no_face_prompt.clone());
            (text, GuidanceStyle::Neutral)
        } else {
            (self.config.no_face_prompt.clone(), GuidanceStyle::Warning)
        };

        GuidanceView {
            text,
            style,
            opacity: if self.faded { self.config.faded_opacity } else { 1.0 },
        }
    }

    #[must_use]
    pub fn is_faded(&self) -> bool {
        self.faded
    }
}
