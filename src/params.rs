//! Control surface state.
//!
//! `Parameters` is the single record a user edits: threshold, mode, and the
//! two toggles that start/stop streaming loops. The driver receives it by
//! reference and re-reads the toggles once per frame.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

pub const DEFAULT_CONFIDENCE: f32 = 0.25;

/// Confidence threshold, always within `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Confidence(f32);

impl Confidence {
    pub fn new(value: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(anyhow!(
                "confidence threshold must be within 0..=1, got {}",
                value
            ));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> f32 {
        self.0
    }

    /// True when `score` is retained under this threshold.
    pub fn admits(self, score: f32) -> bool {
        score >= self.0
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self(DEFAULT_CONFIDENCE)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Top-level operating mode. Each selects a different frame source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Image,
    Video,
    Webcam,
}

impl Mode {
    pub fn title(self) -> &'static str {
        match self {
            Mode::Image => "Image Detection",
            Mode::Video => "Video Detection",
            Mode::Webcam => "Live Webcam",
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(Mode::Image),
            "video" => Ok(Mode::Video),
            "webcam" | "camera" => Ok(Mode::Webcam),
            other => Err(anyhow!("unknown mode '{}'", other)),
        }
    }
}

/// Shared on/off switch. Clones observe the same state, so a signal handler
/// can flip a toggle the pipeline is polling.
#[derive(Clone, Debug, Default)]
pub struct Toggle(Arc<AtomicBool>);

impl Toggle {
    pub fn new(on: bool) -> Self {
        Self(Arc::new(AtomicBool::new(on)))
    }

    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self, on: bool) {
        self.0.store(on, Ordering::SeqCst);
    }
}

/// User-adjustable parameters read by the pipeline driver.
#[derive(Clone, Debug, Default)]
pub struct Parameters {
    pub confidence: Confidence,
    pub mode: Mode,
    /// "Start Camera": webcam frames are pulled only while this is on.
    pub camera_on: Toggle,
    /// "Stop Processing": ends a running video at the next frame boundary.
    pub stop_video: Toggle,
}

impl Parameters {
    pub fn new(confidence: Confidence, mode: Mode) -> Self {
        Self {
            confidence,
            mode,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_rejects_out_of_range() {
        assert!(Confidence::new(-0.01).is_err());
        assert!(Confidence::new(1.01).is_err());
        assert!(Confidence::new(f32::NAN).is_err());
        assert_eq!(Confidence::new(0.0).unwrap().get(), 0.0);
        assert_eq!(Confidence::new(1.0).unwrap().get(), 1.0);
    }

    #[test]
    fn confidence_admits_scores_at_or_above_threshold() {
        let t = Confidence::new(0.5).unwrap();
        assert!(t.admits(0.5));
        assert!(t.admits(0.9));
        assert!(!t.admits(0.49));
    }

    #[test]
    fn toggle_clones_share_state() {
        let a = Toggle::new(false);
        let b = a.clone();
        b.set(true);
        assert!(a.is_on());
    }

    #[test]
    fn modes_parse_from_cli_names() {
        assert_eq!("Video".parse::<Mode>().unwrap(), Mode::Video);
        assert_eq!("camera".parse::<Mode>().unwrap(), Mode::Webcam);
        assert!("audio".parse::<Mode>().is_err());
    }
}
