//! Frame sources.
//!
//! This module provides the three origins of frames:
//! - Still images decoded from an upload (`still`)
//! - Video containers decoded frame by frame from an upload (`video`;
//!   GIF built in, MP4/AVI/MOV with feature `ingest-file-ffmpeg`)
//! - Live cameras (`webcam`; V4L2 with feature `ingest-v4l2`, `stub://` synthetic)
//!
//! Every source implements `FrameSource`: frames come out strictly in source
//! order, `Ok(None)` marks end-of-stream, and `release` gives back the device
//! or temp file. Sources never pace, skip, or buffer frames.

#[cfg(feature = "ingest-file-ffmpeg")]
mod file_ffmpeg;
mod normalize;
pub mod still;
pub mod video;
pub mod webcam;

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::CameraSettings;
use crate::error::PipelineError;
use crate::frame::Frame;

pub use still::StillImageSource;
pub use video::VideoSource;
pub use webcam::WebcamSource;

/// Accepted still image extensions.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Accepted video container extensions. MP4/AVI/MOV need FFmpeg.
#[cfg(feature = "ingest-file-ffmpeg")]
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "gif"];
#[cfg(not(feature = "ingest-file-ffmpeg"))]
pub const VIDEO_EXTENSIONS: &[&str] = &["gif"];

/// Produces frames in order until end-of-stream.
pub trait FrameSource {
    /// Next frame, `Ok(None)` at end-of-stream. An error is fatal for the run.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device or file. Safe to call more than once.
    fn release(&mut self);
}

/// The three frame origins behind one interface.
pub enum Source {
    Image(StillImageSource),
    Video(VideoSource),
    Webcam(WebcamSource),
}

impl FrameSource for Source {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self {
            Source::Image(source) => source.next_frame(),
            Source::Video(source) => source.next_frame(),
            Source::Webcam(source) => source.next_frame(),
        }
    }

    fn release(&mut self) {
        match self {
            Source::Image(source) => source.release(),
            Source::Video(source) => source.release(),
            Source::Webcam(source) => source.release(),
        }
    }
}

/// Opens a fresh camera session each time streaming starts.
pub trait OpenCamera {
    type Source: FrameSource;

    fn open(&mut self) -> Result<Self::Source>;
}

impl<S, F> OpenCamera for F
where
    S: FrameSource,
    F: FnMut() -> Result<S>,
{
    type Source = S;

    fn open(&mut self) -> Result<S> {
        self()
    }
}

impl OpenCamera for CameraSettings {
    type Source = Source;

    fn open(&mut self) -> Result<Source> {
        WebcamSource::open(self).map(Source::Webcam)
    }
}

/// A user-submitted file: its original name and contents.
#[derive(Clone)]
pub struct Upload {
    name: String,
    bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// The extension, when it is one of `allowed`.
    pub(crate) fn accepted_extension(&self, allowed: &[&str]) -> Result<String, PipelineError> {
        match self.extension() {
            Some(ext) if allowed.contains(&ext.as_str()) => Ok(ext),
            _ => Err(PipelineError::UnsupportedUpload {
                name: self.name.clone(),
                expected: allowed.join(", "),
            }),
        }
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_filter_is_case_insensitive() {
        let upload = Upload::new("ROAD.JPG", vec![]);
        assert_eq!(upload.accepted_extension(IMAGE_EXTENSIONS).unwrap(), "jpg");
    }

    #[test]
    fn extension_filter_rejects_other_types() {
        let err = Upload::new("clip.mkv", vec![])
            .accepted_extension(VIDEO_EXTENSIONS)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!(
                "unsupported file 'clip.mkv': expected one of {}",
                VIDEO_EXTENSIONS.join(", ")
            )
        );
        assert!(Upload::new("noext", vec![])
            .accepted_extension(IMAGE_EXTENSIONS)
            .is_err());
    }

    #[test]
    fn source_dispatches_and_releases() {
        let frame = Frame::new(image::RgbImage::new(2, 2), 0);
        let mut source = Source::Image(StillImageSource::from_frame(frame));
        source.release();
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn camera_settings_open_a_webcam_source() {
        let mut settings = CameraSettings {
            device: "stub://camera".to_string(),
            width: 8,
            height: 6,
            target_fps: 30,
        };
        let mut source = settings.open().unwrap();
        assert!(matches!(source, Source::Webcam(_)));
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        source.release();
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn closures_open_cameras() {
        let mut opened = 0;
        let mut opener = || -> Result<StillImageSource> {
            opened += 1;
            Ok(StillImageSource::from_frame(Frame::new(
                image::RgbImage::new(1, 1),
                0,
            )))
        };
        let mut source = opener.open().unwrap();
        assert!(source.next_frame().unwrap().is_some());
        drop(opener);
        assert_eq!(opened, 1);
    }
}
