//! Display sinks.
//!
//! A `DisplaySink` is where finished frames and status text go. The pipeline
//! hands it either a static original/annotated pair (image mode) or one
//! annotated frame at a time (video and webcam), and never keeps frames
//! around after the call returns.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::OutputSettings;
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ui::{StageGuard, StreamProgress, Ui};

const ORIGINAL_FILE: &str = "original.png";
const ANNOTATED_FILE: &str = "annotated.png";
const LATEST_FILE: &str = "latest.jpg";
const FRAMES_DIR: &str = "frames";
const ANALYZE_STAGE: &str = "Analyzing road surface";

/// Status text shown to the user, by severity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Info(String),
    Success(String),
    Warning(String),
    Error(String),
}

impl Status {
    pub fn text(&self) -> &str {
        match self {
            Status::Info(text)
            | Status::Success(text)
            | Status::Warning(text)
            | Status::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Status::Info(_) => "info",
            Status::Success(_) => "ok",
            Status::Warning(_) => "warning",
            Status::Error(_) => "error",
        };
        write!(f, "[{}] {}", tag, self.text())
    }
}

/// Long-running work a sink may want to show progress for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Activity {
    /// One detect+render pass over an uploaded image.
    Analyze,
    /// A frame stream, named for the progress line.
    Stream(String),
}

pub trait DisplaySink {
    fn begin(&mut self, _activity: &Activity) {}

    /// Show an uploaded image before analysis.
    fn show_original(&mut self, frame: &Frame) -> Result<()>;

    /// Show the original and annotated image side by side.
    fn show_pair(&mut self, original: &Frame, annotated: &Frame, defects: usize) -> Result<()>;

    /// Replace the streaming placeholder with the next annotated frame.
    fn show_frame(&mut self, annotated: &Frame, defects: usize) -> Result<()>;

    fn status(&mut self, status: Status);
}

impl<D: DisplaySink + ?Sized> DisplaySink for &mut D {
    fn begin(&mut self, activity: &Activity) {
        (**self).begin(activity)
    }

    fn show_original(&mut self, frame: &Frame) -> Result<()> {
        (**self).show_original(frame)
    }

    fn show_pair(&mut self, original: &Frame, annotated: &Frame, defects: usize) -> Result<()> {
        (**self).show_pair(original, annotated, defects)
    }

    fn show_frame(&mut self, annotated: &Frame, defects: usize) -> Result<()> {
        (**self).show_frame(annotated, defects)
    }

    fn status(&mut self, status: Status) {
        (**self).status(status)
    }
}

/// Writes frames into an output directory and status text to the terminal.
///
/// Image mode produces `original.png` and `annotated.png`. Streams overwrite
/// `latest.jpg` on every frame and, with `keep_frames`, also keep
/// `frames/frame_NNNNNN.jpg`.
pub struct DirectorySink {
    dir: PathBuf,
    keep_frames: bool,
    ui: Ui,
    stage: Option<StageGuard>,
    stream: Option<StreamProgress>,
    pending: Option<String>,
}

impl DirectorySink {
    pub fn new(settings: &OutputSettings, ui: Ui) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(&settings.dir).map_err(|source| PipelineError::Io {
            path: settings.dir.clone(),
            source,
        })?;
        if settings.keep_frames {
            let frames = settings.dir.join(FRAMES_DIR);
            std::fs::create_dir_all(&frames).map_err(|source| PipelineError::Io {
                path: frames,
                source,
            })?;
        }
        Ok(Self {
            dir: settings.dir.clone(),
            keep_frames: settings.keep_frames,
            ui,
            stage: None,
            stream: None,
            pending: None,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE)
    }

    fn write(&self, frame: &Frame, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(name);
        frame
            .image()
            .save(&path)
            .with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    fn finish_activity(&mut self) {
        self.stage = None;
        self.stream = None;
        self.pending = None;
    }
}

impl DisplaySink for DirectorySink {
    fn begin(&mut self, activity: &Activity) {
        self.finish_activity();
        match activity {
            Activity::Analyze => self.stage = Some(self.ui.stage(ANALYZE_STAGE)),
            // The progress line starts with the first frame.
            Activity::Stream(name) => self.pending = Some(name.clone()),
        }
    }

    fn show_original(&mut self, frame: &Frame) -> Result<()> {
        let path = self.write(frame, ORIGINAL_FILE)?;
        log::info!(
            "DirectorySink: original {}x{} saved to {}",
            frame.width(),
            frame.height(),
            path.display()
        );
        Ok(())
    }

    fn show_pair(&mut self, original: &Frame, annotated: &Frame, defects: usize) -> Result<()> {
        self.stage = None;
        self.write(original, ORIGINAL_FILE)?;
        let path = self.write(annotated, ANNOTATED_FILE)?;
        log::info!(
            "DirectorySink: annotated image with {} defects saved to {}",
            defects,
            path.display()
        );
        Ok(())
    }

    fn show_frame(&mut self, annotated: &Frame, defects: usize) -> Result<()> {
        if self.stream.is_none() {
            let name = self.pending.take().unwrap_or_else(|| "Streaming".to_string());
            self.stream = Some(self.ui.stream(&name));
        }
        self.write(annotated, LATEST_FILE)?;
        if self.keep_frames {
            let name = format!("{}/frame_{:06}.jpg", FRAMES_DIR, annotated.index());
            self.write(annotated, &name)?;
        }
        log::debug!(
            "DirectorySink: frame {} with {} defects",
            annotated.index(),
            defects
        );
        if let Some(stream) = self.stream.as_mut() {
            stream.frame(defects);
        }
        Ok(())
    }

    fn status(&mut self, status: Status) {
        self.finish_activity();
        match &status {
            Status::Error(text) => log::error!("DirectorySink: {}", text),
            Status::Warning(text) => log::warn!("DirectorySink: {}", text),
            Status::Info(text) | Status::Success(text) => log::debug!("DirectorySink: {}", text),
        }
        self.ui.message(&status.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frame(index: u64) -> Frame {
        Frame::new(RgbImage::from_pixel(6, 4, image::Rgb([10, 20, 30])), index)
    }

    fn sink(dir: &Path, keep_frames: bool) -> DirectorySink {
        let settings = OutputSettings {
            dir: dir.join("out"),
            keep_frames,
        };
        DirectorySink::new(&settings, Ui::plain()).unwrap()
    }

    #[test]
    fn pair_writes_both_images() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let mut sink = sink(tmp.path(), false);
        sink.show_pair(&frame(0), &frame(0), 3)?;
        assert!(sink.dir().join(ORIGINAL_FILE).exists());
        assert!(sink.dir().join(ANNOTATED_FILE).exists());
        Ok(())
    }

    #[test]
    fn stream_overwrites_latest_and_keeps_numbered_frames() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let mut sink = sink(tmp.path(), true);
        sink.begin(&Activity::Stream("Processing video".into()));
        sink.show_frame(&frame(0), 0)?;
        sink.show_frame(&frame(1), 2)?;
        sink.status(Status::Success("done".into()));

        assert!(sink.latest_path().exists());
        assert!(sink.dir().join("frames/frame_000000.jpg").exists());
        assert!(sink.dir().join("frames/frame_000001.jpg").exists());
        Ok(())
    }

    #[test]
    fn without_keep_frames_only_latest_exists() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let mut sink = sink(tmp.path(), false);
        sink.show_frame(&frame(5), 1)?;
        assert!(sink.latest_path().exists());
        assert!(!sink.dir().join(FRAMES_DIR).exists());
        Ok(())
    }

    #[test]
    fn status_renders_with_severity_tag() {
        let status = Status::Warning("Camera is stopped.".into());
        assert_eq!(status.to_string(), "[warning] Camera is stopped.");
        assert_eq!(status.text(), "Camera is stopped.");
        assert!(Status::Error("x".into()).is_error());
    }
}
