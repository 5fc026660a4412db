use crate::display::{Activity, DisplaySink, Status};
use crate::error::PipelineError;
use crate::ingest::OpenCamera;
use crate::params::Toggle;

use super::{Pipeline, StreamOutcome};

const CAPTURE_FAILED: &str = "Failed to capture image from camera.";
const CAMERA_STOPPED: &str = "Camera is stopped.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebcamState {
    Idle,
    Streaming,
    /// Terminal: the session never opens the camera again.
    Failed,
}

/// Webcam mode: stream while the run toggle is on, opening the camera fresh
/// for every run.
#[derive(Debug)]
pub struct WebcamSession {
    state: WebcamState,
    frames: u64,
    opens: u64,
}

impl Default for WebcamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WebcamSession {
    pub fn new() -> Self {
        Self {
            state: WebcamState::Idle,
            frames: 0,
            opens: 0,
        }
    }

    pub fn state(&self) -> WebcamState {
        self.state
    }

    /// Frames displayed by the last run.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Times the camera has been opened over the session's life.
    pub fn opens(&self) -> u64 {
        self.opens
    }

    /// Stream from `camera` for as long as `run` stays on. With `run` off
    /// the camera is not touched at all.
    pub fn run<C, D>(
        &mut self,
        camera: &mut C,
        run: &Toggle,
        pipeline: &mut Pipeline<'_>,
        sink: &mut D,
    ) -> Result<u64, PipelineError>
    where
        C: OpenCamera + ?Sized,
        D: DisplaySink + ?Sized,
    {
        if self.state == WebcamState::Failed {
            log::debug!("WebcamSession: failed earlier, not reopening the camera");
            return Ok(0);
        }
        self.frames = 0;
        if !run.is_on() {
            sink.status(Status::Info(CAMERA_STOPPED.to_string()));
            return Ok(0);
        }

        self.opens += 1;
        let mut source = match camera.open() {
            Ok(source) => source,
            Err(e) => {
                log::warn!("WebcamSession: open failed: {:#}", e);
                self.state = WebcamState::Failed;
                sink.status(Status::Error(CAPTURE_FAILED.to_string()));
                return Err(PipelineError::capture(&e));
            }
        };

        self.state = WebcamState::Streaming;
        sink.begin(&Activity::Stream("Streaming camera".to_string()));
        let outcome = pipeline.run_stream(
            &mut source,
            sink,
            || run.is_on(),
            PipelineError::capture,
        );
        self.frames = outcome.frames();

        match outcome {
            StreamOutcome::Stopped { frames } | StreamOutcome::Finished { frames } => {
                log::info!("WebcamSession: stopped after {} frames", frames);
                self.state = WebcamState::Idle;
                sink.status(Status::Info(CAMERA_STOPPED.to_string()));
                Ok(frames)
            }
            StreamOutcome::Failed { frames, error } => {
                log::warn!("WebcamSession: failed after {} frames: {}", frames, error);
                self.state = WebcamState::Failed;
                let text = match &error {
                    PipelineError::Capture { .. } => CAPTURE_FAILED.to_string(),
                    other => other.to_string(),
                };
                sink.status(Status::Error(text));
                Err(error)
            }
        }
    }
}
