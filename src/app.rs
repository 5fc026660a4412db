//! Application shell.
//!
//! Loads the detector once, then dispatches each run to the session for the
//! selected mode. When the model cannot be loaded the user is told exactly
//! once and every mode becomes inert: nothing is decoded, no camera is
//! opened, and the detector is never called.

use crate::config::AppConfig;
use crate::detect::Detector;
use crate::display::{DisplaySink, Status};
use crate::error::{ModelUnavailable, PipelineError};
use crate::ingest::{OpenCamera, Upload};
use crate::params::{Mode, Parameters};
use crate::pipeline::{
    ImageSession, ImageState, Pipeline, VideoSession, VideoState, WebcamSession, WebcamState,
};

/// Everything the user supplied for one run.
pub struct Inputs<C> {
    /// A new image upload. Taken on the next image-mode run.
    pub image: Option<Upload>,
    /// "Analyze Image" was pressed.
    pub analyze: bool,
    /// A new video upload. Taken on the next video-mode run.
    pub video: Option<Upload>,
    pub camera: C,
}

impl<C> Inputs<C> {
    pub fn new(camera: C) -> Self {
        Self {
            image: None,
            analyze: false,
            video: None,
            camera,
        }
    }
}

/// What a run did, per mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunReport {
    /// Model unavailable; nothing ran.
    Inert,
    Image { state: ImageState, defects: usize },
    Video { state: VideoState, frames: u64 },
    Webcam { state: WebcamState, frames: u64 },
}

pub struct App {
    detector: Result<Detector, ModelUnavailable>,
    image: ImageSession,
    video: VideoSession,
    webcam: WebcamSession,
}

impl App {
    /// Load the configured model. A load failure is reported to `sink` here
    /// and nowhere else.
    pub fn load<D>(config: &AppConfig, sink: &mut D) -> Self
    where
        D: DisplaySink + ?Sized,
    {
        let detector = Detector::load(&config.model, config.font_path.as_deref());
        Self::with_detector(detector, sink)
    }

    pub fn with_detector<D>(detector: Result<Detector, ModelUnavailable>, sink: &mut D) -> Self
    where
        D: DisplaySink + ?Sized,
    {
        if let Err(e) = &detector {
            log::error!("App: {}", e);
            sink.status(Status::Error(unavailable_message(e)));
        }
        Self {
            detector,
            image: ImageSession::new(),
            video: VideoSession::new(),
            webcam: WebcamSession::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.detector.is_ok()
    }

    pub fn detector(&self) -> Option<&Detector> {
        self.detector.as_ref().ok()
    }

    pub fn image_session(&self) -> &ImageSession {
        &self.image
    }

    pub fn video_session(&self) -> &VideoSession {
        &self.video
    }

    pub fn webcam_session(&self) -> &WebcamSession {
        &self.webcam
    }

    /// Run the mode selected in `params` against `inputs`.
    pub fn run<C, D>(
        &mut self,
        params: &Parameters,
        inputs: &mut Inputs<C>,
        sink: &mut D,
    ) -> Result<RunReport, PipelineError>
    where
        C: OpenCamera,
        D: DisplaySink + ?Sized,
    {
        let detector = match self.detector.as_mut() {
            Ok(detector) => detector,
            Err(e) => {
                log::debug!("App: {} mode is inert: {}", params.mode.title(), e);
                return Ok(RunReport::Inert);
            }
        };
        let mut pipeline = Pipeline::new(detector, params.confidence);

        match params.mode {
            Mode::Image => {
                if let Some(upload) = inputs.image.take() {
                    self.image.upload(&upload, sink)?;
                }
                if std::mem::take(&mut inputs.analyze) {
                    self.image.analyze(&mut pipeline, sink)?;
                }
                Ok(RunReport::Image {
                    state: self.image.state(),
                    defects: self.image.defects(),
                })
            }
            Mode::Video => {
                if let Some(upload) = inputs.video.take() {
                    let outcome = self
                        .video
                        .play(&upload, &params.stop_video, &mut pipeline, sink)?;
                    log::debug!("App: video run ended: {:?}", outcome);
                }
                Ok(RunReport::Video {
                    state: self.video.state(),
                    frames: self.video.frames(),
                })
            }
            Mode::Webcam => {
                let frames = self.webcam.run(
                    &mut inputs.camera,
                    &params.camera_on,
                    &mut pipeline,
                    sink,
                )?;
                Ok(RunReport::Webcam {
                    state: self.webcam.state(),
                    frames,
                })
            }
        }
    }
}

fn unavailable_message(e: &ModelUnavailable) -> String {
    match e {
        ModelUnavailable::Missing { path } => format!(
            "Model file '{}' not found. Place the trained weights there or set ROAD_DAMAGE_MODEL.",
            path.display()
        ),
        other => format!("Error loading model: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    struct Count(usize);

    impl DisplaySink for Count {
        fn show_original(&mut self, _: &crate::frame::Frame) -> anyhow::Result<()> {
            Ok(())
        }
        fn show_pair(
            &mut self,
            _: &crate::frame::Frame,
            _: &crate::frame::Frame,
            _: usize,
        ) -> anyhow::Result<()> {
            Ok(())
        }
        fn show_frame(&mut self, _: &crate::frame::Frame, _: usize) -> anyhow::Result<()> {
            Ok(())
        }
        fn status(&mut self, _: Status) {
            self.0 += 1;
        }
    }

    #[test]
    fn missing_model_message_names_the_file() {
        let msg = unavailable_message(&ModelUnavailable::Missing {
            path: PathBuf::from("weights/best.onnx"),
        });
        assert!(msg.starts_with("Model file 'weights/best.onnx' not found."));
    }

    #[test]
    fn unavailable_model_reports_once_at_load() {
        let mut sink = Count(0);
        let app = App::with_detector(
            Err(ModelUnavailable::Missing {
                path: PathBuf::from("best.onnx"),
            }),
            &mut sink,
        );
        assert!(!app.is_ready());
        assert_eq!(sink.0, 1);
    }
}
