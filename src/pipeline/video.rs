use crate::display::{Activity, DisplaySink, Status};
use crate::error::PipelineError;
use crate::ingest::{Source, Upload, VideoSource};
use crate::params::Toggle;

use super::{Pipeline, StreamOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoState {
    WaitingForUpload,
    Streaming,
    Finished,
    /// Cut short by the stop toggle.
    Stopped,
    Failed,
}

/// Video mode: every uploaded video plays through once, frame by frame.
#[derive(Debug)]
pub struct VideoSession {
    state: VideoState,
    frames: u64,
}

impl Default for VideoSession {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoSession {
    pub fn new() -> Self {
        Self {
            state: VideoState::WaitingForUpload,
            frames: 0,
        }
    }

    pub fn state(&self) -> VideoState {
        self.state
    }

    /// Frames displayed by the last run.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Decode and process `upload` until it ends, `stop` turns on, or a
    /// frame fails. `stop` is cleared first so an earlier press does not
    /// cancel a new video.
    pub fn play<D>(
        &mut self,
        upload: &Upload,
        stop: &Toggle,
        pipeline: &mut Pipeline<'_>,
        sink: &mut D,
    ) -> Result<StreamOutcome, PipelineError>
    where
        D: DisplaySink + ?Sized,
    {
        stop.set(false);
        self.frames = 0;

        let mut source = match VideoSource::from_upload(upload) {
            Ok(source) => Source::Video(source),
            Err(e) => {
                self.state = match e {
                    PipelineError::UnsupportedUpload { .. } => VideoState::WaitingForUpload,
                    _ => VideoState::Failed,
                };
                sink.status(Status::Error(e.to_string()));
                return Err(e);
            }
        };

        self.state = VideoState::Streaming;
        sink.begin(&Activity::Stream(format!("Processing {}", upload.name())));
        let what = format!("video '{}'", upload.name());
        let outcome = pipeline.run_stream(
            &mut source,
            sink,
            || !stop.is_on(),
            |e| PipelineError::decode(what.clone(), e),
        );
        self.frames = outcome.frames();

        match outcome {
            StreamOutcome::Finished { frames } => {
                log::info!("VideoSession: {} finished after {} frames", upload.name(), frames);
                self.state = VideoState::Finished;
                sink.status(Status::Success("Video processing finished.".to_string()));
                Ok(StreamOutcome::Finished { frames })
            }
            StreamOutcome::Stopped { frames } => {
                log::info!("VideoSession: {} stopped after {} frames", upload.name(), frames);
                self.state = VideoState::Stopped;
                sink.status(Status::Warning(format!(
                    "Video processing stopped after {frames} frames."
                )));
                Ok(StreamOutcome::Stopped { frames })
            }
            StreamOutcome::Failed { frames, error } => {
                log::warn!(
                    "VideoSession: {} failed after {} frames: {}",
                    upload.name(),
                    frames,
                    error
                );
                self.state = VideoState::Failed;
                sink.status(Status::Error(error.to_string()));
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Detector, Renderer, StubBackend};
    use crate::frame::Frame;
    use crate::params::Confidence;
    use ::image::codecs::gif::GifEncoder;
    use ::image::{Rgba, RgbaImage};
    use anyhow::Result;

    struct Stopper {
        shown: Vec<u64>,
        stop_after: usize,
        stop: Toggle,
        statuses: Vec<Status>,
    }

    impl DisplaySink for Stopper {
        fn show_original(&mut self, _: &Frame) -> Result<()> {
            Ok(())
        }
        fn show_pair(&mut self, _: &Frame, _: &Frame, _: usize) -> Result<()> {
            Ok(())
        }
        fn show_frame(&mut self, annotated: &Frame, _: usize) -> Result<()> {
            self.shown.push(annotated.index());
            if self.shown.len() == self.stop_after {
                self.stop.set(true);
            }
            Ok(())
        }
        fn status(&mut self, status: Status) {
            self.statuses.push(status);
        }
    }

    fn gif(frames: usize) -> Upload {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            for i in 0..frames {
                let level = (i * 30) as u8;
                let img = RgbaImage::from_pixel(16, 16, Rgba([level, level, level, 255]));
                encoder.encode_frame(::image::Frame::new(img)).unwrap();
            }
        }
        Upload::new("clip.gif", bytes)
    }

    #[test]
    fn stop_toggle_cuts_the_video_at_a_frame_boundary() {
        let mut detector = Detector::new(Box::new(StubBackend::new()), Renderer::new());
        let mut pipeline = Pipeline::new(&mut detector, Confidence::default());
        let stop = Toggle::new(true);
        let mut sink = Stopper {
            shown: Vec::new(),
            stop_after: 2,
            stop: stop.clone(),
            statuses: Vec::new(),
        };
        let mut session = VideoSession::new();

        // A stale press from an earlier video is cleared on play.
        let outcome = session
            .play(&gif(5), &stop, &mut pipeline, &mut sink)
            .unwrap();

        assert!(matches!(outcome, StreamOutcome::Stopped { frames: 2 }));
        assert_eq!(session.state(), VideoState::Stopped);
        assert_eq!(sink.shown, vec![0, 1]);
    }

    #[test]
    fn unsupported_upload_keeps_waiting() {
        let mut detector = Detector::new(Box::new(StubBackend::new()), Renderer::new());
        let mut pipeline = Pipeline::new(&mut detector, Confidence::default());
        let stop = Toggle::default();
        let mut sink = Stopper {
            shown: Vec::new(),
            stop_after: 0,
            stop: stop.clone(),
            statuses: Vec::new(),
        };
        let mut session = VideoSession::new();

        let err = session
            .play(
                &Upload::new("clip.mkv", vec![0; 8]),
                &stop,
                &mut pipeline,
                &mut sink,
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedUpload { .. }));
        assert_eq!(session.state(), VideoState::WaitingForUpload);
        assert_eq!(sink.statuses.len(), 1);
    }
}
