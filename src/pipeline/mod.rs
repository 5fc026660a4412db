//! Pipeline driver.
//!
//! One loop serves every mode: pull a frame, detect, render, display, then
//! check whether to go on. The per-mode state machines in `image`, `video`
//! and `webcam` decide when the loop starts and what the user is told when it
//! ends.

mod image;
mod video;
mod webcam;

use crate::detect::Detector;
use crate::display::DisplaySink;
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::params::Confidence;

pub use self::image::{ImageSession, ImageState};
pub use self::video::{VideoSession, VideoState};
pub use self::webcam::{WebcamSession, WebcamState};

/// Result of one detect+render pass.
#[derive(Debug)]
pub struct Cycle {
    pub annotated: Frame,
    pub defects: usize,
}

/// How a stream run ended. The source has been released in every case.
#[derive(Debug)]
pub enum StreamOutcome {
    /// The source reported end-of-stream.
    Finished { frames: u64 },
    /// The stop condition fired between frames.
    Stopped { frames: u64 },
    Failed { frames: u64, error: PipelineError },
}

impl StreamOutcome {
    pub fn frames(&self) -> u64 {
        match self {
            StreamOutcome::Finished { frames }
            | StreamOutcome::Stopped { frames }
            | StreamOutcome::Failed { frames, .. } => *frames,
        }
    }
}

/// Detector plus the threshold for one run.
pub struct Pipeline<'d> {
    detector: &'d mut Detector,
    confidence: Confidence,
}

impl<'d> Pipeline<'d> {
    pub fn new(detector: &'d mut Detector, confidence: Confidence) -> Self {
        Self {
            detector,
            confidence,
        }
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn cycle(&mut self, frame: &Frame) -> Result<Cycle, PipelineError> {
        let result = self
            .detector
            .detect(frame, self.confidence)
            .map_err(|e| PipelineError::detect(&e))?;
        let defects = result.len();
        let annotated = self.detector.render(&result);
        Ok(Cycle { annotated, defects })
    }

    /// Pull, detect, render and display until the source ends, `keep_going`
    /// turns false, or something fails. `keep_going` is consulted before each
    /// pull only. The source is released exactly once before returning;
    /// `source_error` classifies failures reported by the source itself.
    pub fn run_stream<S, D>(
        &mut self,
        source: &mut S,
        sink: &mut D,
        mut keep_going: impl FnMut() -> bool,
        source_error: impl Fn(&anyhow::Error) -> PipelineError,
    ) -> StreamOutcome
    where
        S: FrameSource + ?Sized,
        D: DisplaySink + ?Sized,
    {
        let mut frames = 0u64;
        let outcome = loop {
            if !keep_going() {
                break StreamOutcome::Stopped { frames };
            }
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break StreamOutcome::Finished { frames },
                Err(e) => {
                    break StreamOutcome::Failed {
                        frames,
                        error: source_error(&e),
                    }
                }
            };
            let cycle = match self.cycle(&frame) {
                Ok(cycle) => cycle,
                Err(error) => break StreamOutcome::Failed { frames, error },
            };
            if let Err(e) = sink.show_frame(&cycle.annotated, cycle.defects) {
                break StreamOutcome::Failed {
                    frames,
                    error: PipelineError::display(&e),
                };
            }
            frames += 1;
        };
        source.release();
        log::debug!("Pipeline: stream ended after {} frames", outcome.frames());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{Renderer, StubBackend};
    use crate::display::Status;
    use anyhow::{anyhow, Result};

    struct Scripted {
        frames: Vec<Result<Option<Frame>>>,
        releases: usize,
    }

    impl FrameSource for Scripted {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.frames.is_empty() {
                return Ok(None);
            }
            self.frames.remove(0)
        }

        fn release(&mut self) {
            self.releases += 1;
        }
    }

    #[derive(Default)]
    struct Shown(Vec<u64>);

    impl DisplaySink for Shown {
        fn show_original(&mut self, _: &Frame) -> Result<()> {
            Ok(())
        }
        fn show_pair(&mut self, _: &Frame, _: &Frame, _: usize) -> Result<()> {
            Ok(())
        }
        fn show_frame(&mut self, annotated: &Frame, _: usize) -> Result<()> {
            self.0.push(annotated.index());
            Ok(())
        }
        fn status(&mut self, _: Status) {}
    }

    fn frame(index: u64) -> Frame {
        Frame::new(::image::RgbImage::new(32, 24), index)
    }

    fn detector() -> Detector {
        Detector::new(Box::new(StubBackend::new()), Renderer::new())
    }

    #[test]
    fn failure_mid_stream_releases_once_and_keeps_count() {
        let mut source = Scripted {
            frames: vec![Ok(Some(frame(0))), Err(anyhow!("usb unplugged"))],
            releases: 0,
        };
        let mut sink = Shown::default();
        let mut detector = detector();
        let outcome = Pipeline::new(&mut detector, Confidence::default()).run_stream(
            &mut source,
            &mut sink,
            || true,
            PipelineError::capture,
        );

        assert!(matches!(
            outcome,
            StreamOutcome::Failed {
                frames: 1,
                error: PipelineError::Capture { .. }
            }
        ));
        assert_eq!(source.releases, 1);
        assert_eq!(sink.0, vec![0]);
    }

    #[test]
    fn stop_condition_is_checked_before_every_pull() {
        let mut source = Scripted {
            frames: (0..5).map(|i| Ok(Some(frame(i)))).collect(),
            releases: 0,
        };
        let mut sink = Shown::default();
        let mut detector = detector();
        let mut budget = 2;
        let outcome = Pipeline::new(&mut detector, Confidence::default()).run_stream(
            &mut source,
            &mut sink,
            || {
                budget -= 1;
                budget >= 0
            },
            PipelineError::capture,
        );

        assert!(matches!(outcome, StreamOutcome::Stopped { frames: 2 }));
        assert_eq!(detector.calls(), 2);
        assert_eq!(source.releases, 1);
    }

    #[test]
    fn cycle_counts_rendered_defects() {
        let mut detector = detector();
        let mut pipeline = Pipeline::new(&mut detector, Confidence::new(0.0).unwrap());
        let cycle = pipeline.cycle(&frame(3)).unwrap();
        assert_eq!(cycle.defects, 8);
        assert_eq!(cycle.annotated.index(), 3);
        assert_eq!(cycle.annotated.dimensions(), (32, 24));
    }
}
