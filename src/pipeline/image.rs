use crate::display::{Activity, DisplaySink, Status};
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::{FrameSource, Source, StillImageSource, Upload};

use super::Pipeline;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageState {
    WaitingForUpload,
    /// Decoded and shown, not analysed yet.
    Ready,
    Analyzing,
    /// Original and annotated pair on display.
    Shown,
}

/// Image mode: upload once, analyse on demand, keep the result on display.
#[derive(Debug)]
pub struct ImageSession {
    state: ImageState,
    original: Option<Frame>,
    annotated: Option<Frame>,
    defects: usize,
}

impl Default for ImageSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageSession {
    pub fn new() -> Self {
        Self {
            state: ImageState::WaitingForUpload,
            original: None,
            annotated: None,
            defects: 0,
        }
    }

    pub fn state(&self) -> ImageState {
        self.state
    }

    pub fn original(&self) -> Option<&Frame> {
        self.original.as_ref()
    }

    pub fn annotated(&self) -> Option<&Frame> {
        self.annotated.as_ref()
    }

    /// Defects found by the last analysis.
    pub fn defects(&self) -> usize {
        self.defects
    }

    /// Decode a new upload and show it. Any previous result is discarded,
    /// including when the new upload fails to decode.
    pub fn upload<D>(&mut self, upload: &Upload, sink: &mut D) -> Result<(), PipelineError>
    where
        D: DisplaySink + ?Sized,
    {
        self.reset();
        let what = || format!("image '{}'", upload.name());
        let source = StillImageSource::from_upload(upload).map(Source::Image);
        let result = source.and_then(|mut source| {
            let frame = source
                .next_frame()
                .map_err(|e| PipelineError::decode(what(), &e))?
                .ok_or_else(|| PipelineError::Decode {
                    what: what(),
                    reason: "no frame".to_string(),
                })?;
            source.release();
            sink.show_original(&frame)
                .map_err(|e| PipelineError::display(&e))?;
            Ok(frame)
        });

        match result {
            Ok(frame) => {
                log::info!(
                    "ImageSession: {} ready ({}x{})",
                    upload.name(),
                    frame.width(),
                    frame.height()
                );
                self.original = Some(frame);
                self.state = ImageState::Ready;
                Ok(())
            }
            Err(e) => {
                sink.status(Status::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Run one detect+render cycle on the uploaded image. Without an upload
    /// this does nothing and returns `Ok(None)`.
    pub fn analyze<D>(
        &mut self,
        pipeline: &mut Pipeline<'_>,
        sink: &mut D,
    ) -> Result<Option<usize>, PipelineError>
    where
        D: DisplaySink + ?Sized,
    {
        let Some(original) = self.original.as_ref() else {
            log::debug!("ImageSession: analyze requested before upload");
            return Ok(None);
        };
        let previous = self.state;
        self.state = ImageState::Analyzing;
        sink.begin(&Activity::Analyze);

        let shown = pipeline.cycle(original).and_then(|cycle| {
            sink.show_pair(original, &cycle.annotated, cycle.defects)
                .map_err(|e| PipelineError::display(&e))?;
            Ok(cycle)
        });

        match shown {
            Ok(cycle) => {
                self.defects = cycle.defects;
                self.annotated = Some(cycle.annotated);
                self.state = ImageState::Shown;
                sink.status(Status::Success(format!(
                    "Analysis Complete. Found {} defects.",
                    cycle.defects
                )));
                Ok(Some(cycle.defects))
            }
            Err(e) => {
                self.state = if previous == ImageState::Shown {
                    ImageState::Shown
                } else {
                    ImageState::Ready
                };
                sink.status(Status::Error(e.to_string()));
                Err(e)
            }
        }
    }

    fn reset(&mut self) {
        self.state = ImageState::WaitingForUpload;
        self.original = None;
        self.annotated = None;
        self.defects = 0;
    }
}
