//! Road damage detection.
//!
//! Runs a pretrained road-damage detector (cracks and potholes) over still
//! images, uploaded videos, and a live camera, and draws the detections on
//! each frame.
//!
//! # Pipeline
//!
//! Every mode is the same loop: decode a frame, run the model, draw the
//! boxes, hand the result to a display sink. Modes differ only in where the
//! frames come from and when the loop stops:
//!
//! 1. **Image**: one uploaded jpg/png, analysed on demand.
//! 2. **Video**: an uploaded mp4/avi/mov/gif, every frame in order until the
//!    end or the stop toggle.
//! 3. **Webcam**: a capture device, for as long as the run toggle stays on.
//!
//! The model is loaded once. If it cannot be loaded the application says so
//! once and every mode is inert.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (still images, video files, cameras)
//! - `detect`: the detector adapter, backends, and box rendering
//! - `pipeline`: the shared driver and the per-mode state machines
//! - `display`: where annotated frames and status text go
//! - `params`, `config`: the control surface and file/env configuration
//! - `app`: model loading and mode dispatch

pub mod app;
pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod params;
pub mod pipeline;
pub mod ui;

pub use app::{App, Inputs, RunReport};
pub use config::{AppConfig, CameraSettings, ModelSettings, OutputSettings};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use detect::{
    BoundingBox, DamageClass, Detection, DetectionResult, Detector, DetectorBackend, Renderer,
    StubBackend, STUB_MODEL_PREFIX,
};
pub use display::{Activity, DirectorySink, DisplaySink, Status};
pub use error::{ModelUnavailable, PipelineError};
pub use frame::Frame;
pub use ingest::{
    FrameSource, OpenCamera, Source, StillImageSource, Upload, VideoSource, WebcamSource,
    IMAGE_EXTENSIONS, VIDEO_EXTENSIONS,
};
pub use params::{Confidence, Mode, Parameters, Toggle, DEFAULT_CONFIDENCE};
pub use pipeline::{
    Cycle, ImageSession, ImageState, Pipeline, StreamOutcome, VideoSession, VideoState,
    WebcamSession, WebcamState,
};
