use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::ModelSettings;
use crate::detect::backend::DetectorBackend;
use crate::detect::backends::StubBackend;
use crate::detect::render::Renderer;
use crate::detect::result::DetectionResult;
use crate::error::ModelUnavailable;
use crate::frame::Frame;
use crate::params::Confidence;

/// Model paths with this prefix select the stub backend instead of a file.
pub const STUB_MODEL_PREFIX: &str = "stub://";

/// The detector adapter: a loaded model plus the renderer for its results.
///
/// Constructed once per application; if loading fails there is no detector
/// and nothing downstream runs.
pub struct Detector {
    backend: Box<dyn DetectorBackend>,
    renderer: Renderer,
    calls: u64,
}

impl Detector {
    pub fn new(backend: Box<dyn DetectorBackend>, renderer: Renderer) -> Self {
        Self {
            backend,
            renderer,
            calls: 0,
        }
    }

    /// Load the model named by `settings`, warm it up, and pair it with a renderer.
    pub fn load(settings: &ModelSettings, font: Option<&Path>) -> Result<Self, ModelUnavailable> {
        let mut backend = open_backend(settings)?;
        backend
            .warm_up()
            .map_err(|e| ModelUnavailable::LoadFailed {
                path: settings.path.clone(),
                reason: format!("{e:#}"),
            })?;
        log::info!(
            "Detector: loaded {} with {} backend",
            settings.path.display(),
            backend.name()
        );
        Ok(Self::new(backend, Renderer::discover(font)))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Number of `detect` calls made so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Run the model on `frame`, keeping only detections scoring at least
    /// `threshold`, strongest first.
    pub fn detect<'f>(
        &mut self,
        frame: &'f Frame,
        threshold: Confidence,
    ) -> Result<DetectionResult<'f>> {
        self.calls += 1;
        let mut detections = self.backend.detect(frame, threshold.get())?;
        detections.retain(|d| threshold.admits(d.confidence));
        detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        log::trace!(
            "Detector: frame {} -> {} detections",
            frame.index(),
            detections.len()
        );
        Ok(DetectionResult::new(frame, detections))
    }

    /// Copy of the result's frame with every detection drawn on it.
    pub fn render(&self, result: &DetectionResult<'_>) -> Frame {
        self.renderer.render(result)
    }
}

fn open_backend(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>, ModelUnavailable> {
    let path = &settings.path;
    if path.to_string_lossy().starts_with(STUB_MODEL_PREFIX) {
        return Ok(Box::new(StubBackend::new()));
    }
    if !path.exists() {
        return Err(ModelUnavailable::Missing { path: path.clone() });
    }
    open_file_backend(path.clone(), settings)
}

#[cfg(feature = "backend-tract")]
fn open_file_backend(
    path: PathBuf,
    settings: &ModelSettings,
) -> Result<Box<dyn DetectorBackend>, ModelUnavailable> {
    use crate::detect::backends::TractBackend;

    match TractBackend::new(&path, settings.input_size) {
        Ok(backend) => Ok(Box::new(backend.with_iou_threshold(settings.iou_threshold))),
        Err(e) => Err(ModelUnavailable::LoadFailed {
            path,
            reason: format!("{e:#}"),
        }),
    }
}

#[cfg(not(feature = "backend-tract"))]
fn open_file_backend(
    path: PathBuf,
    _settings: &ModelSettings,
) -> Result<Box<dyn DetectorBackend>, ModelUnavailable> {
    Err(ModelUnavailable::BackendDisabled {
        path,
        feature: "backend-tract",
    })
}
