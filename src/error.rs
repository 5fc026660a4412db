//! Error taxonomy surfaced to callers.
//!
//! Internal plumbing uses `anyhow`; these types are what the application
//! shell turns into status text. Every variant is terminal for the operation
//! that produced it: nothing here is retried.

use std::path::PathBuf;

use thiserror::Error;

/// The detection model could not be made available. Reported once at startup.
#[derive(Clone, Debug, Error)]
pub enum ModelUnavailable {
    #[error("model file '{}' not found", path.display())]
    Missing { path: PathBuf },
    #[error("failed to load model '{}': {reason}", path.display())]
    LoadFailed { path: PathBuf, reason: String },
    #[error("model '{}' needs the {feature} feature, which this build lacks", path.display())]
    BackendDisabled {
        path: PathBuf,
        feature: &'static str,
    },
}

/// Failure of one pipeline run (one image analysis, one video, one camera session).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailable),
    #[error("unsupported file '{name}': expected one of {expected}")]
    UnsupportedUpload { name: String, expected: String },
    #[error("failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },
    #[error("failed to capture frame from camera: {reason}")]
    Capture { reason: String },
    #[error("detection failed: {reason}")]
    Detect { reason: String },
    #[error("display failed: {reason}")]
    Display { reason: String },
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn decode(what: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Decode {
            what: what.into(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn capture(err: &anyhow::Error) -> Self {
        Self::Capture {
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn detect(err: &anyhow::Error) -> Self {
        Self::Detect {
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn display(err: &anyhow::Error) -> Self {
        Self::Display {
            reason: format!("{err:#}"),
        }
    }
}
