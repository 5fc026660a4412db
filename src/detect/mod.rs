mod backend;
mod backends;
mod detector;
mod nms;
mod render;
mod result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use detector::{Detector, STUB_MODEL_PREFIX};
pub use nms::non_max_suppression;
pub use render::{class_color, Renderer};
pub use result::{BoundingBox, DamageClass, Detection, DetectionResult};
