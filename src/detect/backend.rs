use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Model backend trait.
///
/// A backend turns one frame into candidate detections scored above
/// `confidence`. It holds the loaded model; it never keeps the frame after
/// `detect` returns.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run the model on a frame.
    fn detect(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once right after loading.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
