use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, DamageClass, Detection};
use crate::frame::Frame;

const COLUMNS: u32 = 4;
const ROWS: u32 = 2;

/// Stub backend for tests and demos. Emits a fixed grid of candidates whose
/// scores are spread evenly over (0, 1), one per grid cell.
#[derive(Default)]
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }

    /// Every candidate the stub can produce for a frame, before thresholding.
    pub fn candidates(width: u32, height: u32) -> Vec<Detection> {
        let cells = COLUMNS * ROWS;
        let cell_w = width as f32 / COLUMNS as f32;
        let cell_h = height as f32 / ROWS as f32;
        (0..cells)
            .map(|i| {
                let col = (i % COLUMNS) as f32;
                let row = (i / COLUMNS) as f32;
                Detection {
                    class: DamageClass::ALL[i as usize % DamageClass::ALL.len()],
                    confidence: (i as f32 + 0.5) / cells as f32,
                    bbox: BoundingBox::new(
                        col * cell_w + cell_w * 0.1,
                        row * cell_h + cell_h * 0.1,
                        cell_w * 0.8,
                        cell_h * 0.8,
                    ),
                }
            })
            .collect()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<Detection>> {
        Ok(Self::candidates(frame.width(), frame.height())
            .into_iter()
            .filter(|d| d.confidence >= confidence)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_candidates_are_disjoint_and_inside_the_frame() {
        let candidates = StubBackend::candidates(640, 480);
        assert_eq!(candidates.len(), 8);
        for (i, a) in candidates.iter().enumerate() {
            assert!(a.bbox.x >= 0.0 && a.bbox.x + a.bbox.w <= 640.0);
            assert!(a.bbox.y >= 0.0 && a.bbox.y + a.bbox.h <= 480.0);
            for b in &candidates[i + 1..] {
                assert_eq!(a.bbox.iou(&b.bbox), 0.0);
            }
        }
    }

    #[test]
    fn stub_backend_applies_threshold() {
        let frame = Frame::new(image::RgbImage::new(64, 48), 0);
        let mut backend = StubBackend::new();
        assert_eq!(backend.detect(&frame, 0.0).unwrap().len(), 8);
        assert_eq!(backend.detect(&frame, 0.5).unwrap().len(), 4);
        assert!(backend.detect(&frame, 1.0).unwrap().is_empty());
    }
}
