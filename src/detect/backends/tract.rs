#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::nms::non_max_suppression;
use crate::detect::result::{BoundingBox, DamageClass, Detection};
use crate::frame::Frame;

/// Padding value for the letterbox area of the network input.
const LETTERBOX_FILL: f32 = 144.0 / 255.0;
const BOX_FIELDS: usize = 4;

/// Tract-based backend for YOLOv8/YOLOv11 detection exports in ONNX format.
///
/// Expects a single `[1, 3, S, S]` input and a `[1, 4 + C, N]` output where
/// each of the N columns holds `cx, cy, w, h` followed by C class scores.
/// No network I/O; the only disk access is the model load.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for `input_size` square input.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        check_input_size(input_size)?;
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            iou_threshold: 0.45,
        })
    }

    /// Override the default NMS IoU threshold.
    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    /// Letterbox the frame into the network input. Returns the tensor and the
    /// scale factor from source pixels to input pixels.
    fn build_input(&self, frame: &Frame) -> Result<(Tensor, f32)> {
        let (w0, h0) = frame.dimensions();
        if w0 == 0 || h0 == 0 {
            bail!("cannot run detection on an empty {}x{} frame", w0, h0);
        }

        let size = self.input_size;
        let ratio = (size as f32 / w0 as f32).min(size as f32 / h0 as f32);
        let w_new = ((w0 as f32 * ratio).round() as u32).clamp(1, size);
        let h_new = ((h0 as f32 * ratio).round() as u32).clamp(1, size);
        let resized = image::imageops::resize(frame.image(), w_new, h_new, FilterType::Triangle);

        let side = size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            let (x, y) = (x as u32, y as u32);
            if x < w_new && y < h_new {
                resized.get_pixel(x, y).0[c] as f32 / 255.0
            } else {
                LETTERBOX_FILL
            }
        });

        Ok((input.into_tensor(), ratio))
    }

    fn decode(
        &self,
        outputs: &TVec<TValue>,
        frame: &Frame,
        ratio: f32,
        confidence: f32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let preds = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [batch, fields, anchors]")?;

        let (batch, fields, anchors) = preds.dim();
        if batch != 1 || fields <= BOX_FIELDS {
            bail!(
                "unexpected model output shape [{}, {}, {}]",
                batch,
                fields,
                anchors
            );
        }
        let num_classes = fields - BOX_FIELDS;
        let (w0, h0) = (frame.width() as f32, frame.height() as f32);

        let mut detections = Vec::new();
        for i in 0..anchors {
            let (class_index, score) = (0..num_classes)
                .map(|c| (c, preds[[0, BOX_FIELDS + c, i]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !(score >= confidence) {
                continue;
            }
            let Some(class) = DamageClass::from_index(class_index) else {
                log::debug!("TractBackend: dropping unknown class index {}", class_index);
                continue;
            };

            let cx = preds[[0, 0, i]] / ratio;
            let cy = preds[[0, 1, i]] / ratio;
            let w = preds[[0, 2, i]] / ratio;
            let h = preds[[0, 3, i]] / ratio;
            let bbox = BoundingBox::new(cx - w / 2.0, cy - h / 2.0, w, h).clamp_to(w0, h0);

            detections.push(Detection {
                class,
                confidence: score.min(1.0),
                bbox,
            });
        }

        non_max_suppression(&mut detections, self.iou_threshold);
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<Detection>> {
        let (input, ratio) = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(&outputs, frame, ratio, confidence)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size as usize;
        let blank = tract_ndarray::Array4::<f32>::from_elem((1, 3, side, side), LETTERBOX_FILL);
        self.model
            .run(tvec!(blank.into_tensor().into()))
            .context("ONNX warm-up run failed")?;
        Ok(())
    }
}

/// YOLO exports downsample by 32, so the square input must be a multiple of it.
fn check_input_size(input_size: u32) -> Result<()> {
    if input_size == 0 || input_size % 32 != 0 {
        bail!(
            "model input size must be a positive multiple of 32, got {}",
            input_size
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_input_sizes_the_network_cannot_take() {
        for size in [0, 31, 100, 650] {
            let err = TractBackend::new("does-not-exist.onnx", size)
                .err()
                .expect("bad size rejected");
            assert!(err.to_string().contains("multiple of 32"), "{err:#}");
        }
    }

    #[test]
    fn accepts_common_input_sizes() {
        for size in [32, 320, 640, 1280] {
            assert!(check_input_size(size).is_ok());
        }
    }
}
