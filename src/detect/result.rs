use std::fmt;

use crate::frame::Frame;

/// Road damage categories the model is trained on (RDD2022 labelling).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DamageClass {
    /// D00
    LongitudinalCrack,
    /// D10
    TransverseCrack,
    /// D20
    AlligatorCrack,
    /// D40
    Pothole,
}

impl DamageClass {
    pub const ALL: [DamageClass; 4] = [
        DamageClass::LongitudinalCrack,
        DamageClass::TransverseCrack,
        DamageClass::AlligatorCrack,
        DamageClass::Pothole,
    ];

    /// Map a model output class index. Indices outside the closed set yield `None`.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn code(self) -> &'static str {
        match self {
            DamageClass::LongitudinalCrack => "D00",
            DamageClass::TransverseCrack => "D10",
            DamageClass::AlligatorCrack => "D20",
            DamageClass::Pothole => "D40",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DamageClass::LongitudinalCrack => "longitudinal crack",
            DamageClass::TransverseCrack => "transverse crack",
            DamageClass::AlligatorCrack => "alligator crack",
            DamageClass::Pothole => "pothole",
        }
    }
}

impl fmt::Display for DamageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Axis-aligned box in source-frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.w).min(other.x + other.w);
        let bottom = (self.y + self.h).min(other.y + other.h);
        let inter = (right - left).max(0.0) * (bottom - top).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Clip to a `width` x `height` frame.
    pub fn clamp_to(&self, width: f32, height: f32) -> BoundingBox {
        let x0 = self.x.clamp(0.0, width);
        let y0 = self.y.clamp(0.0, height);
        let x1 = (self.x + self.w).clamp(0.0, width);
        let y1 = (self.y + self.h).clamp(0.0, height);
        BoundingBox::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// One labelled, scored prediction for a single frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub class: DamageClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Detections for one frame, tied to the frame they were computed from.
#[derive(Clone, Debug)]
pub struct DetectionResult<'f> {
    frame: &'f Frame,
    detections: Vec<Detection>,
}

impl<'f> DetectionResult<'f> {
    pub(crate) fn new(frame: &'f Frame, detections: Vec<Detection>) -> Self {
        Self { frame, detections }
    }

    pub fn frame(&self) -> &'f Frame {
        self.frame
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}
