use crate::detect::result::Detection;

/// Class-agnostic non-maximum suppression.
///
/// Sorts by descending confidence and keeps a detection only when its IoU with
/// every already-kept detection is at most `iou_threshold`.
pub fn non_max_suppression(detections: &mut Vec<Detection>, iou_threshold: f32) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..detections.len() {
        let suppressed = (0..kept)
            .any(|prev| detections[prev].bbox.iou(&detections[index].bbox) > iou_threshold);
        if !suppressed {
            detections.swap(kept, index);
            kept += 1;
        }
    }
    detections.truncate(kept);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, DamageClass};

    fn det(confidence: f32, x: f32) -> Detection {
        Detection {
            class: DamageClass::Pothole,
            confidence,
            bbox: BoundingBox::new(x, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn overlapping_boxes_collapse_to_the_strongest() {
        let mut dets = vec![det(0.4, 1.0), det(0.9, 0.0), det(0.6, 50.0)];
        non_max_suppression(&mut dets, 0.45);
        let scores: Vec<f32> = dets.iter().map(|d| d.confidence).collect();
        assert_eq!(scores, vec![0.9, 0.6]);
    }

    #[test]
    fn disjoint_boxes_all_survive_in_score_order() {
        let mut dets = vec![det(0.2, 0.0), det(0.7, 20.0), det(0.5, 40.0)];
        non_max_suppression(&mut dets, 0.45);
        let scores: Vec<f32> = dets.iter().map(|d| d.confidence).collect();
        assert_eq!(scores, vec![0.7, 0.5, 0.2]);
    }
}
