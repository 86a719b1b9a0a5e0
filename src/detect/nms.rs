use std::cmp::Ordering;

use crate::detect::result::RawDetection;

/// Class-aware non-maximum suppression.
///
/// Keeps the most confident box of every same-class cluster whose IoU with a
/// kept box is at or above `iou_threshold`. Output is ordered by descending
/// confidence.
pub fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = keep.iter().any(|kept| {
            kept.class_id == det.class_id && kept.bbox.iou(&det.bbox) >= f64::from(iou_threshold)
        });
        if !suppressed {
            keep.push(det);
        }
    }
    keep
}
