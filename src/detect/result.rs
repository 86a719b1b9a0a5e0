use crate::config::ClassTable;
use crate::geometry::BoundingBox;

/// One detector output before it is assigned a role.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    /// In [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(class_id: u32, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_id,
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }
}

/// Detections of one inference pass, split into targets and screen-like occluders.
///
/// Each pass produces a complete snapshot that replaces the previous one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassifiedResult {
    pub targets: Vec<RawDetection>,
    pub occluders: Vec<BoundingBox>,
    /// Sequence number of the frame this pass ran on.
    pub frame_sequence: u64,
}

impl ClassifiedResult {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.occluders.is_empty()
    }
}

/// Partition raw detections by class id. Unknown classes are dropped, as are
/// targets below their per-class confidence floor. Order is preserved.
pub fn classify(raw: Vec<RawDetection>, classes: &ClassTable, frame_sequence: u64) -> ClassifiedResult {
    let mut result = ClassifiedResult {
        frame_sequence,
        ..ClassifiedResult::default()
    };
    for det in raw {
        if let Some(target) = classes.target(det.class_id) {
            if target
                .min_confidence
                .is_some_and(|floor| det.confidence <= floor)
            {
                continue;
            }
            result.targets.push(det);
        } else if classes.occluder(det.class_id).is_some() {
            result.occluders.push(det.bbox);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: u32, confidence: f32, x: i32) -> RawDetection {
        RawDetection::new(class_id, confidence, BoundingBox::new(x, 0, x + 10, 10))
    }

    #[test]
    fn splits_targets_and_occluders_and_drops_unknown() {
        let classes = ClassTable::default();
        let raw = vec![det(4, 0.9, 0), det(0, 0.99, 10), det(62, 0.8, 20), det(14, 0.6, 30), det(67, 0.7, 40)];
        let result = classify(raw, &classes, 9);
        assert_eq!(result.frame_sequence, 9);
        assert_eq!(
            result.targets.iter().map(|d| d.class_id).collect::<Vec<_>>(),
            vec![4, 14]
        );
        assert_eq!(result.occluders.len(), 2);
        assert_eq!(result.occluders[0].x1, 20);
        assert_eq!(result.occluders[1].x1, 40);
    }

    #[test]
    fn empty_input_gives_empty_result() {
        let result = classify(Vec::new(), &ClassTable::default(), 1);
        assert!(result.is_empty());
    }

    #[test]
    fn per_class_floor_filters_weak_targets() {
        let mut classes = ClassTable::default();
        for target in &mut classes.targets {
            if target.id == 14 {
                target.min_confidence = Some(0.7);
            }
        }
        let result = classify(vec![det(14, 0.65, 0), det(14, 0.71, 5), det(4, 0.51, 9)], &classes, 1);
        assert_eq!(result.targets.len(), 2);
        assert_eq!(result.targets[0].confidence, 0.71);
    }

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(det(4, 1.7, 0).confidence, 1.0);
        assert_eq!(det(4, -0.2, 0).confidence, 0.0);
    }
}
