#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::nms::non_max_suppression;
use crate::detect::result::RawDetection;
use crate::frame::Frame;
use crate::geometry::BoundingBox;

type Plan = TypedRunnableModel<TypedModel>;

/// YOLOv8 ONNX detector running on CPU through tract.
///
/// The model is loaded once with a fixed square input; frames are resized to
/// it without letterboxing and boxes are scaled back to frame pixels.
pub struct TractBackend {
    model_path: std::path::PathBuf,
    plan: Option<(u32, Plan)>,
}

impl TractBackend {
    /// Check the model file and defer graph optimisation until the input size is known.
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(anyhow!("ONNX model not found at {}", model_path.display()));
        }
        Ok(Self {
            model_path: model_path.to_path_buf(),
            plan: None,
        })
    }

    fn plan_for(&mut self, input_size: u32) -> Result<&Plan> {
        let stale = self.plan.as_ref().map_or(true, |(size, _)| *size != input_size);
        if stale {
            let side = input_size as usize;
            let plan = tract_onnx::onnx()
                .model_for_path(&self.model_path)
                .with_context(|| {
                    format!("failed to load ONNX model from {}", self.model_path.display())
                })?
                .with_input_fact(
                    0,
                    InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
                )
                .context("failed to set input fact")?
                .into_optimized()
                .context("failed to optimize ONNX model")?
                .into_runnable()
                .context("failed to build runnable ONNX model")?;
            log::info!(
                "TractBackend: loaded {} at {}x{}",
                self.model_path.display(),
                input_size,
                input_size
            );
            self.plan = Some((input_size, plan));
        }
        self.plan
            .as_ref()
            .map(|(_, plan)| plan)
            .ok_or_else(|| anyhow!("model plan missing"))
    }

    fn build_input(frame: &Frame, input_size: u32) -> Tensor {
        let resized = image::imageops::resize(frame.image(), input_size, input_size, FilterType::Triangle);
        let side = input_size as usize;
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        })
        .into_tensor()
    }
}

/// Decode a YOLOv8 head of shape `[1, 4 + classes, anchors]`.
///
/// Box centres and sizes are in model input pixels; they are rescaled to
/// `frame_w` x `frame_h` and clamped to the frame.
pub(crate) fn decode_yolov8(
    output: &tract_ndarray::ArrayViewD<'_, f32>,
    input_size: u32,
    frame_w: u32,
    frame_h: u32,
    confidence_threshold: f32,
) -> Result<Vec<RawDetection>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
        return Err(anyhow!("unexpected YOLOv8 output shape {:?}", shape));
    }
    let num_classes = shape[1] - 4;
    let anchors = shape[2];
    let scale_x = frame_w as f32 / input_size as f32;
    let scale_y = frame_h as f32 / input_size as f32;

    let mut detections = Vec::new();
    for i in 0..anchors {
        let (mut best_class, mut best_score) = (0usize, 0.0f32);
        for c in 0..num_classes {
            let score = output[[0, 4 + c, i]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < confidence_threshold {
            continue;
        }
        let cx = output[[0, 0, i]] * scale_x;
        let cy = output[[0, 1, i]] * scale_y;
        let w = output[[0, 2, i]] * scale_x;
        let h = output[[0, 3, i]] * scale_y;
        let bbox = BoundingBox::new(
            (cx - w / 2.0).round() as i32,
            (cy - h / 2.0).round() as i32,
            (cx + w / 2.0).round() as i32,
            (cy + h / 2.0).round() as i32,
        )
        .clamp_to(frame_w, frame_h);
        detections.push(RawDetection::new(best_class as u32, best_score, bbox));
    }
    Ok(detections)
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<RawDetection>> {
        let input = Self::build_input(frame, params.input_size);
        let plan = self.plan_for(params.input_size)?;
        let outputs = plan.run(tvec!(input.into())).context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let raw = decode_yolov8(
            &view,
            params.input_size,
            frame.width(),
            frame.height(),
            params.confidence_threshold,
        )?;
        Ok(non_max_suppression(raw, params.iou_threshold))
    }

    fn warm_up(&mut self, params: &DetectParams) -> Result<()> {
        self.plan_for(params.input_size).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_best_class_and_rescales() -> Result<()> {
        // 2 classes, 2 anchors; anchor 0 is class 1 at 0.9, anchor 1 is below threshold.
        let mut head = tract_ndarray::Array3::<f32>::zeros((1, 6, 2));
        head[[0, 0, 0]] = 160.0;
        head[[0, 1, 0]] = 160.0;
        head[[0, 2, 0]] = 32.0;
        head[[0, 3, 0]] = 32.0;
        head[[0, 5, 0]] = 0.9;
        head[[0, 4, 1]] = 0.2;
        let view = head.into_dyn();
        let dets = decode_yolov8(&view.view(), 320, 640, 480, 0.5)?;
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(288, 216, 352, 264));
        Ok(())
    }

    #[test]
    fn rejects_unexpected_shape() {
        let head = tract_ndarray::Array2::<f32>::zeros((4, 4)).into_dyn();
        assert!(decode_yolov8(&head.view(), 320, 640, 480, 0.5).is_err());
    }

    #[test]
    fn missing_model_is_an_error() {
        assert!(TractBackend::load("/nonexistent/model.onnx").is_err());
    }
}
