use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Fixed inference parameters handed to every detector call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectParams {
    /// Square input edge the model runs at (e.g. 320).
    pub input_size: u32,
    pub confidence_threshold: f32,
    /// IoU above which same-class boxes are merged by NMS.
    pub iou_threshold: f32,
}

impl DetectParams {
    pub fn from_settings(settings: &crate::config::DetectorSettings) -> Self {
        Self {
            input_size: settings.inference_size,
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
        }
    }
}

impl Default for DetectParams {
    fn default() -> Self {
        Self {
            input_size: 320,
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
        }
    }
}

/// Object detector consumed as a black box.
///
/// Calls are synchronous and may be slow; the detection worker is the only
/// caller and never invokes a backend concurrently.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Detect objects in `frame`, returning boxes in frame pixel coordinates.
    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self, _params: &DetectParams) -> Result<()> {
        Ok(())
    }
}
