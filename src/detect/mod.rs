//! Detection: the detector boundary, result classification and backends.
//!
//! Backends:
//! - `stub`: scripted detections, no model required
//! - `tract`: YOLOv8 ONNX model on CPU (feature: backend-tract)

mod backend;
mod backends;
mod nms;
mod result;

use anyhow::{anyhow, Result};

pub use backend::{DetectParams, DetectorBackend};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use nms::non_max_suppression;
pub use result::{classify, ClassifiedResult, RawDetection};

use crate::config::DetectorSettings;

/// Build the backend named in the detector settings.
pub fn backend_for(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    match settings.backend.trim().to_ascii_lowercase().as_str() {
        "stub" => Ok(Box::new(StubBackend::demo())),
        "tract" => {
            #[cfg(feature = "backend-tract")]
            {
                Ok(Box::new(TractBackend::load(&settings.model_path)?))
            }
            #[cfg(not(feature = "backend-tract"))]
            {
                Err(anyhow!("detector backend 'tract' requires the backend-tract feature"))
            }
        }
        other => Err(anyhow!("unknown detector backend '{}' (stub|tract)", other)),
    }
}
