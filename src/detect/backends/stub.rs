use anyhow::{anyhow, Result};

use crate::detect::backend::{DetectParams, DetectorBackend};
use crate::detect::result::RawDetection;
use crate::frame::Frame;
use crate::geometry::BoundingBox;

const DEMO_DRONE: u32 = 4;
const DEMO_BIRD: u32 = 14;
const DEMO_TV: u32 = 62;

enum Script {
    Empty,
    Fixed(Vec<Vec<RawDetection>>),
    Demo,
}

/// Stub backend: replays scripted detections instead of running a model.
///
/// Fixed scripts cycle pass by pass. The demo script walks through an empty
/// sky, a drone in open sky, a drone shown on a TV, and a bird, with boxes
/// scaled to the frame size.
pub struct StubBackend {
    script: Script,
    pass: u64,
    fail_every: Option<u64>,
}

impl StubBackend {
    /// Backend that never detects anything.
    pub fn new() -> Self {
        Self {
            script: Script::Empty,
            pass: 0,
            fail_every: None,
        }
    }

    pub fn scripted(passes: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script: Script::Fixed(passes),
            ..Self::new()
        }
    }

    pub fn demo() -> Self {
        Self {
            script: Script::Demo,
            ..Self::new()
        }
    }

    /// Make every `n`th pass fail, to exercise inference error handling.
    pub fn with_failure_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    fn demo_pass(pass: u64, frame: &Frame) -> Vec<RawDetection> {
        let w = frame.width() as i32;
        let h = frame.height() as i32;
        let unit = (w.min(h) / 12).max(2);
        let drift = ((pass * 7) % 100) as i32 * (w - 2 * unit).max(1) / 100;
        let sky_box = BoundingBox::new(drift, h / 6, drift + unit, h / 6 + unit);
        match (pass / 10) % 4 {
            0 => Vec::new(),
            1 => vec![RawDetection::new(DEMO_DRONE, 0.82, sky_box)],
            2 => {
                let tv = BoundingBox::new(w / 2, h / 2, w / 2 + 4 * unit, h / 2 + 3 * unit);
                let on_tv = BoundingBox::new(
                    tv.x1 + unit,
                    tv.y1 + unit,
                    tv.x1 + 2 * unit,
                    tv.y1 + 2 * unit,
                );
                vec![
                    RawDetection::new(DEMO_TV, 0.9, tv),
                    RawDetection::new(DEMO_DRONE, 0.77, on_tv),
                ]
            }
            _ => vec![RawDetection::new(DEMO_BIRD, 0.74, sky_box)],
        }
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<RawDetection>> {
        let pass = self.pass;
        self.pass += 1;
        if let Some(n) = self.fail_every {
            if (pass + 1) % n == 0 {
                return Err(anyhow!("stub inference failure on pass {}", pass));
            }
        }

        let detections = match &self.script {
            Script::Empty => Vec::new(),
            Script::Fixed(passes) if passes.is_empty() => Vec::new(),
            Script::Fixed(passes) => passes[(pass % passes.len() as u64) as usize].clone(),
            Script::Demo => Self::demo_pass(pass, frame),
        };

        Ok(detections
            .into_iter()
            .filter(|det| det.confidence >= params.confidence_threshold)
            .collect())
    }
}
