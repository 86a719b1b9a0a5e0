//! Display sinks for composited frames.
//!
//! Sinks:
//! - `headless`: logs a status line periodically, never asks to quit
//! - `window`: desktop window (feature: display-minifb); `q`, Escape or
//!   closing the window quits

#[cfg(feature = "display-minifb")]
mod window;

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::time::{Duration, Instant};

#[cfg(feature = "display-minifb")]
pub use window::WindowDisplay;

/// Per-frame facts shown next to the image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStatus {
    pub sequence: u64,
    pub fps: f64,
    pub targets: usize,
    pub occluders: usize,
    /// Banner text when an alert overlay is drawn on this frame.
    pub alert: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayControl {
    Continue,
    Quit,
}

/// Destination for rendered frames. Runs on the render thread only.
pub trait DisplaySink {
    fn name(&self) -> &'static str;

    fn show(&mut self, canvas: &RgbImage, status: &FrameStatus) -> Result<DisplayControl>;
}

/// Sink for runs without a screen.
pub struct HeadlessDisplay {
    report_every: Duration,
    last_report: Option<Instant>,
    shown: u64,
}

impl HeadlessDisplay {
    pub fn new(report_every: Duration) -> Self {
        Self {
            report_every,
            last_report: None,
            shown: 0,
        }
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }
}

impl Default for HeadlessDisplay {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl DisplaySink for HeadlessDisplay {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn show(&mut self, _canvas: &RgbImage, status: &FrameStatus) -> Result<DisplayControl> {
        self.shown += 1;
        let now = Instant::now();
        let due = self
            .last_report
            .map_or(true, |last| now.duration_since(last) >= self.report_every);
        if due {
            self.last_report = Some(now);
            log::info!(
                "frame {} | {:.1} fps | {} targets | {} screens{}",
                status.sequence,
                status.fps,
                status.targets,
                status.occluders,
                status
                    .alert
                    .as_deref()
                    .map(|text| format!(" | {}", text))
                    .unwrap_or_default()
            );
        }
        Ok(DisplayControl::Continue)
    }
}

/// Pick the sink: headless when asked, otherwise a window if compiled in.
pub fn display_for(headless: bool) -> Result<Box<dyn DisplaySink>> {
    if headless {
        return Ok(Box::new(HeadlessDisplay::default()));
    }
    #[cfg(feature = "display-minifb")]
    {
        Ok(Box::new(WindowDisplay::new("drone-guard")))
    }
    #[cfg(not(feature = "display-minifb"))]
    {
        Err(anyhow!(
            "no window support compiled in (enable display-minifb or pass --headless)"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_never_quits() -> Result<()> {
        let mut display = HeadlessDisplay::new(Duration::from_secs(3600));
        let canvas = RgbImage::new(4, 4);
        for sequence in 0..3 {
            let status = FrameStatus {
                sequence,
                ..FrameStatus::default()
            };
            assert_eq!(display.show(&canvas, &status)?, DisplayControl::Continue);
        }
        assert_eq!(display.frames_shown(), 3);
        Ok(())
    }

    #[test]
    fn headless_is_always_available() -> Result<()> {
        assert_eq!(display_for(true)?.name(), "headless");
        Ok(())
    }
}
