//! Render loop: frame + latest detections + alert decisions -> display.
//!
//! Composition is split from painting. [`compose`] decides which markers a
//! frame gets and asks the [`AlertManager`] for alerts; [`crate::overlay`]
//! then paints the markers on a copy of the frame. Detection results are
//! reused across as many displayed frames as it takes the worker to produce
//! the next one.

use anyhow::Result;
use std::time::{Duration, Instant};

use crate::alert::AlertManager;
use crate::config::{ClassTable, TargetPriority};
use crate::detect::ClassifiedResult;
use crate::display::{DisplayControl, DisplaySink, FrameStatus};
use crate::frame::Frame;
use crate::geometry::{is_occluded, BoundingBox};
use crate::ingest::FrameSource;
use crate::overlay;
use crate::signal::StopSignal;
use crate::slot::LatestSlot;

/// Upper bound on how long the loop waits for a frame before re-checking stop.
const FRAME_WAIT: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    /// A screen-like occluder.
    Screen,
    /// A target suppressed because it is shown on a screen.
    OnScreen,
    /// A low-priority target.
    Observed,
    /// A high-priority target that triggered an alert.
    Alert,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub kind: MarkerKind,
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: Option<f32>,
}

/// Everything drawn on one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Composition {
    pub markers: Vec<Marker>,
    /// Alert overlay requested for this frame.
    pub banner: bool,
    /// Audio alerts granted while composing this frame.
    pub audio_granted: usize,
}

impl Composition {
    pub fn count(&self, kind: MarkerKind) -> usize {
        self.markers.iter().filter(|m| m.kind == kind).count()
    }
}

/// Decide markers and alerts for one frame. `None` means no detections yet.
pub fn compose(
    result: Option<&ClassifiedResult>,
    classes: &ClassTable,
    alerts: &mut AlertManager,
    now: Instant,
) -> Composition {
    let mut composition = Composition::default();
    let Some(result) = result else {
        return composition;
    };

    for occluder in &result.occluders {
        composition.markers.push(Marker {
            kind: MarkerKind::Screen,
            bbox: *occluder,
            label: "SCREEN".to_string(),
            confidence: None,
        });
    }

    for target in &result.targets {
        let label = classes.target_label(target.class_id).to_string();
        let kind = if is_occluded(&target.bbox, &result.occluders) {
            MarkerKind::OnScreen
        } else {
            match classes.target(target.class_id).map(|t| t.priority) {
                Some(TargetPriority::Alert) => {
                    let decision = alerts.trigger(now, &label, target.confidence);
                    composition.banner |= decision.visual;
                    composition.audio_granted += usize::from(decision.audio);
                    MarkerKind::Alert
                }
                _ => MarkerKind::Observed,
            }
        };
        composition.markers.push(Marker {
            kind,
            bbox: target.bbox,
            label,
            confidence: Some(target.confidence),
        });
    }
    composition
}

/// Instantaneous frame rate from consecutive ticks.
#[derive(Clone, Debug, Default)]
pub struct FpsMeter {
    last: Option<Instant>,
}

impl FpsMeter {
    /// Record a tick and return the rate since the previous one.
    /// Returns 0 on the first tick or when no time has passed.
    pub fn tick(&mut self, now: Instant) -> f64 {
        let fps = match self.last.and_then(|last| now.checked_duration_since(last)) {
            Some(delta) if delta > Duration::ZERO => 1.0 / delta.as_secs_f64(),
            _ => 0.0,
        };
        self.last = Some(now);
        fps
    }
}

/// Why the loop stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitReason {
    /// Stop signal raised (Ctrl-C, or raised by another component).
    Signal,
    /// The display asked to quit.
    Quit,
    /// The frame budget given to the loop was used up.
    FrameLimit,
    /// The camera stopped delivering frames.
    SourceLost,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderSummary {
    pub frames_rendered: u64,
    pub alert_frames: u64,
    pub audio_alerts: u64,
    pub exit: ExitReason,
}

pub struct RenderLoop {
    classes: ClassTable,
    alerts: AlertManager,
    banner_text: String,
    display: Box<dyn DisplaySink>,
    stop: StopSignal,
    max_frames: Option<u64>,
    fps: FpsMeter,
}

impl RenderLoop {
    pub fn new(
        classes: ClassTable,
        alerts: AlertManager,
        banner_text: impl Into<String>,
        display: Box<dyn DisplaySink>,
        stop: StopSignal,
    ) -> Self {
        Self {
            classes,
            alerts,
            banner_text: banner_text.into(),
            display,
            stop,
            max_frames: None,
            fps: FpsMeter::default(),
        }
    }

    /// Stop after rendering `frames` frames.
    pub fn with_max_frames(mut self, frames: Option<u64>) -> Self {
        self.max_frames = frames;
        self
    }

    /// Drive the display until a quit condition, then stop `source`.
    pub fn run(
        &mut self,
        source: &mut FrameSource,
        results: &LatestSlot<ClassifiedResult>,
    ) -> Result<RenderSummary> {
        let outcome = self.drive(source, results);
        source.stop();
        let summary = outcome?;
        log::info!(
            "RenderLoop: {:?} after {} frames ({} with alerts, {} audio)",
            summary.exit,
            summary.frames_rendered,
            summary.alert_frames,
            summary.audio_alerts
        );
        Ok(summary)
    }

    fn drive(
        &mut self,
        source: &FrameSource,
        results: &LatestSlot<ClassifiedResult>,
    ) -> Result<RenderSummary> {
        let frames = source.slot();
        let mut summary = RenderSummary {
            frames_rendered: 0,
            alert_frames: 0,
            audio_alerts: 0,
            exit: ExitReason::Signal,
        };
        let mut seen = 0u64;

        loop {
            if self.stop.is_raised() {
                summary.exit = ExitReason::Signal;
                break;
            }
            if self.max_frames.is_some_and(|max| summary.frames_rendered >= max) {
                self.stop.raise();
                summary.exit = ExitReason::FrameLimit;
                break;
            }

            let Some((version, frame)) = frames.wait_newer(seen, FRAME_WAIT) else {
                if source.is_stopped() && frames.latest().is_none() {
                    log::warn!("RenderLoop: camera stopped delivering frames");
                    summary.exit = ExitReason::SourceLost;
                    break;
                }
                seen = seen.max(frames.version());
                continue;
            };
            seen = version;

            let control = self.render_frame(&frame, results, &mut summary)?;
            if control == DisplayControl::Quit {
                self.stop.raise();
                summary.exit = ExitReason::Quit;
                break;
            }
        }
        Ok(summary)
    }

    fn render_frame(
        &mut self,
        frame: &Frame,
        results: &LatestSlot<ClassifiedResult>,
        summary: &mut RenderSummary,
    ) -> Result<DisplayControl> {
        let now = Instant::now();
        let result = results.latest();
        let composition = compose(result.as_deref(), &self.classes, &mut self.alerts, now);

        let fps = self.fps.tick(now);
        let mut canvas = frame.to_canvas();
        overlay::paint(
            &mut canvas,
            &composition.markers,
            composition.banner.then_some(self.banner_text.as_str()),
            Some(fps),
        );

        let status = FrameStatus {
            sequence: frame.sequence(),
            fps,
            targets: result.as_ref().map_or(0, |r| r.targets.len()),
            occluders: result.as_ref().map_or(0, |r| r.occluders.len()),
            alert: composition.banner.then(|| self.banner_text.clone()),
        };
        let control = self.display.show(&canvas, &status)?;

        summary.frames_rendered += 1;
        summary.alert_frames += u64::from(composition.banner);
        summary.audio_alerts += composition.audio_granted as u64;
        Ok(control)
    }
}
