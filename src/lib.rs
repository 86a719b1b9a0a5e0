//! Drone Guard
//!
//! Watches a camera for airborne targets and raises a rate-limited alert
//! when one is seen in open sky rather than on a TV, laptop or phone screen.
//!
//! # Pipeline
//!
//! Three threads share two overwrite-latest slots:
//!
//! 1. `ingest::FrameSource` captures frames into a `LatestSlot<Frame>`.
//! 2. `worker::DetectionWorker` runs the detector on the newest frame and
//!    publishes a `ClassifiedResult` into a second slot.
//! 3. `render::RenderLoop` (the calling thread) combines the newest frame
//!    with the newest result, applies on-screen suppression, asks the
//!    `alert::AlertManager` for alerts and hands the composited frame to a
//!    display sink.
//!
//! Readers never wait on writers; a stale result is expected and reused.
//! A single `StopSignal` ends all three loops.
//!
//! # Module Structure
//!
//! - `config`: immutable settings (file, environment, validation)
//! - `frame`, `slot`, `signal`: shared data and coordination primitives
//! - `ingest`: camera backends and the capture loop
//! - `detect`: detector boundary, backends, NMS, classification
//! - `geometry`: boxes and the on-screen occlusion test
//! - `worker`, `alert`, `render`, `overlay`, `display`: the pipeline stages

pub mod alert;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod overlay;
pub mod render;
pub mod signal;
pub mod slot;
pub mod worker;

pub use alert::{AlertDecision, AlertManager, AlertState, AudioBackend};
pub use config::{ClassTable, GuardConfig, TargetPriority};
pub use detect::{ClassifiedResult, DetectParams, DetectorBackend, RawDetection};
pub use display::{DisplayControl, DisplaySink, FrameStatus, HeadlessDisplay};
pub use frame::Frame;
pub use geometry::{is_occluded, BoundingBox};
pub use ingest::{FrameGrabber, FrameSource};
pub use render::{compose, Composition, FpsMeter, Marker, MarkerKind, RenderLoop, RenderSummary};
pub use signal::StopSignal;
pub use slot::LatestSlot;
pub use worker::{DetectionWorker, WorkerHandle, WorkerStats};
