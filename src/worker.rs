//! Inference loop.
//!
//! The worker waits for a frame newer than the last one it processed, runs
//! the detector on it, classifies the raw detections and publishes a complete
//! [`ClassifiedResult`]. A failed pass is logged and skipped; the previous
//! result stays in the slot. The render loop reads results at its own pace.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::config::ClassTable;
use crate::detect::{classify, ClassifiedResult, DetectParams, DetectorBackend};
use crate::frame::Frame;
use crate::signal::StopSignal;
use crate::slot::LatestSlot;

/// Upper bound on how long the worker sleeps before re-checking the stop flag.
const FRAME_WAIT: Duration = Duration::from_millis(50);

#[derive(Default)]
struct WorkerCounters {
    passes: AtomicU64,
    failures: AtomicU64,
    last_latency_us: AtomicU64,
}

/// Snapshot of worker statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub passes: u64,
    pub failures: u64,
    pub last_latency: Duration,
}

pub struct DetectionWorker {
    backend: Box<dyn DetectorBackend>,
    params: DetectParams,
    classes: ClassTable,
    frames: Arc<LatestSlot<Frame>>,
    results: Arc<LatestSlot<ClassifiedResult>>,
    stop: StopSignal,
    counters: Arc<WorkerCounters>,
}

impl DetectionWorker {
    pub fn new(
        backend: Box<dyn DetectorBackend>,
        params: DetectParams,
        classes: ClassTable,
        frames: Arc<LatestSlot<Frame>>,
        stop: StopSignal,
    ) -> Self {
        Self {
            backend,
            params,
            classes,
            frames,
            results: Arc::new(LatestSlot::new()),
            stop,
            counters: Arc::new(WorkerCounters::default()),
        }
    }

    /// Slot the worker publishes into. Empty until the first successful pass.
    pub fn results(&self) -> Arc<LatestSlot<ClassifiedResult>> {
        self.results.clone()
    }

    /// Run one detection pass on `frame` and publish the outcome.
    ///
    /// Returns `false` when the detector failed and nothing was published.
    pub fn process(&mut self, frame: &Frame) -> bool {
        let started = Instant::now();
        let outcome = self.backend.detect(frame, &self.params);
        let latency = started.elapsed();
        self.counters
            .last_latency_us
            .store(latency.as_micros().min(u64::MAX as u128) as u64, Ordering::Relaxed);
        self.counters.passes.fetch_add(1, Ordering::Relaxed);

        match outcome {
            Ok(raw) => {
                let result = classify(raw, &self.classes, frame.sequence());
                log::debug!(
                    "DetectionWorker: frame {} -> {} targets, {} occluders in {:?}",
                    frame.sequence(),
                    result.targets.len(),
                    result.occluders.len(),
                    latency
                );
                self.results.publish(result);
                true
            }
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "DetectionWorker: {} failed on frame {}: {:#}",
                    self.backend.name(),
                    frame.sequence(),
                    err
                );
                false
            }
        }
    }

    /// Loop until the stop signal is raised.
    pub fn run(mut self) {
        if let Err(err) = self.backend.warm_up(&self.params) {
            log::warn!("DetectionWorker: {} warm-up failed: {:#}", self.backend.name(), err);
        }
        log::info!(
            "DetectionWorker: {} running at {}px (conf {:.2}, iou {:.2})",
            self.backend.name(),
            self.params.input_size,
            self.params.confidence_threshold,
            self.params.iou_threshold
        );
        let mut seen = 0u64;
        while !self.stop.is_raised() {
            let Some((version, frame)) = self.frames.wait_newer(seen, FRAME_WAIT) else {
                // Timed out or the source was cleared; either way re-check stop.
                seen = seen.max(self.frames.version());
                continue;
            };
            seen = version;
            self.process(&frame);
        }
        log::info!(
            "DetectionWorker: stopped after {} passes ({} failed)",
            self.counters.passes.load(Ordering::Relaxed),
            self.counters.failures.load(Ordering::Relaxed)
        );
    }

    /// Move the worker onto its own thread.
    pub fn spawn(self) -> Result<WorkerHandle> {
        let results = self.results.clone();
        let counters = self.counters.clone();
        let handle = std::thread::Builder::new()
            .name("detection-worker".to_string())
            .spawn(move || self.run())
            .context("spawn detection worker thread")?;
        Ok(WorkerHandle {
            results,
            counters,
            handle: Some(handle),
        })
    }
}

pub struct WorkerHandle {
    results: Arc<LatestSlot<ClassifiedResult>>,
    counters: Arc<WorkerCounters>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn results(&self) -> Arc<LatestSlot<ClassifiedResult>> {
        self.results.clone()
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            passes: self.counters.passes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            last_latency: Duration::from_micros(self.counters.last_latency_us.load(Ordering::Relaxed)),
        }
    }

    /// Wait for the worker to exit. The stop signal must already be raised.
    pub fn join(mut self) -> WorkerStats {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("DetectionWorker: thread panicked");
            }
        }
        self.stats()
    }
}
