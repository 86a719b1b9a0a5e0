//! Frame acquisition.
//!
//! A [`FrameSource`] owns one acquisition backend (a [`FrameGrabber`]) and
//! runs it on a dedicated capture thread, publishing every frame into a
//! [`LatestSlot`]. Readers never wait on the camera: they get the newest
//! frame or nothing.
//!
//! Backends:
//! - Synthetic (`stub://name[?frames=N][&fail=open]`) for tests and demos
//! - USB/V4L2 devices (feature: ingest-v4l2), addressed by index or node path
//!
//! A capture failure is terminal for the source: the device is released,
//! the slot is cleared and the source reports itself stopped. There is no
//! reconnect loop.

mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::config::CameraSettings;
use crate::frame::Frame;
use crate::signal::StopSignal;
use crate::slot::LatestSlot;

pub(crate) use normalize::{normalize_to_rgb, PixelFormat};
pub use synthetic::{SyntheticConfig, SyntheticGrabber};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::{V4l2Config, V4l2Grabber};

/// Acquisition backend for one camera device.
pub trait FrameGrabber: Send {
    /// Human-readable device description for logs.
    fn describe(&self) -> String;

    /// Open the device. Called once, before the capture thread starts.
    fn open(&mut self) -> Result<()>;

    /// Block until the next frame is available.
    fn grab(&mut self) -> Result<Frame>;

    /// Release the device. Called exactly once by [`FrameSource`].
    fn release(&mut self);
}

/// Build the grabber selected by `settings.device`.
pub fn grabber_for(settings: &CameraSettings) -> Result<Box<dyn FrameGrabber>> {
    let device = settings.device.trim();
    if device.starts_with("stub://") {
        let config = SyntheticConfig::parse(device, settings.width, settings.height, settings.target_fps)?;
        return Ok(Box::new(SyntheticGrabber::new(config)));
    }

    let node = device_node(device);
    #[cfg(feature = "ingest-v4l2")]
    {
        Ok(Box::new(V4l2Grabber::new(V4l2Config {
            device: node,
            target_fps: settings.target_fps,
            width: settings.width,
            height: settings.height,
        })))
    }
    #[cfg(not(feature = "ingest-v4l2"))]
    {
        Err(anyhow!(
            "camera {} requires the ingest-v4l2 feature (use stub:// for a synthetic camera)",
            node
        ))
    }
}

/// Map a bare device index to its V4L2 node path.
pub fn device_node(device: &str) -> String {
    if !device.is_empty() && device.chars().all(|c| c.is_ascii_digit()) {
        format!("/dev/video{}", device)
    } else {
        device.to_string()
    }
}

/// Counters shared with the capture thread.
#[derive(Default)]
struct CaptureState {
    frames_captured: AtomicU64,
    finished: AtomicBool,
    released: AtomicBool,
}

/// Snapshot of capture statistics.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub device: String,
    pub frames_captured: u64,
    pub stopped: bool,
}

/// Camera acquisition loop with a latest-frame slot.
///
/// Lifecycle: [`FrameSource::open`] (device opened, failure is fatal to the
/// caller), [`FrameSource::start`] (capture thread begins),
/// [`FrameSource::stop`] (idempotent; releases the device exactly once).
pub struct FrameSource {
    device: String,
    slot: Arc<LatestSlot<Frame>>,
    stop: StopSignal,
    state: Arc<CaptureState>,
    grabber: Option<Box<dyn FrameGrabber>>,
    handle: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// Open the configured camera.
    pub fn from_settings(settings: &CameraSettings, stop: StopSignal) -> Result<Self> {
        let grabber = grabber_for(settings)?;
        Self::open(grabber, stop)
    }

    /// Open a specific grabber. `stop` is the shared shutdown flag.
    pub fn open(mut grabber: Box<dyn FrameGrabber>, stop: StopSignal) -> Result<Self> {
        let device = grabber.describe();
        grabber
            .open()
            .with_context(|| format!("could not open camera {}", device))?;
        log::info!("FrameSource: opened {}", device);
        Ok(Self {
            device,
            slot: Arc::new(LatestSlot::new()),
            stop,
            state: Arc::new(CaptureState::default()),
            grabber: Some(grabber),
            handle: None,
        })
    }

    /// Spawn the capture thread. Calling it again, or after `stop`, is a no-op.
    pub fn start(&mut self) -> Result<()> {
        let Some(grabber) = self.grabber.take() else {
            log::debug!("FrameSource: start ignored for {} (already started or stopped)", self.device);
            return Ok(());
        };
        let slot = self.slot.clone();
        let stop = self.stop.clone();
        let state = self.state.clone();
        let handle = std::thread::Builder::new()
            .name("frame-source".to_string())
            .spawn(move || run_capture(grabber, slot, stop, state))
            .context("spawn capture thread")?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Newest frame, or `None` before the first capture or after device loss.
    pub fn read(&self) -> Option<Arc<Frame>> {
        self.slot.latest()
    }

    /// Shared slot for consumers that want versioned or blocking reads.
    pub fn slot(&self) -> Arc<LatestSlot<Frame>> {
        self.slot.clone()
    }

    /// True once the device has failed or `stop` was called.
    pub fn is_stopped(&self) -> bool {
        self.state.finished.load(Ordering::SeqCst) || self.stop.is_raised()
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            device: self.device.clone(),
            frames_captured: self.state.frames_captured.load(Ordering::SeqCst),
            stopped: self.is_stopped(),
        }
    }

    /// Signal termination and wait for the capture thread to release the device.
    ///
    /// Safe to call repeatedly and before `start`.
    pub fn stop(&mut self) {
        self.stop.raise();
        if let Some(mut grabber) = self.grabber.take() {
            release_once(grabber.as_mut(), &self.state);
            self.state.finished.store(true, Ordering::SeqCst);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("FrameSource: capture thread for {} panicked", self.device);
            }
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn release_once(grabber: &mut dyn FrameGrabber, state: &CaptureState) {
    if !state.released.swap(true, Ordering::SeqCst) {
        grabber.release();
    }
}

fn run_capture(
    mut grabber: Box<dyn FrameGrabber>,
    slot: Arc<LatestSlot<Frame>>,
    stop: StopSignal,
    state: Arc<CaptureState>,
) {
    let device = grabber.describe();
    log::info!("FrameSource: capturing from {}", device);
    while !stop.is_raised() {
        match grabber.grab() {
            Ok(frame) => {
                state.frames_captured.fetch_add(1, Ordering::SeqCst);
                slot.publish(frame);
            }
            Err(err) => {
                log::warn!("FrameSource: {} stopped delivering frames: {:#}", device, err);
                slot.clear();
                break;
            }
        }
    }
    release_once(grabber.as_mut(), &state);
    state.finished.store(true, Ordering::SeqCst);
    slot.notify_waiters();
    log::info!(
        "FrameSource: released {} after {} frames",
        device,
        state.frames_captured.load(Ordering::SeqCst)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    struct CountingGrabber {
        releases: Arc<AtomicUsize>,
        remaining: u32,
        fail_open: bool,
    }

    impl FrameGrabber for CountingGrabber {
        fn describe(&self) -> String {
            "counting".to_string()
        }

        fn open(&mut self) -> Result<()> {
            if self.fail_open {
                return Err(anyhow!("no such device"));
            }
            Ok(())
        }

        fn grab(&mut self) -> Result<Frame> {
            if self.remaining == 0 {
                return Err(anyhow!("device unplugged"));
            }
            self.remaining -= 1;
            std::thread::sleep(Duration::from_millis(1));
            Frame::from_rgb(vec![0u8; 2 * 2 * 3], 2, 2, u64::from(self.remaining))
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting(remaining: u32) -> (Box<dyn FrameGrabber>, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let grabber = CountingGrabber {
            releases: releases.clone(),
            remaining,
            fail_open: false,
        };
        (Box::new(grabber), releases)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn read_before_start_is_absent() -> Result<()> {
        let (grabber, _) = counting(10);
        let source = FrameSource::open(grabber, StopSignal::new())?;
        assert!(source.read().is_none());
        Ok(())
    }

    #[test]
    fn open_failure_is_reported() {
        let grabber = Box::new(CountingGrabber {
            releases: Arc::new(AtomicUsize::new(0)),
            remaining: 0,
            fail_open: true,
        });
        let err = FrameSource::open(grabber, StopSignal::new()).err().unwrap();
        assert!(format!("{:#}", err).contains("could not open camera"));
    }

    #[test]
    fn stop_twice_releases_device_once() -> Result<()> {
        let (grabber, releases) = counting(u32::MAX);
        let mut source = FrameSource::open(grabber, StopSignal::new())?;
        source.start()?;
        wait_until(|| source.read().is_some());
        source.stop();
        source.stop();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(source.is_stopped());
        Ok(())
    }

    #[test]
    fn stop_before_start_releases_once() -> Result<()> {
        let (grabber, releases) = counting(5);
        let mut source = FrameSource::open(grabber, StopSignal::new())?;
        source.stop();
        source.start()?;
        source.stop();
        drop(source);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn device_loss_surfaces_as_no_frames() -> Result<()> {
        let (grabber, releases) = counting(3);
        let mut source = FrameSource::open(grabber, StopSignal::new())?;
        source.start()?;
        wait_until(|| source.is_stopped());
        assert!(source.is_stopped());
        assert!(source.read().is_none());
        assert_eq!(source.stats().frames_captured, 3);
        source.stop();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn device_index_maps_to_node() {
        assert_eq!(device_node("0"), "/dev/video0");
        assert_eq!(device_node("/dev/video3"), "/dev/video3");
    }
}
