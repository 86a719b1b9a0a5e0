//! V4L2 camera backend.
//!
//! Opens a local device node (e.g. /dev/video0), negotiates RGB24 at the
//! configured resolution and frame rate, and streams through memory-mapped
//! buffers. Devices that refuse RGB24 but offer NV12 are normalised to RGB.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::{normalize_to_rgb, FrameGrabber, PixelFormat};
use crate::frame::Frame;

/// Configuration for a V4L2 device.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

#[self_referencing]
struct V4l2Stream {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

pub struct V4l2Grabber {
    config: V4l2Config,
    state: Option<V4l2Stream>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    pixel_format: PixelFormat,
}

impl V4l2Grabber {
    pub fn new(config: V4l2Config) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            pixel_format: PixelFormat::Rgb24,
        }
    }
}

impl FrameGrabber for V4l2Grabber {
    fn describe(&self) -> String {
        self.config.device.clone()
    }

    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.config.device)
            .with_context(|| format!("open v4l2 device {}", self.config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Grabber: failed to set RGB24 on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "V4l2Grabber: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr)
            .with_context(|| format!("device {} negotiated an unusable format", self.config.device))?;
        self.active_width = format.width;
        self.active_height = format.height;

        let state = V4l2StreamTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "V4l2Grabber: opened {} ({}x{}, {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.pixel_format
        );
        Ok(())
    }

    fn grab(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self
            .state
            .as_mut()
            .ok_or_else(|| anyhow!("v4l2 device {} not open", self.config.device))?;
        let rgb = state.with_stream_mut(|stream| -> Result<Vec<u8>> {
            let (buf, meta) = stream.next().context("capture v4l2 frame")?;
            let used = (meta.bytesused as usize).min(buf.len());
            let used = if used == 0 { buf.len() } else { used };
            normalize_to_rgb(
                &buf[..used],
                self.active_width,
                self.active_height,
                self.pixel_format,
            )
        })?;

        self.frame_count += 1;
        Frame::from_rgb(rgb, self.active_width, self.active_height, self.frame_count)
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "V4l2Grabber: closed {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
    }
}
