//! Synthetic camera (`stub://`).
//!
//! Produces a paced stream of generated frames: a slowly drifting sky
//! gradient with light sensor noise and a small dark object crossing the
//! view. Query options:
//! - `frames=N`: stop delivering after N frames, as if the camera was unplugged
//! - `fail=open`: refuse to open, as if the device node did not exist
//! - `format=nv12`: generate NV12 buffers that go through normalisation

use anyhow::{anyhow, Result};
use rand::Rng;
use std::time::{Duration, Instant};

use super::{normalize_to_rgb, FrameGrabber, PixelFormat};
use crate::frame::Frame;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub frame_limit: Option<u64>,
    pub fail_open: bool,
    pub(crate) format: PixelFormat,
}

impl SyntheticConfig {
    pub fn new(name: &str, width: u32, height: u32, target_fps: u32) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            target_fps,
            frame_limit: None,
            fail_open: false,
            format: PixelFormat::Rgb24,
        }
    }

    /// Parse `stub://name?frames=N&fail=open&format=nv12`.
    pub fn parse(device: &str, width: u32, height: u32, target_fps: u32) -> Result<Self> {
        let rest = device
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic device must start with stub:// (got {})", device))?;
        let (name, query) = match rest.split_once('?') {
            Some((name, query)) => (name, Some(query)),
            None => (rest, None),
        };
        let mut config = Self::new(name, width, height, target_fps);
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if pair.is_empty() {
                continue;
            }
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "frames" => {
                    let limit = value
                        .parse()
                        .map_err(|_| anyhow!("stub frames must be an integer (got '{}')", value))?;
                    config.frame_limit = Some(limit);
                }
                "fail" if value == "open" => config.fail_open = true,
                "format" => {
                    config.format = match value {
                        "rgb" => PixelFormat::Rgb24,
                        "nv12" => PixelFormat::Nv12,
                        other => return Err(anyhow!("unknown stub format '{}'", other)),
                    }
                }
                other => return Err(anyhow!("unknown stub option '{}'", other)),
            }
        }
        if config.format == PixelFormat::Nv12 && (width % 2 != 0 || height % 2 != 0) {
            return Err(anyhow!("nv12 stub frames need even dimensions"));
        }
        Ok(config)
    }
}

pub struct SyntheticGrabber {
    config: SyntheticConfig,
    frame_count: u64,
    next_due: Option<Instant>,
    opened: bool,
}

impl SyntheticGrabber {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            next_due: None,
            opened: false,
        }
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.target_fps.max(1)))
    }

    fn pace(&mut self) {
        let interval = self.frame_interval();
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + interval);
    }

    fn generate_rgb(&self) -> Vec<u8> {
        let w = self.config.width as usize;
        let h = self.config.height as usize;
        let mut rng = rand::thread_rng();
        let drift = (self.frame_count % 64) as usize;
        let mut pixels = vec![0u8; w * h * 3];
        for y in 0..h {
            let sky = 255 - (y * 120 / h.max(1)) as u8;
            for x in 0..w {
                let offset = (y * w + x) * 3;
                let shade = ((x + drift) % 32) as u8;
                let noise: u8 = rng.gen_range(0..4);
                pixels[offset] = sky.saturating_sub(90).saturating_add(shade / 4 + noise);
                pixels[offset + 1] = sky.saturating_sub(40).saturating_add(noise);
                pixels[offset + 2] = sky.saturating_sub(shade / 8);
            }
        }

        // Small dark object drifting across the upper third.
        let side = (w.min(h) / 24).max(1);
        let ox = (self.frame_count as usize * 3) % w.max(1);
        let oy = h / 4;
        for y in oy..(oy + side).min(h) {
            for x in ox..(ox + side).min(w) {
                let offset = (y * w + x) * 3;
                pixels[offset..offset + 3].copy_from_slice(&[30, 30, 35]);
            }
        }
        pixels
    }

    fn generate_nv12(&self) -> Vec<u8> {
        let w = self.config.width as usize;
        let h = self.config.height as usize;
        let y_plane = w * h;
        let mut pixels = vec![128u8; y_plane + y_plane / 2];
        for y in 0..h {
            let luma = 235 - (y * 100 / h.max(1)) as u8;
            pixels[y * w..(y + 1) * w].fill(luma);
        }
        pixels
    }
}

impl FrameGrabber for SyntheticGrabber {
    fn describe(&self) -> String {
        format!("stub://{} (synthetic)", self.config.name)
    }

    fn open(&mut self) -> Result<()> {
        if self.config.fail_open {
            return Err(anyhow!("synthetic device {} refused to open", self.config.name));
        }
        self.opened = true;
        log::info!(
            "SyntheticGrabber: {} ready at {}x{} @ {} fps",
            self.config.name,
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(())
    }

    fn grab(&mut self) -> Result<Frame> {
        if !self.opened {
            return Err(anyhow!("synthetic device {} not open", self.config.name));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Err(anyhow!(
                    "synthetic device {} exhausted after {} frames",
                    self.config.name,
                    limit
                ));
            }
        }
        self.pace();
        self.frame_count += 1;

        let raw = match self.config.format {
            PixelFormat::Rgb24 => self.generate_rgb(),
            PixelFormat::Nv12 => self.generate_nv12(),
        };
        let rgb = normalize_to_rgb(&raw, self.config.width, self.config.height, self.config.format)?;
        Frame::from_rgb(rgb, self.config.width, self.config.height, self.frame_count)
    }

    fn release(&mut self) {
        self.opened = false;
        log::info!(
            "SyntheticGrabber: {} released after {} frames",
            self.config.name,
            self.frame_count
        );
    }
}
