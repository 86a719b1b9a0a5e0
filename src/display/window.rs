#![cfg(feature = "display-minifb")]

use anyhow::{anyhow, Result};
use image::RgbImage;
use minifb::{Key, Window, WindowOptions};

use super::{DisplayControl, DisplaySink, FrameStatus};

/// Desktop window. Created on the first frame so it matches the camera size.
pub struct WindowDisplay {
    title: String,
    window: Option<Window>,
    size: (usize, usize),
    buffer: Vec<u32>,
}

impl WindowDisplay {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            window: None,
            size: (0, 0),
            buffer: Vec::new(),
        }
    }

    fn window_for(&mut self, width: usize, height: usize) -> Result<&mut Window> {
        if self.window.is_none() || self.size != (width, height) {
            let window = Window::new(&self.title, width, height, WindowOptions::default())
                .map_err(|err| anyhow!("open display window: {}", err))?;
            self.window = Some(window);
            self.size = (width, height);
        }
        self.window
            .as_mut()
            .ok_or_else(|| anyhow!("display window missing"))
    }
}

fn pack_rgb(canvas: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        canvas
            .pixels()
            .map(|px| (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2])),
    );
}

impl DisplaySink for WindowDisplay {
    fn name(&self) -> &'static str {
        "window"
    }

    fn show(&mut self, canvas: &RgbImage, status: &FrameStatus) -> Result<DisplayControl> {
        let (width, height) = (canvas.width() as usize, canvas.height() as usize);
        let mut buffer = std::mem::take(&mut self.buffer);
        pack_rgb(canvas, &mut buffer);

        let title = match &status.alert {
            Some(text) => format!("{} | FPS: {:.0} | {}", self.title, status.fps, text),
            None => format!("{} | FPS: {:.0}", self.title, status.fps),
        };
        let window = self.window_for(width, height)?;
        window.set_title(&title);
        window
            .update_with_buffer(&buffer, width, height)
            .map_err(|err| anyhow!("update display window: {}", err))?;
        let quit = !window.is_open() || window.is_key_down(Key::Q) || window.is_key_down(Key::Escape);
        self.buffer = buffer;

        Ok(if quit {
            DisplayControl::Quit
        } else {
            DisplayControl::Continue
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_pixels_as_0rgb() {
        let mut canvas = RgbImage::new(2, 1);
        canvas.put_pixel(0, 0, image::Rgb([0x12, 0x34, 0x56]));
        let mut buffer = Vec::new();
        pack_rgb(&canvas, &mut buffer);
        assert_eq!(buffer, vec![0x0012_3456, 0]);
    }
}
