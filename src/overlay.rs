//! Paints render markers onto a frame copy.

use ab_glyph::FontRef;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::sync::OnceLock;

use crate::geometry::BoundingBox;
use crate::render::{Marker, MarkerKind};

pub const BANNER_HEIGHT: u32 = 50;
const STROKE: i32 = 2;
const LABEL_SCALE: f32 = 14.0;
const BANNER_SCALE: f32 = 28.0;
const FPS_SCALE: f32 = 22.0;

const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

fn font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(FONT_BYTES) {
        Ok(font) => Some(font),
        Err(err) => {
            log::warn!("overlay: bundled font unusable, drawing boxes only: {}", err);
            None
        }
    })
    .as_ref()
}

pub fn marker_colour(kind: MarkerKind) -> Rgb<u8> {
    match kind {
        MarkerKind::Screen | MarkerKind::OnScreen => BLUE,
        MarkerKind::Observed => GREEN,
        MarkerKind::Alert => RED,
    }
}

/// Text drawn above a marker box, e.g. `DRONE 0.82` or `Safe 0.77`.
pub fn caption(marker: &Marker) -> String {
    match (marker.kind, marker.confidence) {
        (MarkerKind::OnScreen, Some(conf)) => format!("Safe {:.2}", conf),
        (_, Some(conf)) => format!("{} {:.2}", marker.label, conf),
        (_, None) => marker.label.clone(),
    }
}

/// Draw every marker box with its caption, then the alert banner across the
/// top edge and the frame rate in the bottom-left corner.
pub fn paint(canvas: &mut RgbImage, markers: &[Marker], banner: Option<&str>, fps: Option<f64>) {
    for marker in markers {
        let colour = marker_colour(marker.kind);
        draw_box(canvas, &marker.bbox, colour);
        let text = caption(marker);
        let y = (marker.bbox.y1 - LABEL_SCALE as i32 - 2).max(0);
        draw_label(canvas, marker.bbox.x1.max(0), y, LABEL_SCALE, colour, &text);
    }
    if let Some(text) = banner {
        draw_banner(canvas, text);
    }
    if let Some(fps) = fps {
        let y = canvas.height() as i32 - FPS_SCALE as i32 - 4;
        draw_label(canvas, 10, y.max(0), FPS_SCALE, GREEN, &format!("FPS: {:.0}", fps));
    }
}

fn draw_label(canvas: &mut RgbImage, x: i32, y: i32, scale: f32, colour: Rgb<u8>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(font) = font() {
        draw_text_mut(canvas, colour, x, y, scale, font, text);
    }
}

fn draw_box(canvas: &mut RgbImage, bbox: &BoundingBox, colour: Rgb<u8>) {
    let bbox = bbox.clamp_to(canvas.width(), canvas.height());
    // Nested outlines give a stroke width; each inset must stay non-empty.
    for inset in 0..STROKE {
        let width = bbox.width() - 2 * i64::from(inset);
        let height = bbox.height() - 2 * i64::from(inset);
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x1 + inset, bbox.y1 + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(canvas, rect, colour);
    }
}

fn draw_banner(canvas: &mut RgbImage, text: &str) {
    let height = BANNER_HEIGHT.min(canvas.height());
    if canvas.width() == 0 || height == 0 {
        return;
    }
    draw_filled_rect_mut(canvas, Rect::at(0, 0).of_size(canvas.width(), height), RED);
    let y = ((height as f32 - BANNER_SCALE) / 2.0).max(0.0) as i32;
    draw_label(canvas, 50, y, BANNER_SCALE, WHITE, text);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(kind: MarkerKind, bbox: BoundingBox) -> Marker {
        Marker {
            kind,
            bbox,
            label: String::new(),
            confidence: None,
        }
    }

    fn any_pixel(canvas: &RgbImage, x: std::ops::Range<u32>, y: std::ops::Range<u32>, pred: impl Fn(&Rgb<u8>) -> bool) -> bool {
        y.clone()
            .any(|py| x.clone().any(|px| pred(canvas.get_pixel(px, py))))
    }

    #[test]
    fn bundled_font_loads() {
        assert!(font().is_some());
    }

    #[test]
    fn captions_follow_marker_kind() {
        let bbox = BoundingBox::new(0, 0, 10, 10);
        let mut m = marker(MarkerKind::Screen, bbox);
        m.label = "SCREEN".to_string();
        assert_eq!(caption(&m), "SCREEN");

        m.kind = MarkerKind::OnScreen;
        m.label = "DRONE".to_string();
        m.confidence = Some(0.774);
        assert_eq!(caption(&m), "Safe 0.77");

        m.kind = MarkerKind::Alert;
        assert_eq!(caption(&m), "DRONE 0.77");
    }

    #[test]
    fn boxes_use_kind_colour() {
        let mut canvas = RgbImage::new(100, 100);
        paint(
            &mut canvas,
            &[
                marker(MarkerKind::Screen, BoundingBox::new(10, 10, 40, 40)),
                marker(MarkerKind::Alert, BoundingBox::new(50, 60, 90, 90)),
            ],
            None,
            None,
        );
        assert_eq!(*canvas.get_pixel(10, 10), BLUE);
        assert_eq!(*canvas.get_pixel(50, 60), RED);
        assert_eq!(*canvas.get_pixel(25, 25), Rgb([0, 0, 0]));
    }

    #[test]
    fn caption_is_drawn_above_box() {
        let mut canvas = RgbImage::new(200, 120);
        let mut bird = marker(MarkerKind::Observed, BoundingBox::new(20, 60, 80, 100));
        bird.label = "BIRD".to_string();
        bird.confidence = Some(0.9);
        paint(&mut canvas, &[bird], None, None);
        assert!(any_pixel(&canvas, 20..120, 40..58, |px| px[1] > 128 && px[0] == 0));
    }

    #[test]
    fn banner_covers_top_strip_with_text() {
        let mut canvas = RgbImage::new(400, 120);
        paint(&mut canvas, &[], Some("WARNING: DRONE"), None);
        assert_eq!(*canvas.get_pixel(399, BANNER_HEIGHT - 1), RED);
        assert_eq!(*canvas.get_pixel(0, BANNER_HEIGHT), Rgb([0, 0, 0]));
        assert!(any_pixel(&canvas, 50..400, 0..BANNER_HEIGHT, |px| px[1] > 200));
    }

    #[test]
    fn fps_is_drawn_bottom_left() {
        let mut canvas = RgbImage::new(160, 120);
        paint(&mut canvas, &[], None, Some(29.7));
        assert!(any_pixel(&canvas, 10..120, 90..120, |px| px[1] > 128));
        assert!(!any_pixel(&canvas, 0..160, 0..60, |px| px[1] > 0));
    }

    #[test]
    fn out_of_frame_and_degenerate_boxes_are_safe() {
        let mut canvas = RgbImage::new(20, 80);
        paint(
            &mut canvas,
            &[
                marker(MarkerKind::Observed, BoundingBox::new(-50, -50, 500, 500)),
                marker(MarkerKind::Alert, BoundingBox::new(5, 5, 5, 9)),
            ],
            Some("WARNING: DRONE"),
            Some(0.0),
        );
        assert_eq!(*canvas.get_pixel(19, 79), GREEN);
    }
}
