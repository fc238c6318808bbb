use std::path::Path;

use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::rendering::domain::image_writer::ImageWriter;
use crate::rendering::domain::overlay_surface::OverlaySurface;
use crate::shared::constants::{OVERLAY_COLOR, OVERLAY_THICKNESS};
use crate::shared::frame::Frame;
use crate::shared::geometry::ViewRect;

/// Off-screen preview: the latest frame scaled to the view, plus the
/// current overlay rectangles. [`compose`](Self::compose) flattens both.
pub struct ImageOverlaySurface {
    width: u32,
    height: u32,
    frame: Option<RgbImage>,
    overlays: Vec<ViewRect>,
    color: Rgb<u8>,
    thickness: u32,
}

impl ImageOverlaySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame: None,
            overlays: Vec::new(),
            color: Rgb(OVERLAY_COLOR),
            thickness: OVERLAY_THICKNESS,
        }
    }

    pub fn with_style(mut self, color: [u8; 3], thickness: u32) -> Self {
        self.color = Rgb(color);
        self.thickness = thickness.max(1);
        self
    }

    pub fn frame(&self) -> Option<&RgbImage> {
        self.frame.as_ref()
    }

    pub fn overlays(&self) -> &[ViewRect] {
        &self.overlays
    }

    /// The preview with every overlay outlined on top. Black when no frame
    /// has been shown yet.
    pub fn compose(&self) -> RgbImage {
        let mut canvas = self
            .frame
            .clone()
            .unwrap_or_else(|| RgbImage::new(self.width, self.height));

        for overlay in &self.overlays {
            let Some((x, y, w, h)) = overlay.clip_to(self.width, self.height) else {
                continue;
            };
            // Thick outlines are nested one-pixel rectangles.
            for inset in 0..self.thickness {
                let (iw, ih) = (
                    w.saturating_sub(2 * inset),
                    h.saturating_sub(2 * inset),
                );
                if iw == 0 || ih == 0 {
                    break;
                }
                let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(iw, ih);
                draw_hollow_rect_mut(&mut canvas, rect, self.color);
            }
        }
        canvas
    }

    pub fn write_snapshot(
        &self,
        writer: &dyn ImageWriter,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        writer.write(path, &self.compose())
    }
}

impl OverlaySurface for ImageOverlaySurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn show_frame(&mut self, frame: &Frame) {
        let Some(rgb) = frame.to_rgb_image() else {
            log::debug!("Preview skipped frame {}: not an RGB buffer", frame.index());
            return;
        };
        let scaled = if rgb.dimensions() == (self.width, self.height) {
            rgb
        } else {
            imageops::resize(&rgb, self.width, self.height, imageops::FilterType::Triangle)
        };
        self.frame = Some(scaled);
    }

    fn clear_overlays(&mut self) {
        self.overlays.clear();
    }

    fn draw_overlay(&mut self, rect: ViewRect) {
        self.overlays.push(rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::infrastructure::image_file_writer::ImageFileWriter;

    const YELLOW: [u8; 3] = [255, 255, 0];

    fn rect(x: f64, y: f64, width: f64, height: f64) -> ViewRect {
        ViewRect {
            x,
            y,
            width,
            height,
        }
    }

    #[test]
    fn test_compose_without_frame_is_black_canvas() {
        let surface = ImageOverlaySurface::new(8, 6);
        let image = surface.compose();
        assert_eq!(image.dimensions(), (8, 6));
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_overlay_outline_is_drawn_and_interior_untouched() {
        let mut surface = ImageOverlaySurface::new(20, 20).with_style(YELLOW, 1);
        surface.draw_overlay(rect(5.0, 5.0, 10.0, 8.0));

        let image = surface.compose();
        assert_eq!(image.get_pixel(5, 5).0, YELLOW);
        assert_eq!(image.get_pixel(14, 12).0, YELLOW);
        assert_eq!(image.get_pixel(9, 9).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(4, 5).0, [0, 0, 0]);
    }

    #[test]
    fn test_thickness_draws_nested_outlines() {
        let mut surface = ImageOverlaySurface::new(20, 20).with_style(YELLOW, 2);
        surface.draw_overlay(rect(2.0, 2.0, 10.0, 10.0));

        let image = surface.compose();
        assert_eq!(image.get_pixel(2, 6).0, YELLOW);
        assert_eq!(image.get_pixel(3, 6).0, YELLOW);
        assert_eq!(image.get_pixel(4, 6).0, [0, 0, 0]);
    }

    #[test]
    fn test_offscreen_overlay_is_ignored() {
        let mut surface = ImageOverlaySurface::new(10, 10);
        surface.draw_overlay(rect(50.0, 50.0, 5.0, 5.0));
        let image = surface.compose();
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_clear_removes_overlays() {
        let mut surface = ImageOverlaySurface::new(10, 10);
        surface.draw_overlay(rect(1.0, 1.0, 3.0, 3.0));
        surface.clear_overlays();
        assert!(surface.overlays().is_empty());
    }

    #[test]
    fn test_show_frame_scales_to_view() {
        let mut surface = ImageOverlaySurface::new(8, 4);
        surface.show_frame(&Frame::new(vec![90u8; 4 * 2 * 3], 4, 2, 3, 0));

        let frame = surface.frame().unwrap();
        assert_eq!(frame.dimensions(), (8, 4));
        assert_eq!(frame.get_pixel(7, 3).0, [90, 90, 90]);
    }

    #[test]
    fn test_show_frame_ignores_non_rgb() {
        let mut surface = ImageOverlaySurface::new(4, 4);
        surface.show_frame(&Frame::new(vec![0u8; 16], 4, 4, 1, 0));
        assert!(surface.frame().is_none());
    }

    #[test]
    fn test_write_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.png");
        let mut surface = ImageOverlaySurface::new(16, 12);
        surface.draw_overlay(rect(2.0, 2.0, 6.0, 6.0));

        surface.write_snapshot(&ImageFileWriter::new(), &path).unwrap();

        let saved = image::open(&path).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (16, 12));
        assert_eq!(saved.get_pixel(2, 2).0, OVERLAY_COLOR);
    }
}
