use crate::shared::frame::Frame;
use crate::shared::geometry::ViewRect;

/// Where the preview and its face rectangles are displayed.
///
/// Coordinates are view pixels with the origin at the top-left.
pub trait OverlaySurface {
    /// View size in pixels as `(width, height)`.
    fn size(&self) -> (u32, u32);

    /// Replaces the displayed preview image.
    fn show_frame(&mut self, frame: &Frame);

    /// Removes every overlay currently drawn.
    fn clear_overlays(&mut self);

    /// Adds one rectangle outline on top of the preview.
    fn draw_overlay(&mut self, rect: ViewRect);
}
