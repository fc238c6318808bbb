use crate::rendering::domain::overlay_surface::OverlaySurface;
use crate::shared::frame::Frame;
use crate::shared::geometry::ViewRect;

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceCall {
    /// Frame index and upright size.
    ShowFrame {
        index: usize,
        width: u32,
        height: u32,
    },
    ClearOverlays,
    DrawOverlay(ViewRect),
}

/// Surface that draws nothing and remembers every call in order.
pub struct RecordingSurface {
    width: u32,
    height: u32,
    calls: Vec<SurfaceCall>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Rectangles drawn since the last clear.
    pub fn current_overlays(&self) -> Vec<ViewRect> {
        let start = self
            .calls
            .iter()
            .rposition(|c| *c == SurfaceCall::ClearOverlays)
            .map_or(0, |i| i + 1);
        self.calls[start..]
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::DrawOverlay(r) => Some(*r),
                _ => None,
            })
            .collect()
    }
}

impl OverlaySurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn show_frame(&mut self, frame: &Frame) {
        self.calls.push(SurfaceCall::ShowFrame {
            index: frame.index(),
            width: frame.width(),
            height: frame.height(),
        });
    }

    fn clear_overlays(&mut self) {
        self.calls.push(SurfaceCall::ClearOverlays);
    }

    fn draw_overlay(&mut self, rect: ViewRect) {
        self.calls.push(SurfaceCall::DrawOverlay(rect));
    }
}
