use eframe::egui::{Pos2, Vec2};

use crate::store::records::CanvasState;

pub const MIN_SCALE: f32 = 0.25;
pub const MAX_SCALE: f32 = 3.0;
pub const WHEEL_ZOOM_STEP: f32 = 0.08;
pub const KEY_ZOOM_STEP: f32 = 0.10;

/// The shared zoomable/pannable surface windows sit on. Screen coordinates
/// are viewport-local; the transform is `screen = canvas * scale + pan`, so
/// pan is measured in screen pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasView {
    pub scale: f32,
    pub pan: Vec2,
}

impl Default for CanvasView {
    fn default() -> Self {
        Self { scale: 1.0, pan: Vec2::ZERO }
    }
}

impl CanvasView {
    pub fn from_state(state: CanvasState) -> Self {
        Self {
            scale: state.scale.clamp(MIN_SCALE, MAX_SCALE),
            pan: Vec2::new(state.pan_x, state.pan_y),
        }
    }

    pub fn state(&self) -> CanvasState {
        CanvasState { scale: self.scale, pan_x: self.pan.x, pan_y: self.pan.y }
    }

    pub fn to_screen(&self, p: Pos2) -> Pos2 {
        Pos2::new(p.x * self.scale + self.pan.x, p.y * self.scale + self.pan.y)
    }

    pub fn to_canvas(&self, p: Pos2) -> Pos2 {
        Pos2::new((p.x - self.pan.x) / self.scale, (p.y - self.pan.y) / self.scale)
    }

    /// Canvas coordinates currently under the middle of the viewport.
    pub fn viewport_center_canvas(&self, viewport: Vec2) -> Pos2 {
        self.to_canvas(Pos2::new(viewport.x / 2.0, viewport.y / 2.0))
    }

    /// Step the scale, re-anchored so the canvas point under `pointer` keeps
    /// its screen position. Returns false when already at the clamp bound.
    pub fn zoom_at(&mut self, pointer: Pos2, delta: f32) -> bool {
        let new_scale = (self.scale + delta).clamp(MIN_SCALE, MAX_SCALE);
        if new_scale == self.scale {
            return false;
        }
        let anchor = self.to_canvas(pointer);
        self.scale = new_scale;
        self.pan = Vec2::new(pointer.x - anchor.x * self.scale, pointer.y - anchor.y * self.scale);
        true
    }

    /// Raw screen-pixel translation; pan itself defines the transform, so it
    /// is never divided by the scale.
    pub fn pan_by(&mut self, delta: Vec2) {
        self.pan += delta;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
