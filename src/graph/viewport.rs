//! View transform between world space and screen space.
//!
//! `screen = (world + view_pos) · 2^zoom + viewport center`

use glam::Vec2;

use crate::layout::ViewParams;
use crate::spatial::Rect;

/// Pan/zoom state of the canvas the graph is drawn on.
#[derive(Debug, Clone)]
pub struct Viewport {
    rect: Rect,
    view_pos: Vec2,
    zoom: f32,
    min_zoom: f32,
    max_zoom: f32,
}

impl Viewport {
    pub fn new(params: &ViewParams) -> Self {
        Self {
            rect: Rect::default(),
            view_pos: Vec2::ZERO,
            zoom: params.initial_zoom.clamp(params.min_zoom, params.max_zoom),
            min_zoom: params.min_zoom,
            max_zoom: params.max_zoom,
        }
    }

    /// Screen rectangle in pixels.
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn set_rect(&mut self, rect: Rect) {
        self.rect = rect;
    }

    /// World-space translation applied before scaling.
    pub fn view_pos(&self) -> Vec2 {
        self.view_pos
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Screen pixels per world unit.
    #[inline]
    pub fn scale(&self) -> f32 {
        self.zoom.exp2()
    }

    /// Change the zoom level by `delta`, clamped to the configured range.
    pub fn zoom_by(&mut self, delta: f32) {
        self.zoom = (self.zoom + delta).clamp(self.min_zoom, self.max_zoom);
    }

    /// Pan by a screen-space drag delta.
    pub fn pan(&mut self, screen_delta: Vec2) {
        self.view_pos += self.screen_delta_to_world(screen_delta);
    }

    #[inline]
    pub fn screen_delta_to_world(&self, screen_delta: Vec2) -> Vec2 {
        screen_delta / self.scale()
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        (world + self.view_pos) * self.scale() + self.rect.center()
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        (screen - self.rect.center()) / self.scale() - self.view_pos
    }

    /// World-space area covered by the viewport, grown by `margin` on every side.
    pub fn visible_world_rect(&self, margin: f32) -> Rect {
        let a = self.screen_to_world(self.rect.min());
        let b = self.screen_to_world(self.rect.max());
        Rect::from_corners(a, b).inflate(margin, margin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        let mut v = Viewport::new(&ViewParams::default());
        v.set_rect(Rect::new(0.0, 0.0, 800.0, 600.0));
        v
    }

    #[test]
    fn test_defaults() {
        let v = viewport();
        assert_eq!(v.zoom(), 2.0);
        assert_eq!(v.scale(), 4.0);
        assert_eq!(v.world_to_screen(Vec2::ZERO), Vec2::new(400.0, 300.0));
    }

    #[test]
    fn test_screen_world_inverse() {
        let mut v = viewport();
        v.pan(Vec2::new(37.0, -12.0));
        v.zoom_by(0.75);
        let w = Vec2::new(3.5, -7.25);
        let back = v.screen_to_world(v.world_to_screen(w));
        assert!(back.distance(w) < 1e-4);
    }

    #[test]
    fn test_pan_moves_content_by_drag() {
        let mut v = viewport();
        let before = v.world_to_screen(Vec2::new(1.0, 1.0));
        v.pan(Vec2::new(20.0, 8.0));
        let after = v.world_to_screen(Vec2::new(1.0, 1.0));
        assert!((after - before).distance(Vec2::new(20.0, 8.0)) < 1e-4);
    }

    #[test]
    fn test_zoom_is_clamped() {
        let mut v = viewport();
        v.zoom_by(100.0);
        assert_eq!(v.zoom(), 8.0);
        v.zoom_by(-100.0);
        assert_eq!(v.zoom(), 0.0);
        assert_eq!(v.scale(), 1.0);
    }

    #[test]
    fn test_visible_world_rect() {
        let v = viewport();
        let r = v.visible_world_rect(16.0);
        // 800×600 pixels at scale 4 is 200×150 world units
        assert_eq!(r, Rect::new(-116.0, -91.5, 232.0, 183.0));
    }
}
