//! Axis-aligned rectangle in world space.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle given by its top-left corner and size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build the smallest rectangle containing both corners.
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    #[inline]
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline]
    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Inclusive on the min edges, exclusive on the max edges, so that
    /// neighbouring leaves never both claim a point on their shared border.
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.y >= self.y && p.x < self.x + self.width && p.y < self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Grow the rectangle by `dx` on the left and right and `dy` on the top and bottom.
    pub fn inflate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(
            self.x - dx,
            self.y - dy,
            self.width + dx * 2.0,
            self.height + dy * 2.0,
        )
    }

    /// Split into quadrants: top-left, top-right, bottom-left, bottom-right.
    pub fn quadrants(&self) -> [Rect; 4] {
        let w = self.width * 0.5;
        let h = self.height * 0.5;
        [
            Rect::new(self.x, self.y, w, h),
            Rect::new(self.x + w, self.y, w, h),
            Rect::new(self.x, self.y + h, w, h),
            Rect::new(self.x + w, self.y + h, w, h),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_half_open() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(Vec2::new(0.0, 0.0)));
        assert!(r.contains(Vec2::new(9.99, 5.0)));
        assert!(!r.contains(Vec2::new(10.0, 5.0)));
        assert!(!r.contains(Vec2::new(-0.01, 5.0)));
    }

    #[test]
    fn test_intersects() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(!a.intersects(&Rect::new(10.0, 0.0, 5.0, 5.0)));
        assert!(!a.intersects(&Rect::new(-20.0, -20.0, 5.0, 5.0)));
    }

    #[test]
    fn test_quadrants_tile_parent() {
        let r = Rect::new(-4.0, -4.0, 8.0, 8.0);
        let q = r.quadrants();
        assert_eq!(q[0], Rect::new(-4.0, -4.0, 4.0, 4.0));
        assert_eq!(q[1], Rect::new(0.0, -4.0, 4.0, 4.0));
        assert_eq!(q[2], Rect::new(-4.0, 0.0, 4.0, 4.0));
        assert_eq!(q[3], Rect::new(0.0, 0.0, 4.0, 4.0));
        let area: f32 = q.iter().map(|c| c.width * c.height).sum();
        assert_eq!(area, 64.0);
    }

    #[test]
    fn test_from_corners_and_inflate() {
        let r = Rect::from_corners(Vec2::new(3.0, -1.0), Vec2::new(-1.0, 2.0));
        assert_eq!(r, Rect::new(-1.0, -1.0, 4.0, 3.0));
        assert_eq!(r.inflate(1.0, 0.5), Rect::new(-2.0, -1.5, 6.0, 4.0));
        assert_eq!(r.center(), Vec2::new(1.0, 0.5));
    }
}
