//! View rays produced by the camera's screen-coordinate queries

use crate::core::types::Vec3;

/// Half-line from `origin` along a normalized `direction`.
///
/// For a perspective camera the origin is the camera center; orthographic
/// rays start on the image plane and share one direction.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `t` along the ray
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
