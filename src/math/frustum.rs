//! View frustum extraction and AABB classification

use crate::core::types::{Mat4, Vec3, Vec4};
use super::aabb::Aabb;

/// Result of classifying a volume against the frustum
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    Outside,
    Intersect,
    Inside,
}

/// A plane in Hessian normal form (positive side = in front)
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }
}

/// 6-plane frustum extracted from a projection-view matrix
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from a projection-view matrix.
    /// Uses the Gribb/Hartmann method on the matrix rows
    /// (column-major storage).
    pub fn from_matrix(pvm: &Mat4) -> Self {
        let rows = [
            Vec4::new(pvm.col(0).x, pvm.col(1).x, pvm.col(2).x, pvm.col(3).x),
            Vec4::new(pvm.col(0).y, pvm.col(1).y, pvm.col(2).y, pvm.col(3).y),
            Vec4::new(pvm.col(0).z, pvm.col(1).z, pvm.col(2).z, pvm.col(3).z),
            Vec4::new(pvm.col(0).w, pvm.col(1).w, pvm.col(2).w, pvm.col(3).w),
        ];

        let raw = [
            rows[3] + rows[0], // left
            rows[3] - rows[0], // right
            rows[3] + rows[1], // bottom
            rows[3] - rows[1], // top
            rows[3] + rows[2], // near
            rows[3] - rows[2], // far
        ];

        let mut planes = [Plane { normal: Vec3::ZERO, d: 0.0 }; 6];
        for (i, r) in raw.iter().enumerate() {
            let len = Vec3::new(r.x, r.y, r.z).length();
            if len > 0.0 {
                planes[i] = Plane {
                    normal: Vec3::new(r.x, r.y, r.z) / len,
                    d: r.w / len,
                };
            }
        }

        Self { planes }
    }

    /// Classify an AABB against the frustum with the p/n-vertex test.
    ///
    /// The p-vertex (corner most aligned with the plane normal) behind any
    /// plane means the box is fully outside; the n-vertex in front of every
    /// plane means the box is fully inside.
    pub fn visibility(&self, aabb: &Aabb) -> Visibility {
        let mut inside = true;
        for plane in &self.planes {
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            if plane.distance_to_point(p) < 0.0 {
                return Visibility::Outside;
            }

            let n = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.min.x } else { aabb.max.x },
                if plane.normal.y >= 0.0 { aabb.min.y } else { aabb.max.y },
                if plane.normal.z >= 0.0 { aabb.min.z } else { aabb.max.z },
            );
            if plane.distance_to_point(n) < 0.0 {
                inside = false;
            }
        }
        if inside {
            Visibility::Inside
        } else {
            Visibility::Intersect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::camera::{Camera, FovAxis};

    fn test_frustum() -> Frustum {
        // Camera at +10Z looking down -Z
        let mut camera = Camera::new(1.0, 90.0, FovAxis::Vertical);
        camera.set_position(Vec3::new(0.0, 0.0, 10.0));
        Frustum::from_matrix(&camera.world_to_clip())
    }

    #[test]
    fn test_box_in_front_is_visible() {
        let f = test_frustum();
        let aabb = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_ne!(f.visibility(&aabb), Visibility::Outside);
    }

    #[test]
    fn test_box_behind_is_outside() {
        let f = test_frustum();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, 20.0), Vec3::new(1.0, 1.0, 22.0));
        assert_eq!(f.visibility(&aabb), Visibility::Outside);
    }

    #[test]
    fn test_small_box_is_inside() {
        let f = test_frustum();
        let aabb = Aabb::new(
            Vec3::new(-0.1, -0.1, -0.1),
            Vec3::new(0.1, 0.1, 0.1),
        );
        assert_eq!(f.visibility(&aabb), Visibility::Inside);
    }

    #[test]
    fn test_straddling_box_intersects() {
        let f = test_frustum();
        // Spans the left frustum boundary
        let aabb = Aabb::new(Vec3::new(-50.0, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(f.visibility(&aabb), Visibility::Intersect);
    }
}
