//! Camera with quaternion pose and lens parameters

use crate::core::types::{Mat4, Quat, Vec3, Vec4};
use crate::math::Ray;

/// Axis along which a field of view is understood
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FovAxis {
    Horizontal,
    Vertical,
}

/// Coordinate frame in which a camera translation is understood
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Space {
    View,
    World,
}

/// Optical configuration of the lens and sensor
#[derive(Clone, Copy, Debug)]
pub struct LensParams {
    /// Sensor width / sensor height
    pub aspect: f32,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Lens shift ratio along the horizontal axis
    pub shift_x: f32,
    /// Lens shift ratio along the vertical axis
    pub shift_y: f32,
    pub near: f32,
    pub far: f32,
    pub ortho: bool,
}

impl Default for LensParams {
    fn default() -> Self {
        Self {
            aspect: 1.0,
            fov_y: 90.0_f32.to_radians(),
            shift_x: 0.0,
            shift_y: 0.0,
            near: 0.01,
            far: 1000.0,
            ortho: false,
        }
    }
}

/// Camera with position, rotation and lens parameters.
///
/// Matrices are column-major. Setting `near == far` produces non-finite
/// projections. Reversed-Z and a zero near plane are legal; the caller
/// accepts the depth-precision consequences.
///
/// Screen coordinates for ray and unprojection queries are normalized to
/// [0,1] with x growing rightward and y growing downward.
#[derive(Clone, Copy, Debug, Default)]
pub struct Camera {
    rotation: Quat,
    position: Vec3,
    lens: LensParams,
}

impl Camera {
    /// Create a camera with the given aspect ratio and field of view in
    /// degrees, understood along `axis`.
    pub fn new(aspect: f32, fov_deg: f32, axis: FovAxis) -> Self {
        let mut cam = Self::default();
        cam.lens.aspect = aspect;
        cam.set_fov(fov_deg, axis);
        cam
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn lens(&self) -> &LensParams {
        &self.lens
    }

    pub fn set_position(&mut self, position: Vec3) -> &mut Self {
        self.position = position;
        self
    }

    pub fn set_rotation(&mut self, rotation: Quat) -> &mut Self {
        self.rotation = rotation.normalize();
        self
    }

    /// Change the aspect ratio, keeping the fov constant along `cst_axis`
    /// so the image does not distort.
    pub fn set_aspect(&mut self, aspect: f32, cst_axis: FovAxis) -> &mut Self {
        if cst_axis == FovAxis::Horizontal {
            let fov_x = 2.0 * ((self.lens.fov_y * 0.5).tan() * self.lens.aspect).atan();
            self.lens.fov_y = 2.0 * ((fov_x * 0.5).tan() / aspect).atan();
        }
        self.lens.aspect = aspect;
        self
    }

    /// Change the field of view, given in degrees along `axis`.
    pub fn set_fov(&mut self, fov_deg: f32, axis: FovAxis) -> &mut Self {
        let fov = fov_deg.to_radians();
        self.lens.fov_y = match axis {
            FovAxis::Vertical => fov,
            FovAxis::Horizontal => 2.0 * ((fov * 0.5).tan() / self.lens.aspect).atan(),
        };
        self
    }

    /// Change the lens shift for non-centered lenses. A shift of `s` moves
    /// the projected image center by `s` in normalized device coordinates.
    pub fn set_lens_shift(&mut self, shift_x: f32, shift_y: f32) -> &mut Self {
        self.lens.shift_x = shift_x;
        self.lens.shift_y = shift_y;
        self
    }

    pub fn set_orthographic(&mut self, ortho: bool) -> &mut Self {
        self.lens.ortho = ortho;
        self
    }

    pub fn near(&self) -> f32 {
        self.lens.near
    }

    pub fn far(&self) -> f32 {
        self.lens.far
    }

    pub fn set_near(&mut self, near: f32) -> &mut Self {
        self.lens.near = near;
        self
    }

    pub fn set_far(&mut self, far: f32) -> &mut Self {
        self.lens.far = far;
        self
    }

    /// Apply a translation, understood in view or world coordinates.
    pub fn translate(&mut self, t: Vec3, space: Space) -> &mut Self {
        self.position += match space {
            Space::View => self.rotation * t,
            Space::World => t,
        };
        self
    }

    /// Apply a rotation around the camera center.
    pub fn rotate(&mut self, r: Quat) -> &mut Self {
        self.rotation = (r * self.rotation).normalize();
        self
    }

    /// Roto-translate the camera around a pivot point in world coordinates.
    pub fn orbit(&mut self, r: Quat, pivot: Vec3) -> &mut Self {
        self.rotation = (r * self.rotation).normalize();
        self.position = pivot + r * (self.position - pivot);
        self
    }

    pub fn world_to_view(&self) -> Mat4 {
        Mat4::from_quat(self.rotation.conjugate()) * Mat4::from_translation(-self.position)
    }

    pub fn view_to_world(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_quat(self.rotation)
    }

    /// Projection matrix. Right-handed view space (camera looks down -Z),
    /// depth mapped to [0,1].
    pub fn view_to_clip(&self) -> Mat4 {
        let l = &self.lens;
        if l.ortho {
            let half_h = (l.fov_y * 0.5).tan();
            let half_w = half_h * l.aspect;
            Mat4::from_cols(
                Vec4::new(1.0 / half_w, 0.0, 0.0, 0.0),
                Vec4::new(0.0, 1.0 / half_h, 0.0, 0.0),
                Vec4::new(0.0, 0.0, 1.0 / (l.near - l.far), 0.0),
                Vec4::new(l.shift_x, l.shift_y, l.near / (l.near - l.far), 1.0),
            )
        } else {
            let f = 1.0 / (l.fov_y * 0.5).tan();
            Mat4::from_cols(
                Vec4::new(f / l.aspect, 0.0, 0.0, 0.0),
                Vec4::new(0.0, f, 0.0, 0.0),
                Vec4::new(-l.shift_x, -l.shift_y, l.far / (l.near - l.far), -1.0),
                Vec4::new(0.0, 0.0, l.near * l.far / (l.near - l.far), 0.0),
            )
        }
    }

    pub fn clip_to_view(&self) -> Mat4 {
        self.view_to_clip().inverse()
    }

    pub fn world_to_clip(&self) -> Mat4 {
        self.view_to_clip() * self.world_to_view()
    }

    pub fn clip_to_world(&self) -> Mat4 {
        self.view_to_world() * self.clip_to_view()
    }

    /// Ray in view coordinates through the given normalized screen position.
    pub fn view_ray_at(&self, x: f32, y: f32) -> Ray {
        let ndc_x = 2.0 * x - 1.0;
        let ndc_y = 1.0 - 2.0 * y;
        let inv = self.clip_to_view();
        let p0 = inv.project_point3(Vec3::new(ndc_x, ndc_y, 0.0));
        let p1 = inv.project_point3(Vec3::new(ndc_x, ndc_y, 1.0));
        let origin = if self.lens.ortho { p0 } else { Vec3::ZERO };
        Ray::new(origin, (p1 - p0).normalize())
    }

    /// Ray in world coordinates through the given normalized screen position.
    pub fn world_ray_at(&self, x: f32, y: f32) -> Ray {
        let ray = self.view_ray_at(x, y);
        Ray::new(
            self.position + self.rotation * ray.origin,
            self.rotation * ray.direction,
        )
    }

    /// View-space position of the given normalized screen coordinates and
    /// normalized depth (as read back from a depth buffer).
    pub fn view_coord_at(&self, x: f32, y: f32, depth: f32) -> Vec3 {
        let ndc_x = 2.0 * x - 1.0;
        let ndc_y = 1.0 - 2.0 * y;
        self.clip_to_view().project_point3(Vec3::new(ndc_x, ndc_y, depth))
    }

    /// World-space position of the given normalized screen coordinates and
    /// normalized depth.
    pub fn world_coord_at(&self, x: f32, y: f32, depth: f32) -> Vec3 {
        self.view_to_world().transform_point3(self.view_coord_at(x, y, depth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_looks_down_negative_z() {
        let camera = Camera::default();
        let ray = camera.world_ray_at(0.5, 0.5);
        assert!((ray.direction.z - (-1.0)).abs() < 1e-5);
        assert!(ray.direction.x.abs() < 1e-5);
        assert!(ray.direction.y.abs() < 1e-5);
    }

    #[test]
    fn test_view_matrix_translation() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::new(10.0, 0.0, 0.0));
        let origin_in_view = camera.world_to_view().transform_point3(Vec3::ZERO);
        assert!((origin_in_view.x - (-10.0)).abs() < 1e-4);
    }

    #[test]
    fn test_clip_roundtrip() {
        let mut camera = Camera::new(16.0 / 9.0, 60.0, FovAxis::Vertical);
        camera.set_position(Vec3::new(1.0, 2.0, 3.0));
        let m = camera.world_to_clip() * camera.clip_to_world();
        assert!((m.w_axis.w - 1.0).abs() < 1e-3);
        assert!((m.x_axis.x - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_depth_range() {
        let camera = Camera::default();
        let near_pt = Vec3::new(0.0, 0.0, -camera.near());
        let far_pt = Vec3::new(0.0, 0.0, -camera.far());
        let p = camera.view_to_clip();
        let d0 = p.project_point3(near_pt).z;
        let d1 = p.project_point3(far_pt).z;
        assert!(d0.abs() < 1e-5);
        assert!((d1 - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_set_aspect_keeps_vertical_fov() {
        let mut camera = Camera::new(1.0, 60.0, FovAxis::Vertical);
        let fov_before = camera.lens().fov_y;
        camera.set_aspect(2.0, FovAxis::Vertical);
        assert_eq!(camera.lens().fov_y, fov_before);
    }

    #[test]
    fn test_set_aspect_keeps_horizontal_fov() {
        let mut camera = Camera::new(1.0, 60.0, FovAxis::Vertical);
        let fov_x = 2.0 * ((camera.lens().fov_y * 0.5).tan() * camera.lens().aspect).atan();
        camera.set_aspect(2.0, FovAxis::Horizontal);
        let fov_x_after = 2.0 * ((camera.lens().fov_y * 0.5).tan() * camera.lens().aspect).atan();
        assert!((fov_x - fov_x_after).abs() < 1e-5);
    }

    #[test]
    fn test_lens_shift_moves_center() {
        let mut camera = Camera::default();
        camera.set_lens_shift(0.5, 0.0);
        let ndc = camera.view_to_clip().project_point3(Vec3::new(0.0, 0.0, -1.0));
        assert!((ndc.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_translate_spaces() {
        let mut camera = Camera::default();
        camera.rotate(Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));
        camera.translate(Vec3::new(0.0, 0.0, -1.0), Space::View);
        // Facing -X after the rotation, so a view-space forward step moves -X
        assert!((camera.position().x - (-1.0)).abs() < 1e-5);
        camera.translate(Vec3::new(0.0, 5.0, 0.0), Space::World);
        assert!((camera.position().y - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_orbit_preserves_pivot_distance() {
        let mut camera = Camera::default();
        camera.set_position(Vec3::new(0.0, 0.0, 10.0));
        let pivot = Vec3::new(0.0, 0.0, 2.0);
        let d0 = (camera.position() - pivot).length();
        camera.orbit(Quat::from_rotation_y(0.7), pivot);
        let d1 = (camera.position() - pivot).length();
        assert!((d0 - d1).abs() < 1e-4);
    }

    #[test]
    fn test_ortho_rays_are_parallel() {
        let mut camera = Camera::default();
        camera.set_orthographic(true);
        let r0 = camera.world_ray_at(0.25, 0.5);
        let r1 = camera.world_ray_at(0.75, 0.5);
        assert!((r0.direction - r1.direction).length() < 1e-5);
        assert!((r0.origin - r1.origin).length() > 1e-3);
    }

    #[test]
    fn test_world_coord_roundtrip() {
        let mut camera = Camera::new(1.5, 70.0, FovAxis::Vertical);
        camera.set_position(Vec3::new(3.0, -1.0, 4.0));
        camera.rotate(Quat::from_rotation_y(0.3));
        let p = Vec3::new(0.5, 0.25, -7.0);
        let world = camera.view_to_world().transform_point3(p);
        let clip = camera.world_to_clip().project_point3(world);
        let x = (clip.x + 1.0) * 0.5;
        let y = (1.0 - clip.y) * 0.5;
        let back = camera.world_coord_at(x, y, clip.z);
        assert!((back - world).length() < 1e-2);
    }
}
