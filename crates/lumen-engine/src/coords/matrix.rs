//! 4×4 homogeneous matrices for the 2D pipeline.
//!
//! Matrices are column-major `glam::Mat4`; the z axis is unused apart from the
//! orthographic near/far range.

use super::Vec2;

pub use glam::Mat4;

/// Translate · rotate(z) · scale, the per-instance model matrix.
#[inline]
pub fn model_matrix(position: Vec2, rotation: f32, scale: Vec2) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        glam::Vec3::new(scale.x, scale.y, 1.0),
        glam::Quat::from_rotation_z(rotation),
        glam::Vec3::new(position.x, position.y, 0.0),
    )
}

/// Orthographic projection centered at the origin spanning `width × height`.
///
/// World +Y maps to screen-down (NDC -Y), matching the screen-space convention.
/// Depth maps `[-1, 1]` to wgpu's `[0, 1]` clip range.
#[inline]
pub fn orthographic(width: f32, height: f32) -> Mat4 {
    let hw = width * 0.5;
    let hh = height * 0.5;
    Mat4::orthographic_rh(-hw, hw, hh, -hh, -1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn approx(a: glam::Vec3, b: glam::Vec3) -> bool {
        (a - b).abs().max_element() < EPS
    }

    #[test]
    fn model_matrix_translates_scaled_corner() {
        let m = model_matrix(Vec2::new(10.0, 5.0), 0.0, Vec2::new(2.0, 4.0));
        let p = m.transform_point3(glam::Vec3::new(0.5, 0.5, 0.0));
        assert!(approx(p, glam::Vec3::new(11.0, 7.0, 0.0)));
    }

    #[test]
    fn model_matrix_rotates_about_z() {
        let m = model_matrix(Vec2::ZERO, core::f32::consts::FRAC_PI_2, Vec2::ONE);
        let p = m.transform_point3(glam::Vec3::new(1.0, 0.0, 0.0));
        assert!(approx(p, glam::Vec3::new(0.0, 1.0, 0.0)));
    }

    #[test]
    fn orthographic_maps_edges_to_ndc() {
        let p = orthographic(800.0, 600.0);
        let right_bottom = p.project_point3(glam::Vec3::new(400.0, 300.0, 0.0));
        assert!((right_bottom.x - 1.0).abs() < EPS);
        assert!((right_bottom.y + 1.0).abs() < EPS);
        let origin = p.project_point3(glam::Vec3::ZERO);
        assert!(origin.x.abs() < EPS && origin.y.abs() < EPS);
    }
}
