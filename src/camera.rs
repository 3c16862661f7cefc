use cgmath::{Deg, Matrix4, Point3, SquareMatrix, Vector3};

use crate::buffer_structs::CameraUniform;
use crate::config::Projection;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const FOV_Y: Deg<f32> = Deg(45.0);
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;

/// Camera circling the origin at a fixed radius and height, looking at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    pub radius: f32,
    pub height: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            radius: 8.0,
            height: 3.0,
        }
    }
}

impl OrbitCamera {
    pub fn eye(&self, angle: f32) -> Point3<f32> {
        Point3::new(self.radius * angle.cos(), self.height, self.radius * angle.sin())
    }

    pub fn view(&self, angle: f32) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(angle), Point3::new(0.0, 0.0, 0.0), Vector3::unit_y())
    }
}

pub fn projection(kind: Projection, aspect: f32) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX
        * match kind {
            Projection::Orthographic => cgmath::ortho(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0),
            Projection::Perspective => cgmath::perspective(FOV_Y, aspect, Z_NEAR, Z_FAR),
        }
}

pub fn identity_view() -> Matrix4<f32> {
    Matrix4::identity()
}

impl CameraUniform {
    pub fn new(projection: Matrix4<f32>, view: Matrix4<f32>) -> Self {
        Self {
            projection: projection.into(),
            view: view.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Transform};

    #[test]
    fn eye_stays_on_the_orbit() {
        let cam = OrbitCamera::default();
        for step in 0..16 {
            let eye = cam.eye(step as f32 * 0.4);
            let flat = Vector3::new(eye.x, 0.0, eye.z);
            assert!((flat.magnitude() - 8.0).abs() < 1e-4);
            assert_eq!(eye.y, 3.0);
        }
    }

    #[test]
    fn view_maps_origin_in_front_of_the_eye() {
        let cam = OrbitCamera::default();
        let view = cam.view(1.3);
        let origin = view.transform_point(Point3::new(0.0, 0.0, 0.0));
        let distance = (8.0f32 * 8.0 + 3.0 * 3.0).sqrt();
        assert!(origin.x.abs() < 1e-4);
        assert!(origin.y.abs() < 1e-4);
        assert!((origin.z + distance).abs() < 1e-4);
    }

    #[test]
    fn orthographic_depth_lands_in_zero_to_one() {
        let proj = projection(Projection::Orthographic, 1.0);
        let near = proj.transform_point(Point3::new(0.0, 0.0, 1.0));
        let far = proj.transform_point(Point3::new(0.0, 0.0, -1.0));
        assert!(near.z.abs() < 1e-6);
        assert!((far.z - 1.0).abs() < 1e-6);
        let corner = proj.transform_point(Point3::new(1.0, -1.0, 0.0));
        assert!((corner.x - 1.0).abs() < 1e-6 && (corner.y + 1.0).abs() < 1e-6);
    }
}
