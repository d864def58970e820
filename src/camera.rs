//! A camera that always looks at the world origin.

use cgmath::{Deg, Matrix4, Point3, Vector3, perspective};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

pub const WORLD_UP: Vector3<f32> = Vector3::new(0.0, 1.0, 0.0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    fovy: Deg<f32>,
    aspect: f32,
    znear: f32,
    zfar: f32,
    projection: Matrix4<f32>,
}

impl Camera {
    pub fn new(position: Point3<f32>, fovy: Deg<f32>, aspect: f32, znear: f32, zfar: f32) -> Self {
        let mut camera = Self {
            position,
            fovy,
            aspect,
            znear,
            zfar,
            projection: Matrix4::from_scale(1.0),
        };
        camera.set_projection(fovy, aspect, znear, zfar);
        camera
    }

    /// Rebuilds the projection. The aspect ratio is clamped away from zero.
    pub fn set_projection(&mut self, fovy: Deg<f32>, aspect: f32, znear: f32, zfar: f32) {
        self.fovy = fovy;
        self.aspect = if aspect.is_finite() && aspect > 0.0 {
            aspect
        } else {
            1.0
        };
        self.znear = znear;
        self.zfar = zfar;
        self.projection = OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, znear, zfar);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        let aspect = width as f32 / height.max(1) as f32;
        self.set_projection(self.fovy, aspect, self.znear, self.zfar);
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Right-handed look-at from `position` towards the origin with +Y up.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, Point3::new(0.0, 0.0, 0.0), WORLD_UP)
    }
}

impl Default for Camera {
    /// 60° field of view, near 0.1, far 100, placed at (0, 1, 4).
    fn default() -> Self {
        Self::new(Point3::new(0.0, 1.0, 4.0), Deg(60.0), 4.0 / 3.0, 0.1, 100.0)
    }
}
