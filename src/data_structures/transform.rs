//! Local node transforms.
//!
//! Rotation is stored as Euler angles in degrees and always applied X, then Y,
//! then Z. Scale is kept apart from [`Transform::local_matrix`] so that a node
//! can scale its own geometry without scaling the space its children live in.

use cgmath::{Deg, InnerSpace, Matrix3, Matrix4, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    /// Euler angles in degrees.
    pub rotation: Vector3<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Identity transform: no move, no rotation, unit scale.
    pub fn new() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn rotation_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(Deg(self.rotation.x))
            * Matrix4::from_angle_y(Deg(self.rotation.y))
            * Matrix4::from_angle_z(Deg(self.rotation.z))
    }

    /// `translate(position) · rotX · rotY · rotZ`, the part children inherit.
    pub fn local_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position) * self.rotation_matrix()
    }

    pub fn scale_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Model matrix of the node's own geometry given its world transform.
    pub fn model_matrix(&self, world: Matrix4<f32>) -> Matrix4<f32> {
        world * self.scale_matrix()
    }

    /**
     * Rotates `position` about the world origin.
     *
     * Only the translation moves, the node's own orientation is untouched. A zero
     * axis leaves the position unchanged.
     */
    pub fn rotate_around_origin(&mut self, degrees: f32, axis: Vector3<f32>) {
        if axis.magnitude2() <= f32::EPSILON {
            log::warn!("Cannot rotate around a zero axis, position left unchanged.");
            return;
        }
        let rotation = Matrix3::from_axis_angle(axis.normalize(), Deg(degrees));
        self.position = rotation * self.position;
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(position: Vector3<f32>) -> Self {
        Transform {
            position,
            ..Default::default()
        }
    }
}

/// Translation column of an affine matrix.
pub fn translation_of(matrix: &Matrix4<f32>) -> Vector3<f32> {
    matrix.w.truncate()
}
