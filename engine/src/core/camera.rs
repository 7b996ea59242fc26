//! Orthographic orbit camera
//!
//! The camera always looks at the world origin with +Y up. Its position is
//! the only mutable state; the driver orbits it with [`Camera::rotate_y`]
//! once per frame.

use crate::graphics::{GraphicsContext, ShaderProgram};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Orthographic camera defined by the extents of its view box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Width of the view box
    pub width: f32,
    /// Height of the view box
    pub height: f32,
    /// Depth of the view box, centered on the eye
    pub depth: f32,
    /// Eye position in world space
    pub position: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self::orthographic(16.0, 10.0, 10.0)
    }
}

impl Camera {
    /// Create an orthographic camera
    ///
    /// # Arguments
    /// * `width` - Horizontal extent of the view box
    /// * `height` - Vertical extent of the view box
    /// * `depth` - Distance between the near and far planes
    pub fn orthographic(width: f32, height: f32, depth: f32) -> Self {
        Self {
            width,
            height,
            depth,
            position: Vec3::new(0.0, 1.0, 3.0),
        }
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Orbit the eye around the vertical axis through the origin
    pub fn rotate_y(&mut self, angle: f32) {
        self.position = Quat::from_rotation_y(angle) * self.position;
    }

    /// World-to-eye matrix looking at the origin
    ///
    /// An eye at the origin has no view direction and yields the identity.
    /// An eye on the Y axis uses -Z as its up vector instead of +Y.
    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.position;
        if eye.length_squared() <= f32::EPSILON {
            return Mat4::IDENTITY;
        }
        let up = if eye.normalize().cross(Vec3::Y).length_squared() <= f32::EPSILON {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(eye, Vec3::ZERO, up)
    }

    /// Eye-to-clip matrix with GL depth range [-1, 1]
    pub fn projection_matrix(&self) -> Mat4 {
        let (half_width, half_height, half_depth) =
            (self.width * 0.5, self.height * 0.5, self.depth * 0.5);
        Mat4::orthographic_rh_gl(
            -half_width,
            half_width,
            -half_height,
            half_height,
            -half_depth,
            half_depth,
        )
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Push view and projection matrices to the active program
    pub fn apply(&self, gl: &mut impl GraphicsContext, shader: &ShaderProgram) {
        let uniforms = shader.uniforms();
        gl.uniform_matrix_4_f32(uniforms.view.as_ref(), &self.view_matrix().to_cols_array());
        gl.uniform_matrix_4_f32(
            uniforms.projection.as_ref(),
            &self.projection_matrix().to_cols_array(),
        );
    }
}
