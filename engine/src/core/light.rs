//! Directional light

use crate::graphics::{GraphicsContext, ShaderProgram};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A single directional light with a flat ambient term
///
/// Fixed after construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    direction: Vec3,
    ambient: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self::new(Vec3::new(-1.0, -1.0, -1.0), 0.3)
    }
}

impl Light {
    pub fn new(direction: Vec3, ambient: f32) -> Self {
        Self { direction, ambient }
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn ambient(&self) -> f32 {
        self.ambient
    }

    /// Push direction and ambient intensity to the active program
    pub fn apply(&self, gl: &mut impl GraphicsContext, shader: &ShaderProgram) {
        let uniforms = shader.uniforms();
        let Vec3 { x, y, z } = self.direction;
        gl.uniform_3_f32(uniforms.light_direction.as_ref(), x, y, z);
        gl.uniform_1_f32(uniforms.ambient_light.as_ref(), self.ambient);
    }
}
