//! Frame orchestration
//!
//! The renderer owns the graphics context, the clear color and the active
//! shader. It is Idle until a shader is set; while Idle, `render` touches
//! nothing. Once Ready, every frame clears, activates the shader, pushes
//! light then camera uniforms, and draws the meshes in the order given.

use super::context::{ClearMask, GraphicsContext};
use super::mesh::Mesh;
use super::shader::ShaderProgram;
use crate::core::{Camera, Light};
use tracing::{debug, info, trace};

/// Whether the renderer has a shader to draw with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Idle,
    Ready,
}

/// What one rendered frame submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub draw_calls: u32,
    pub vertices: u64,
}

/// Per-surface renderer
pub struct Renderer<G: GraphicsContext> {
    gl: G,
    shader: Option<ShaderProgram>,
    clear_color: [f32; 4],
}

impl<G: GraphicsContext> Renderer<G> {
    /// Take ownership of a context and enable depth testing
    pub fn new(mut gl: G) -> Self {
        info!("Initializing renderer");
        gl.enable_depth_test();
        Self {
            gl,
            shader: None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Context for creating meshes, textures and shaders
    pub fn context(&self) -> &G {
        &self.gl
    }

    pub fn context_mut(&mut self) -> &mut G {
        &mut self.gl
    }

    /// Set the clear color from 8-bit RGB channels
    pub fn set_clear_color(&mut self, red: u8, green: u8, blue: u8) {
        self.clear_color = [
            f32::from(red) / 255.0,
            f32::from(green) / 255.0,
            f32::from(blue) / 255.0,
            1.0,
        ];
        debug!(red, green, blue, "Clear color set");
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Make `shader` the active program, destroying the previous one
    pub fn set_shader(&mut self, shader: ShaderProgram) {
        info!(program = %shader.program(), "Renderer ready");
        if let Some(previous) = self.shader.replace(shader) {
            previous.destroy(&mut self.gl);
        }
    }

    /// Detach the active shader and return to Idle
    pub fn take_shader(&mut self) -> Option<ShaderProgram> {
        self.shader.take()
    }

    pub fn shader(&self) -> Option<&ShaderProgram> {
        self.shader.as_ref()
    }

    pub fn state(&self) -> RendererState {
        match self.shader {
            Some(_) => RendererState::Ready,
            None => RendererState::Idle,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == RendererState::Ready
    }

    /// Render one frame
    ///
    /// Returns `None` without touching the context while Idle.
    pub fn render(&mut self, camera: &Camera, light: &Light, meshes: &[Mesh]) -> Option<FrameStats> {
        let shader = self.shader.as_ref()?;
        let gl = &mut self.gl;

        let [red, green, blue, alpha] = self.clear_color;
        gl.clear_color(red, green, blue, alpha);
        gl.clear(ClearMask::COLOR_DEPTH);

        shader.activate(gl);
        light.apply(gl, shader);
        camera.apply(gl, shader);

        let mut stats = FrameStats::default();
        for mesh in meshes {
            mesh.draw(gl, shader);
            stats.draw_calls += 1;
            stats.vertices += u64::from(mesh.vertex_count());
        }

        trace!(draw_calls = stats.draw_calls, vertices = stats.vertices, "Frame rendered");
        Some(stats)
    }

    /// Destroy the active shader and hand the context back
    pub fn shutdown(mut self) -> G {
        if let Some(shader) = self.shader.take() {
            shader.destroy(&mut self.gl);
        }
        info!("Renderer shut down");
        self.gl
    }
}
