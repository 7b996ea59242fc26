//! Shader program compilation and handle introspection
//!
//! A program is built from one vertex and one fragment source. Attribute and
//! uniform handles are resolved once after linking and cached, since the
//! program's interface cannot change afterwards.

use super::context::{
    AttributeLocation, GraphicsContext, GraphicsError, ProgramHandle, ShaderHandle, ShaderStage,
    UniformLocation,
};
use tracing::{debug, error, info, warn};

/// Errors that can occur while building a shader program
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to compile {stage} shader: {log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("failed to link program: {log}")]
    Link { log: String },

    #[error(transparent)]
    Graphics(#[from] GraphicsError),
}

/// Cached vertex attribute slots; `None` when the shader doesn't declare one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeHandles {
    pub position: Option<AttributeLocation>,
    pub normal: Option<AttributeLocation>,
    pub uv: Option<AttributeLocation>,
}

/// Cached uniform slots; `None` when the shader doesn't declare one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformHandles {
    pub model: Option<UniformLocation>,
    pub view: Option<UniformLocation>,
    pub projection: Option<UniformLocation>,
    pub ambient_light: Option<UniformLocation>,
    pub light_direction: Option<UniformLocation>,
    pub diffuse: Option<UniformLocation>,
}

/// A linked program plus its two shader objects
#[derive(Debug)]
pub struct ShaderProgram {
    vertex_shader: ShaderHandle,
    fragment_shader: ShaderHandle,
    program: ProgramHandle,
    attributes: AttributeHandles,
    uniforms: UniformHandles,
    destroyed: bool,
}

impl ShaderProgram {
    /// Compile both stages, link them and resolve every handle
    ///
    /// On failure every object created so far is deleted, so an error never
    /// leaves a half-built program behind.
    pub fn compile(
        gl: &mut impl GraphicsContext,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, ShaderError> {
        let vertex_shader = compile_stage(gl, ShaderStage::Vertex, vertex_source)?;
        let fragment_shader =
            match compile_stage(gl, ShaderStage::Fragment, fragment_source) {
                Ok(shader) => shader,
                Err(err) => {
                    gl.delete_shader(vertex_shader);
                    return Err(err);
                }
            };

        let program = match link(gl, vertex_shader, fragment_shader) {
            Ok(program) => program,
            Err(err) => {
                gl.delete_shader(vertex_shader);
                gl.delete_shader(fragment_shader);
                return Err(err);
            }
        };

        let attributes = AttributeHandles {
            position: gl.attrib_location(program, "position"),
            normal: gl.attrib_location(program, "normal"),
            uv: gl.attrib_location(program, "uv"),
        };
        let uniforms = UniformHandles {
            model: gl.uniform_location(program, "model"),
            view: gl.uniform_location(program, "view"),
            projection: gl.uniform_location(program, "projection"),
            ambient_light: gl.uniform_location(program, "ambientLight"),
            light_direction: gl.uniform_location(program, "lightDirection"),
            diffuse: gl.uniform_location(program, "diffuse"),
        };

        if attributes.position.is_none() {
            warn!(%program, "Program has no `position` attribute, meshes will not draw");
        }
        info!(%program, ?attributes, "Shader program ready");

        Ok(Self {
            vertex_shader,
            fragment_shader,
            program,
            attributes,
            uniforms,
            destroyed: false,
        })
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    pub fn attributes(&self) -> &AttributeHandles {
        &self.attributes
    }

    pub fn uniforms(&self) -> &UniformHandles {
        &self.uniforms
    }

    /// Make this the active program
    pub fn activate(&self, gl: &mut impl GraphicsContext) {
        gl.use_program(Some(self.program));
    }

    /// Delete the program and both shader objects
    pub fn destroy(mut self, gl: &mut impl GraphicsContext) {
        gl.delete_program(self.program);
        gl.delete_shader(self.vertex_shader);
        gl.delete_shader(self.fragment_shader);
        self.destroyed = true;
        debug!(program = %self.program, "Destroyed shader program");
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        if !self.destroyed {
            warn!(program = %self.program, "Shader program dropped without destroy, GPU objects leaked");
        }
    }
}

fn compile_stage(
    gl: &mut impl GraphicsContext,
    stage: ShaderStage,
    source: &str,
) -> Result<ShaderHandle, ShaderError> {
    let shader = gl.create_shader(stage)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);

    if !gl.shader_compile_status(shader) {
        let log = gl.shader_info_log(shader);
        gl.delete_shader(shader);
        error!(%stage, log = %log, "Shader compilation failed");
        return Err(ShaderError::Compile { stage, log });
    }
    Ok(shader)
}

fn link(
    gl: &mut impl GraphicsContext,
    vertex_shader: ShaderHandle,
    fragment_shader: ShaderHandle,
) -> Result<ProgramHandle, ShaderError> {
    let program = gl.create_program()?;
    gl.attach_shader(program, vertex_shader);
    gl.attach_shader(program, fragment_shader);
    gl.link_program(program);

    if !gl.program_link_status(program) {
        let log = gl.program_info_log(program);
        gl.delete_program(program);
        error!(log = %log, "Program link failed");
        return Err(ShaderError::Link { log });
    }
    Ok(program)
}
