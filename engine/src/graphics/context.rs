//! Graphics context capability
//!
//! The engine never talks to a driver directly. Every component that touches
//! GPU state receives a `&mut impl GraphicsContext`, so each bind, upload and
//! draw is visible at its call site and nothing depends on ambient global
//! state. The method set mirrors the GL/WebGL object model: objects are
//! created, bound to a binding point, configured through that binding point,
//! and deleted explicitly.

use std::fmt;
use std::num::NonZeroU32;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub NonZeroU32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// GPU-resident array buffer
    BufferHandle
);
handle!(
    /// Compiled (or failed) shader stage object
    ShaderHandle
);
handle!(
    /// Linked (or failed) program object
    ProgramHandle
);
handle!(
    /// 2D texture object
    TextureHandle
);

/// Vertex attribute slot resolved from a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeLocation(pub u32);

/// Uniform slot resolved from a linked program
///
/// Locations are only meaningful for the program they were resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation {
    pub program: ProgramHandle,
    pub index: u32,
}

/// Pipeline stage a shader object compiles for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Buffers cleared by [`GraphicsContext::clear`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR_DEPTH: Self = Self {
        color: true,
        depth: true,
    };
}

/// Errors raised by the context itself
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphicsError {
    #[error("failed to create {object}: {reason}")]
    Create {
        object: &'static str,
        reason: String,
    },

    #[error("{len} floats cannot be split into vertices of {components} components")]
    MisalignedData { len: usize, components: usize },

    #[error("texture data is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    TextureSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// GL-shaped capability every GPU-facing component is written against
///
/// Uniform writes take `Option<&UniformLocation>`; writing through `None`
/// does nothing, which is how a uniform the shader never declared behaves.
pub trait GraphicsContext {
    // Buffers
    fn create_buffer(&mut self) -> Result<BufferHandle, GraphicsError>;
    fn delete_buffer(&mut self, buffer: BufferHandle);
    fn bind_array_buffer(&mut self, buffer: Option<BufferHandle>);
    /// Replace the contents of the bound array buffer, hinting static use
    fn buffer_data_static(&mut self, data: &[u8]);

    // Vertex attributes
    fn enable_vertex_attrib_array(&mut self, location: AttributeLocation);
    /// Source `location` from the bound array buffer as 32-bit floats
    fn vertex_attrib_pointer_f32(
        &mut self,
        location: AttributeLocation,
        size: u32,
        normalized: bool,
        stride: u32,
        offset: u32,
    );

    // Shaders and programs
    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderHandle, GraphicsError>;
    fn shader_source(&mut self, shader: ShaderHandle, source: &str);
    fn compile_shader(&mut self, shader: ShaderHandle);
    fn shader_compile_status(&mut self, shader: ShaderHandle) -> bool;
    fn shader_info_log(&mut self, shader: ShaderHandle) -> String;
    fn delete_shader(&mut self, shader: ShaderHandle);

    fn create_program(&mut self) -> Result<ProgramHandle, GraphicsError>;
    fn attach_shader(&mut self, program: ProgramHandle, shader: ShaderHandle);
    fn link_program(&mut self, program: ProgramHandle);
    fn program_link_status(&mut self, program: ProgramHandle) -> bool;
    fn program_info_log(&mut self, program: ProgramHandle) -> String;
    fn delete_program(&mut self, program: ProgramHandle);
    fn use_program(&mut self, program: Option<ProgramHandle>);

    fn attrib_location(&mut self, program: ProgramHandle, name: &str)
        -> Option<AttributeLocation>;
    fn uniform_location(&mut self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    // Uniforms on the current program
    fn uniform_1_f32(&mut self, location: Option<&UniformLocation>, x: f32);
    fn uniform_1_i32(&mut self, location: Option<&UniformLocation>, x: i32);
    fn uniform_3_f32(&mut self, location: Option<&UniformLocation>, x: f32, y: f32, z: f32);
    /// Upload a column-major 4x4 matrix
    fn uniform_matrix_4_f32(&mut self, location: Option<&UniformLocation>, matrix: &[f32; 16]);

    // Textures
    fn create_texture(&mut self) -> Result<TextureHandle, GraphicsError>;
    fn delete_texture(&mut self, texture: TextureHandle);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture_2d(&mut self, texture: Option<TextureHandle>);
    /// Upload tightly packed RGBA8 pixels into the bound 2D texture
    fn tex_image_2d_rgba(&mut self, width: u32, height: u32, pixels: &[u8]);

    // Frame state
    fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear(&mut self, mask: ClearMask);
    fn enable_depth_test(&mut self);
    fn draw_arrays_triangles(&mut self, first: u32, count: u32);
}
