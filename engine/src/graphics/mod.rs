//! Graphics module
//!
//! Provides the graphics capability trait and its headless implementation,
//! plus the GPU resources built on it: buffers, textures, shader programs,
//! meshes and the frame renderer.

pub mod buffer;
pub mod context;
pub mod headless;
pub mod mesh;
pub mod renderer;
pub mod shader;
pub mod texture;

// Re-export commonly used types
pub use buffer::GpuBuffer;
pub use context::{
    AttributeLocation, BufferHandle, ClearMask, GraphicsContext, GraphicsError, ProgramHandle,
    ShaderHandle, ShaderStage, TextureHandle, UniformLocation,
};
pub use headless::{Command, ContextError, DrawCall, ErrorCode, HeadlessContext, UniformValue};
pub use mesh::Mesh;
pub use renderer::{FrameStats, Renderer, RendererState};
pub use shader::{AttributeHandles, ShaderError, ShaderProgram, UniformHandles};
pub use texture::{RgbaImage, Texture, TextureError};
