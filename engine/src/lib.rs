//! Textured mesh viewer engine
//!
//! This crate parses triangulated geometry text, uploads it to the GPU through
//! a GL-shaped capability, compiles a shader pipeline and renders meshes with
//! an orthographic orbit camera and a single directional light.

pub mod config;
pub mod core;
pub mod geometry;
pub mod graphics;
pub mod io;
pub mod shaders;

// Re-export commonly used types
pub mod prelude {
    // Scene types
    pub use crate::core::{Camera, Light, Transform};

    // Geometry types
    pub use crate::geometry::{Face, Geometry, MalformedGeometry, Vertex};

    // Math types
    pub use glam::{Mat4, Quat, Vec2, Vec3};

    // Graphics types
    pub use crate::graphics::{
        FrameStats, GpuBuffer, GraphicsContext, HeadlessContext, Mesh, Renderer, ShaderError,
        ShaderProgram, Texture,
    };

    // IO types
    pub use crate::io::{AssetReader, FileAssetReader, LoadError, MeshAssets, ShaderSources};

    // Config types
    pub use crate::config::{AssetConfig, ViewerConfig};
}

/// Initialize logging for the engine
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`.
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
