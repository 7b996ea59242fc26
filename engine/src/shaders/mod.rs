//! Built-in shader sources
//!
//! A textured, directionally lit WGSL pair written against the attribute and
//! uniform names that [`ShaderProgram`](crate::graphics::ShaderProgram)
//! resolves. Each stage is its own module with a `main` entry point.

/// Vertex stage: transforms positions and forwards normal and UV
pub const BASIC_VERTEX: &str = include_str!("basic_vertex.wgsl");

/// Fragment stage: diffuse texture modulated by Lambert plus ambient
pub const BASIC_FRAGMENT: &str = include_str!("basic_fragment.wgsl");
