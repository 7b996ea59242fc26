//! Asset fetching and the load pipeline
//!
//! Fetching is asynchronous and context-free; uploading needs the graphics
//! context and is synchronous. `Mesh::load` and `ShaderProgram::load` chain
//! the two.

pub mod loader;
pub mod source;

pub use loader::{LoadError, MeshAssets, ShaderSources};
pub use source::{AssetReader, FetchError, FileAssetReader, MemoryAssetReader};
