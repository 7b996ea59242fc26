//! Two-phase asset loading
//!
//! Each resource needs two fetches. They run concurrently and are joined
//! all-or-nothing: the first failure aborts the join, and nothing is parsed
//! or uploaded unless both succeed.

use super::source::{AssetReader, FetchError};
use crate::geometry::{Geometry, MalformedGeometry};
use crate::graphics::{
    GraphicsContext, GraphicsError, Mesh, RgbaImage, ShaderError, ShaderProgram, Texture,
    TextureError,
};
use crate::shaders::{BASIC_FRAGMENT, BASIC_VERTEX};
use std::rc::Rc;
use tracing::info;

/// Anything that can stop a resource from loading
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Geometry(#[from] MalformedGeometry),

    #[error(transparent)]
    Texture(#[from] TextureError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Graphics(#[from] GraphicsError),
}

/// Parsed geometry and decoded texture, ready for upload
#[derive(Debug, Clone)]
pub struct MeshAssets {
    pub geometry: Geometry,
    pub image: RgbaImage,
}

impl MeshAssets {
    /// Fetch geometry text and texture bytes concurrently, then parse both
    pub async fn fetch(
        reader: &impl AssetReader,
        geometry_path: &str,
        texture_path: &str,
    ) -> Result<Self, LoadError> {
        let (text, bytes) = futures::try_join!(
            reader.read_text(geometry_path),
            reader.read_bytes(texture_path)
        )?;

        let geometry = Geometry::parse(&text)?;
        let image = RgbaImage::decode(&bytes)?;
        info!(
            geometry = geometry_path,
            texture = texture_path,
            faces = geometry.face_count(),
            "Fetched mesh assets"
        );
        Ok(Self { geometry, image })
    }

    /// Upload the texture, then the mesh buffers
    ///
    /// The texture is destroyed again if the buffers cannot be created.
    pub fn upload(&self, gl: &mut impl GraphicsContext) -> Result<Mesh, LoadError> {
        let texture = Rc::new(Texture::from_image(gl, &self.image)?);
        match Mesh::new(gl, &self.geometry, Rc::clone(&texture)) {
            Ok(mesh) => Ok(mesh),
            Err(err) => {
                if let Ok(texture) = Rc::try_unwrap(texture) {
                    texture.destroy(gl);
                }
                Err(err.into())
            }
        }
    }
}

/// Vertex and fragment source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    /// Fetch both stages concurrently
    pub async fn fetch(
        reader: &impl AssetReader,
        vertex_path: &str,
        fragment_path: &str,
    ) -> Result<Self, LoadError> {
        let (vertex, fragment) = futures::try_join!(
            reader.read_text(vertex_path),
            reader.read_text(fragment_path)
        )?;
        Ok(Self { vertex, fragment })
    }

    /// The built-in textured, lit pair
    pub fn builtin() -> Self {
        Self {
            vertex: BASIC_VERTEX.to_string(),
            fragment: BASIC_FRAGMENT.to_string(),
        }
    }

    /// Fetch the stages that have a path and use the built-in source for
    /// the others
    pub async fn fetch_or_builtin(
        reader: &impl AssetReader,
        vertex_path: Option<&str>,
        fragment_path: Option<&str>,
    ) -> Result<Self, LoadError> {
        let (vertex, fragment) = futures::try_join!(
            read_or(reader, vertex_path, BASIC_VERTEX),
            read_or(reader, fragment_path, BASIC_FRAGMENT)
        )?;
        Ok(Self { vertex, fragment })
    }

    pub fn compile(&self, gl: &mut impl GraphicsContext) -> Result<ShaderProgram, LoadError> {
        Ok(ShaderProgram::compile(gl, &self.vertex, &self.fragment)?)
    }
}

async fn read_or(
    reader: &impl AssetReader,
    path: Option<&str>,
    builtin: &str,
) -> Result<String, FetchError> {
    match path {
        Some(path) => reader.read_text(path).await,
        None => Ok(builtin.to_string()),
    }
}

impl Mesh {
    /// Fetch, parse and upload a textured mesh
    pub async fn load(
        gl: &mut impl GraphicsContext,
        reader: &impl AssetReader,
        geometry_path: &str,
        texture_path: &str,
    ) -> Result<Self, LoadError> {
        MeshAssets::fetch(reader, geometry_path, texture_path)
            .await?
            .upload(gl)
    }
}

impl ShaderProgram {
    /// Fetch and compile a shader pair
    pub async fn load(
        gl: &mut impl GraphicsContext,
        reader: &impl AssetReader,
        vertex_path: &str,
        fragment_path: &str,
    ) -> Result<Self, LoadError> {
        ShaderSources::fetch(reader, vertex_path, fragment_path)
            .await?
            .compile(gl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::HeadlessContext;
    use crate::io::MemoryAssetReader;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 1 1 0\nvt 0 0\nvn 0 0 1\nf 1/1/1 2/1/1 3/1/1\n";
    const PIXEL: &[u8] = b"P3\n1 1\n255\n255 255 255\n";

    fn assets() -> MemoryAssetReader {
        MemoryAssetReader::new()
            .with("tri.obj", TRIANGLE)
            .with("white.ppm", PIXEL)
            .with("basic_vertex.wgsl", BASIC_VERTEX)
            .with("basic_fragment.wgsl", BASIC_FRAGMENT)
    }

    #[test]
    fn test_mesh_load() {
        let mut gl = HeadlessContext::new();
        let mesh = pollster::block_on(Mesh::load(&mut gl, &assets(), "tri.obj", "white.ppm"))
            .unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(gl.live_buffers(), 3);
        assert_eq!(gl.live_textures(), 1);

        let texture = mesh.destroy(&mut gl);
        Rc::try_unwrap(texture).unwrap().destroy(&mut gl);
        assert_eq!(gl.live_buffers() + gl.live_textures(), 0);
    }

    #[test]
    fn test_missing_texture_rejects_whole_mesh() {
        let mut gl = HeadlessContext::new();
        let reader = MemoryAssetReader::new().with("tri.obj", TRIANGLE);
        let err = pollster::block_on(Mesh::load(&mut gl, &reader, "tri.obj", "missing.png"))
            .unwrap_err();

        assert!(matches!(
            err,
            LoadError::Fetch(FetchError::NotFound { ref path }) if path == "missing.png"
        ));
        assert_eq!(gl.live_buffers(), 0);
        assert_eq!(gl.live_textures(), 0);
    }

    #[test]
    fn test_missing_geometry_rejects_whole_mesh() {
        let reader = MemoryAssetReader::new().with("white.ppm", PIXEL);
        let err = pollster::block_on(MeshAssets::fetch(&reader, "tri.obj", "white.ppm"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Fetch(FetchError::NotFound { .. })));
    }

    #[test]
    fn test_malformed_geometry_is_not_uploaded() {
        let mut gl = HeadlessContext::new();
        let reader = assets().with("bad.obj", "v 0 0 0\nf 1 2 3\n");
        let err = pollster::block_on(Mesh::load(&mut gl, &reader, "bad.obj", "white.ppm"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Geometry(_)));
        assert_eq!(gl.live_textures(), 0);
    }

    #[test]
    fn test_failed_buffer_upload_releases_texture() {
        let mut gl = HeadlessContext::new();
        let assets = pollster::block_on(MeshAssets::fetch(&assets(), "tri.obj", "white.ppm"))
            .unwrap();
        // texture + two buffers fit, the third buffer does not
        gl.set_object_limit(Some(3));

        let err = assets.upload(&mut gl).unwrap_err();
        assert!(matches!(err, LoadError::Graphics(GraphicsError::Create { .. })));
        assert_eq!(gl.live_buffers(), 0);
        assert_eq!(gl.live_textures(), 0);
    }

    #[test]
    fn test_shader_load() {
        let mut gl = HeadlessContext::new();
        let shader = pollster::block_on(ShaderProgram::load(
            &mut gl,
            &assets(),
            "basic_vertex.wgsl",
            "basic_fragment.wgsl",
        ))
        .unwrap();
        assert!(shader.uniforms().diffuse.is_some());
        shader.destroy(&mut gl);
    }

    #[test]
    fn test_unset_stages_fall_back_to_builtin() {
        let reader = MemoryAssetReader::new().with("custom.wgsl", "// custom");
        let sources = pollster::block_on(ShaderSources::fetch_or_builtin(
            &reader,
            None,
            Some("custom.wgsl"),
        ))
        .unwrap();
        assert_eq!(sources.vertex, BASIC_VERTEX);
        assert_eq!(sources.fragment, "// custom");

        let builtin = pollster::block_on(ShaderSources::fetch_or_builtin(&reader, None, None));
        assert_eq!(builtin.unwrap(), ShaderSources::builtin());

        let missing = pollster::block_on(ShaderSources::fetch_or_builtin(
            &reader,
            Some("absent.wgsl"),
            None,
        ));
        assert!(matches!(missing, Err(LoadError::Fetch(FetchError::NotFound { .. }))));
    }

    #[test]
    fn test_shader_fetch_failure_compiles_nothing() {
        let mut gl = HeadlessContext::new();
        let reader = MemoryAssetReader::new().with("basic_vertex.wgsl", BASIC_VERTEX);
        let err = pollster::block_on(ShaderProgram::load(
            &mut gl,
            &reader,
            "basic_vertex.wgsl",
            "basic_fragment.wgsl",
        ))
        .unwrap_err();
        assert!(matches!(err, LoadError::Fetch(_)));
        assert_eq!(gl.live_shaders(), 0);
    }
}
