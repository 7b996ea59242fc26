//! Renderable mesh resource
//!
//! A mesh owns one static buffer per attribute stream and shares its texture
//! with other meshes. Drawing rebinds every attribute, the texture and the
//! model matrix, so it never depends on bindings left behind by a previous
//! draw.

use super::buffer::GpuBuffer;
use super::context::{GraphicsContext, GraphicsError};
use super::shader::ShaderProgram;
use super::texture::Texture;
use crate::core::Transform;
use crate::geometry::Geometry;
use std::rc::Rc;
use tracing::{debug, info};

/// Texture unit meshes sample their diffuse texture from
pub const DIFFUSE_UNIT: u32 = 0;

/// Geometry uploaded to the GPU, plus its texture and model transform
#[derive(Debug)]
pub struct Mesh {
    positions: GpuBuffer,
    normals: GpuBuffer,
    uvs: GpuBuffer,
    texture: Rc<Texture>,
    /// Model transform uploaded on every draw
    pub transform: Transform,
    vertex_count: u32,
}

impl Mesh {
    /// Upload `geometry` into three attribute buffers
    ///
    /// If any buffer fails to allocate, the ones already created are
    /// released before the error is returned.
    pub fn new(
        gl: &mut impl GraphicsContext,
        geometry: &Geometry,
        texture: Rc<Texture>,
    ) -> Result<Self, GraphicsError> {
        let positions = GpuBuffer::new(gl, &geometry.positions(), 3)?;
        let normals = match GpuBuffer::new(gl, &geometry.normals(), 3) {
            Ok(buffer) => buffer,
            Err(err) => {
                positions.release(gl);
                return Err(err);
            }
        };
        let uvs = match GpuBuffer::new(gl, &geometry.uvs(), 2) {
            Ok(buffer) => buffer,
            Err(err) => {
                positions.release(gl);
                normals.release(gl);
                return Err(err);
            }
        };

        let vertex_count = positions.count();
        info!(
            faces = geometry.face_count(),
            vertices = vertex_count,
            "Uploaded mesh to GPU"
        );

        Ok(Self {
            positions,
            normals,
            uvs,
            texture,
            transform: Transform::default(),
            vertex_count,
        })
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn texture(&self) -> &Rc<Texture> {
        &self.texture
    }

    /// Bind this mesh's state to `shader` and issue one triangle-list draw
    ///
    /// `shader` must be the active program. Only the streams the program
    /// reads are bound; arrays left enabled for other programs are not read.
    pub fn draw(&self, gl: &mut impl GraphicsContext, shader: &ShaderProgram) {
        let attributes = shader.attributes();
        self.positions.bind_to_attribute(gl, attributes.position);
        self.normals.bind_to_attribute(gl, attributes.normal);
        self.uvs.bind_to_attribute(gl, attributes.uv);

        let uniforms = shader.uniforms();
        self.transform.upload(gl, uniforms.model.as_ref());
        self.texture.bind(gl, uniforms.diffuse.as_ref(), DIFFUSE_UNIT);

        gl.draw_arrays_triangles(0, self.vertex_count);
    }

    /// Release the three buffers
    ///
    /// The texture is not owned here; the shared reference is handed back so
    /// the caller can destroy it once no other mesh uses it.
    pub fn destroy(self, gl: &mut impl GraphicsContext) -> Rc<Texture> {
        let Mesh {
            positions,
            normals,
            uvs,
            texture,
            ..
        } = self;
        positions.release(gl);
        normals.release(gl);
        uvs.release(gl);
        debug!("Destroyed mesh");
        texture
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::headless::{HeadlessContext, UniformValue};
    use crate::shaders::{BASIC_FRAGMENT, BASIC_VERTEX};
    use glam::Vec3;

    const QUAD: &str = "
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    fn texture(gl: &mut HeadlessContext) -> Rc<Texture> {
        Rc::new(Texture::from_rgba(gl, 1, 1, &[255; 4]).unwrap())
    }

    fn teardown(gl: &mut HeadlessContext, mesh: Mesh) {
        let texture = mesh.destroy(gl);
        Rc::try_unwrap(texture).unwrap().destroy(gl);
    }

    #[test]
    fn test_new_uploads_three_streams() {
        let mut gl = HeadlessContext::new();
        let geometry = Geometry::parse(QUAD).unwrap();
        let texture = texture(&mut gl);
        let mesh = Mesh::new(&mut gl, &geometry, texture).unwrap();

        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(gl.live_buffers(), 3);
        assert_eq!(mesh.positions.count(), mesh.normals.count());
        assert_eq!(mesh.positions.count(), mesh.uvs.count());
        assert_eq!(mesh.uvs.size(), 2);
        teardown(&mut gl, mesh);
    }

    #[test]
    fn test_partial_upload_is_rolled_back() {
        let mut gl = HeadlessContext::new();
        let geometry = Geometry::parse(QUAD).unwrap();
        let texture = texture(&mut gl);
        // texture + positions fit, normals do not
        gl.set_object_limit(Some(2));

        let err = Mesh::new(&mut gl, &geometry, Rc::clone(&texture)).unwrap_err();
        assert!(matches!(err, GraphicsError::Create { object: "buffer", .. }));
        assert_eq!(gl.live_buffers(), 0);
        Rc::try_unwrap(texture).unwrap().destroy(&mut gl);
    }

    #[test]
    fn test_draw_binds_everything_it_uses() {
        let mut gl = HeadlessContext::new();
        let shader = ShaderProgram::compile(&mut gl, BASIC_VERTEX, BASIC_FRAGMENT).unwrap();
        let geometry = Geometry::parse(QUAD).unwrap();
        let texture = texture(&mut gl);
        let mut mesh = Mesh::new(&mut gl, &geometry, texture).unwrap();
        mesh.transform = Transform::from_position(Vec3::new(0.0, 2.0, 0.0));

        // Stale bindings from unrelated work must not matter
        gl.bind_array_buffer(None);
        gl.active_texture(5);

        shader.activate(&mut gl);
        mesh.draw(&mut gl, &shader);
        assert!(gl.errors().is_empty(), "{:?}", gl.errors());

        let draw = gl.draw_calls().next().unwrap();
        assert_eq!(draw.count, 6);
        assert_eq!(draw.attributes.len(), 3);
        assert_eq!(draw.attributes[2].components, 2);
        assert_eq!(draw.texture, mesh.texture().handle());

        assert_eq!(
            gl.uniform_value(shader.program(), "model"),
            Some(UniformValue::Mat4(mesh.transform.to_matrix().to_cols_array()))
        );
        assert_eq!(
            gl.uniform_value(shader.program(), "diffuse"),
            Some(UniformValue::Int(DIFFUSE_UNIT as i32))
        );

        teardown(&mut gl, mesh);
        shader.destroy(&mut gl);
    }

    #[test]
    fn test_destroy_leaves_shared_texture_alive() {
        let mut gl = HeadlessContext::new();
        let geometry = Geometry::parse(QUAD).unwrap();
        let texture = texture(&mut gl);
        let first = Mesh::new(&mut gl, &geometry, Rc::clone(&texture)).unwrap();
        let second = Mesh::new(&mut gl, &geometry, Rc::clone(&texture)).unwrap();
        drop(texture);

        let shared = first.destroy(&mut gl);
        assert_eq!(gl.live_buffers(), 3);
        assert_eq!(gl.live_textures(), 1);
        assert!(Rc::try_unwrap(shared).is_err());

        teardown(&mut gl, second);
        assert_eq!(gl.live_textures(), 0);
    }
}
