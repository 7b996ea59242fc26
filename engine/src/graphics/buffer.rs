//! Static vertex attribute buffers
//!
//! One buffer per attribute stream. Contents are uploaded once at creation
//! and never change.

use super::context::{AttributeLocation, BufferHandle, GraphicsContext, GraphicsError};
use tracing::{debug, trace, warn};

/// A GPU-resident float array feeding one vertex attribute
///
/// The buffer must be handed back with [`GpuBuffer::release`]; there is no
/// context to free it from in `Drop`, so dropping an unreleased buffer leaks
/// device memory and logs a warning. `release` consumes the buffer, which
/// makes binding a released buffer a compile error:
///
/// ```compile_fail
/// use engine::graphics::{GpuBuffer, GraphicsContext, HeadlessContext, AttributeLocation};
///
/// let mut gl = HeadlessContext::new();
/// let buffer = GpuBuffer::new(&mut gl, &[0.0; 9], 3).unwrap();
/// buffer.release(&mut gl);
/// buffer.bind_to_attribute(&mut gl, Some(AttributeLocation(0)));
/// ```
#[derive(Debug)]
pub struct GpuBuffer {
    handle: Option<BufferHandle>,
    size: u32,
    count: u32,
}

impl GpuBuffer {
    /// Allocate a buffer and upload `data` as `components` floats per vertex
    pub fn new(
        gl: &mut impl GraphicsContext,
        data: &[f32],
        components: u32,
    ) -> Result<Self, GraphicsError> {
        let misaligned = || GraphicsError::MisalignedData {
            len: data.len(),
            components: components as usize,
        };
        if components == 0 || data.len() % components as usize != 0 {
            return Err(misaligned());
        }
        let count = u32::try_from(data.len() / components as usize).map_err(|_| misaligned())?;

        let handle = gl.create_buffer()?;
        gl.bind_array_buffer(Some(handle));
        gl.buffer_data_static(bytemuck::cast_slice(data));

        debug!(%handle, components, count, "Uploaded vertex buffer");
        Ok(Self {
            handle: Some(handle),
            size: components,
            count,
        })
    }

    /// Floats per vertex
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of vertices
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    /// Make this buffer the data source of an attribute slot
    ///
    /// Binds the buffer, enables the slot and declares tightly packed,
    /// unnormalized floats. A missing slot (the shader never declared the
    /// attribute) makes this a no-op.
    pub fn bind_to_attribute(
        &self,
        gl: &mut impl GraphicsContext,
        attribute: Option<AttributeLocation>,
    ) {
        let (Some(handle), Some(location)) = (self.handle, attribute) else {
            return;
        };
        gl.bind_array_buffer(Some(handle));
        gl.enable_vertex_attrib_array(location);
        gl.vertex_attrib_pointer_f32(location, self.size, false, 0, 0);
    }

    /// Free the GPU allocation
    pub fn release(mut self, gl: &mut impl GraphicsContext) {
        if let Some(handle) = self.handle.take() {
            gl.delete_buffer(handle);
            trace!(%handle, "Released vertex buffer");
        }
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            warn!(%handle, count = self.count, "Vertex buffer dropped without release, GPU memory leaked");
        }
    }
}
