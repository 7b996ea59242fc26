//! 2D textures
//!
//! Image decoding is delegated to the `image` crate; this module only turns
//! RGBA8 pixels into a texture object and binds it to a sampler uniform.

use super::context::{GraphicsContext, GraphicsError, TextureHandle, UniformLocation};
use tracing::{debug, warn};

/// Errors that can occur while turning image bytes into a texture
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error(transparent)]
    Graphics(#[from] GraphicsError),
}

/// Decoded, tightly packed RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    /// Decode any supported image format (PNG, JPEG, PNM)
    pub fn decode(bytes: &[u8]) -> Result<Self, TextureError> {
        let image = image::load_from_memory(bytes)?.into_rgba8();
        let (width, height) = image.dimensions();
        debug!(width, height, "Decoded texture image");
        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }
}

/// A texture object owned by whoever uploaded it
///
/// Meshes only hold shared references; the owner releases the texture with
/// [`Texture::destroy`] once no mesh uses it.
#[derive(Debug)]
pub struct Texture {
    handle: Option<TextureHandle>,
    width: u32,
    height: u32,
}

impl Texture {
    /// Upload RGBA8 pixels into a new texture
    pub fn from_rgba(
        gl: &mut impl GraphicsContext,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<Self, GraphicsError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(GraphicsError::TextureSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        let handle = gl.create_texture()?;
        gl.active_texture(0);
        gl.bind_texture_2d(Some(handle));
        gl.tex_image_2d_rgba(width, height, pixels);

        debug!(%handle, width, height, "Uploaded texture");
        Ok(Self {
            handle: Some(handle),
            width,
            height,
        })
    }

    pub fn from_image(
        gl: &mut impl GraphicsContext,
        image: &RgbaImage,
    ) -> Result<Self, GraphicsError> {
        Self::from_rgba(gl, image.width, image.height, &image.pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn handle(&self) -> Option<TextureHandle> {
        self.handle
    }

    /// Bind to `unit` and point the sampler uniform at that unit
    pub fn bind(
        &self,
        gl: &mut impl GraphicsContext,
        sampler: Option<&UniformLocation>,
        unit: u32,
    ) {
        gl.active_texture(unit);
        gl.bind_texture_2d(self.handle);
        gl.uniform_1_i32(sampler, unit as i32);
    }

    pub fn destroy(mut self, gl: &mut impl GraphicsContext) {
        if let Some(handle) = self.handle.take() {
            gl.delete_texture(handle);
            debug!(%handle, "Destroyed texture");
        }
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        if let Some(handle) = self.handle {
            warn!(%handle, "Texture dropped without destroy, GPU memory leaked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::HeadlessContext;

    #[test]
    fn test_decode_ascii_pnm() {
        let ppm = b"P3\n2 1\n255\n255 0 0  0 0 255\n";
        let image = RgbaImage::decode(ppm).unwrap();
        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.pixels, vec![255, 0, 0, 255, 0, 0, 255, 255]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            RgbaImage::decode(b"not an image"),
            Err(TextureError::Decode(_))
        ));
    }

    #[test]
    fn test_upload_and_destroy() {
        let mut gl = HeadlessContext::new();
        let texture = Texture::from_rgba(&mut gl, 1, 1, &[1, 2, 3, 4]).unwrap();
        let handle = texture.handle().unwrap();
        assert_eq!(gl.texture_pixels(handle), Some(&[1u8, 2, 3, 4][..]));

        texture.destroy(&mut gl);
        assert_eq!(gl.live_textures(), 0);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let mut gl = HeadlessContext::new();
        let err = Texture::from_rgba(&mut gl, 2, 2, &[0; 4]).unwrap_err();
        assert!(matches!(err, GraphicsError::TextureSize { expected: 16, .. }));
        assert_eq!(gl.live_textures(), 0);
    }

    #[test]
    fn test_bind_selects_unit() {
        let mut gl = HeadlessContext::new();
        let texture = Texture::from_rgba(&mut gl, 1, 1, &[0; 4]).unwrap();
        texture.bind(&mut gl, None, 3);
        assert_eq!(gl.active_texture_unit(), 3);
        assert_eq!(gl.bound_texture(3), texture.handle());
        texture.destroy(&mut gl);
    }
}
