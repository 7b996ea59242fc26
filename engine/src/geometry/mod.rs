//! Mesh geometry in non-indexed, triangulated form
//!
//! Geometry is produced by the text parser and flattened into per-attribute
//! float streams for upload. Vertices are duplicated per face, so the three
//! flattened streams always describe the same vertex sequence.

mod parser;

pub use parser::{parse, Attribute, MalformedGeometry, MalformedKind};

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// A single mesh vertex
///
/// Components that are absent from the source data stay at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Position in model space
    pub position: Vec3,
    /// Surface normal (not renormalized on load)
    pub normal: Vec3,
    /// Texture coordinates, V already flipped into texture space
    pub uv: Vec2,
}

impl Vertex {
    /// Create a new vertex with the given attributes
    pub const fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// A triangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub vertices: [Vertex; 3],
}

impl Face {
    pub const fn new(a: Vertex, b: Vertex, c: Vertex) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }
}

/// An ordered list of triangles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    faces: Vec<Face>,
}

impl Geometry {
    /// Wrap an already triangulated face list
    pub fn new(faces: Vec<Face>) -> Self {
        Self { faces }
    }

    /// Parse geometry text into a face list
    pub fn parse(text: &str) -> Result<Self, MalformedGeometry> {
        parse(text).map(Self::new)
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of vertices submitted by a non-indexed draw
    pub fn vertex_count(&self) -> usize {
        self.faces.len() * 3
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Flattened positions, three floats per vertex in face-then-vertex order
    pub fn positions(&self) -> Vec<f32> {
        self.flatten(3, |vertex, out| {
            out.extend_from_slice(&vertex.position.to_array())
        })
    }

    /// Flattened normals, three floats per vertex in face-then-vertex order
    pub fn normals(&self) -> Vec<f32> {
        self.flatten(3, |vertex, out| {
            out.extend_from_slice(&vertex.normal.to_array())
        })
    }

    /// Flattened texture coordinates, two floats per vertex in face-then-vertex order
    pub fn uvs(&self) -> Vec<f32> {
        self.flatten(2, |vertex, out| out.extend_from_slice(&vertex.uv.to_array()))
    }

    /// Axis-aligned bounds of all positions, `None` for empty geometry
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let mut vertices = self.vertices();
        let first = vertices.next()?.position;
        Some(vertices.fold((first, first), |(min, max), vertex| {
            (min.min(vertex.position), max.max(vertex.position))
        }))
    }

    fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.faces.iter().flat_map(|face| face.vertices.iter())
    }

    fn flatten(&self, components: usize, push: impl Fn(&Vertex, &mut Vec<f32>)) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.vertex_count() * components);
        for vertex in self.vertices() {
            push(vertex, &mut out);
        }
        out
    }
}

impl From<Vec<Face>> for Geometry {
    fn from(faces: Vec<Face>) -> Self {
        Self::new(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(offset: f32) -> Face {
        Face::new(
            Vertex::new(Vec3::new(offset, 0.0, 0.0), Vec3::Z, Vec2::new(0.0, 1.0)),
            Vertex::new(Vec3::new(offset + 1.0, 0.0, 0.0), Vec3::Z, Vec2::new(1.0, 1.0)),
            Vertex::new(Vec3::new(offset + 1.0, 1.0, 0.0), Vec3::Z, Vec2::new(1.0, 0.0)),
        )
    }

    #[test]
    fn test_flattened_lengths_match_vertex_count() {
        let geometry = Geometry::new(vec![triangle(0.0), triangle(5.0)]);
        assert_eq!(geometry.vertex_count(), 6);
        assert_eq!(geometry.positions().len(), 18);
        assert_eq!(geometry.normals().len(), 18);
        assert_eq!(geometry.uvs().len(), 12);
    }

    #[test]
    fn test_flatten_preserves_face_order() {
        let geometry = Geometry::new(vec![triangle(0.0), triangle(5.0)]);
        let positions = geometry.positions();
        assert_eq!(&positions[..3], &[0.0, 0.0, 0.0]);
        assert_eq!(&positions[9..12], &[5.0, 0.0, 0.0]);
        assert_eq!(&geometry.uvs()[..4], &[0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_empty_geometry() {
        let geometry = Geometry::default();
        assert!(geometry.is_empty());
        assert_eq!(geometry.vertex_count(), 0);
        assert!(geometry.positions().is_empty());
        assert_eq!(geometry.bounds(), None);
    }

    #[test]
    fn test_bounds() {
        let geometry = Geometry::new(vec![triangle(-2.0), triangle(5.0)]);
        let (min, max) = geometry.bounds().unwrap();
        assert_eq!(min, Vec3::new(-2.0, 0.0, 0.0));
        assert_eq!(max, Vec3::new(6.0, 1.0, 0.0));
    }

    #[test]
    fn test_vertex_defaults_to_zero() {
        let vertex = Vertex::default();
        assert_eq!(vertex.position, Vec3::ZERO);
        assert_eq!(vertex.normal, Vec3::ZERO);
        assert_eq!(vertex.uv, Vec2::ZERO);
    }
}
