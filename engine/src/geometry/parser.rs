//! Line-oriented geometry text parser
//!
//! Each line is classified by its leading token into one of a fixed set of
//! directives and then parsed by a per-directive field parser:
//!
//! - `v x y z` appends a position
//! - `vn x y z` appends a normal
//! - `vt u v` appends a texture coordinate, stored as `(u, 1 - v)`
//! - `f g1 g2 g3 [g4]` emits one triangle, or two for a quad
//!
//! Face groups are `v`, `v/t`, `v//n` or `v/t/n`, with 1-based indices into
//! the lists accumulated so far. Negative indices count back from the end of
//! the list. Every other line is ignored.

use super::{Face, Vertex};
use glam::{Vec2, Vec3};
use std::fmt;
use tracing::{debug, trace};

/// Attribute list a face index points into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Position,
    TexCoord,
    Normal,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Attribute::Position => "position",
            Attribute::TexCoord => "texture coordinate",
            Attribute::Normal => "normal",
        })
    }
}

/// What was wrong with a malformed line
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedKind {
    #[error("`{directive}` expects at least {expected} fields, found {found}")]
    MissingField {
        directive: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("`{token}` is not a finite number")]
    InvalidNumber { token: String },

    #[error("`{token}` is not a valid face index group")]
    InvalidIndex { token: String },

    #[error("{attribute} index 0 is invalid, indices are 1-based")]
    ZeroIndex { attribute: Attribute },

    #[error("{attribute} index {index} is out of range ({available} defined)")]
    IndexOutOfRange {
        attribute: Attribute,
        index: i64,
        available: usize,
    },

    #[error("faces with {vertices} vertices are not supported")]
    UnsupportedPolygon { vertices: usize },
}

/// Geometry text that could not be turned into faces
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed geometry at line {line}: {kind}")]
pub struct MalformedGeometry {
    /// 1-based line number
    pub line: usize,
    pub kind: MalformedKind,
}

/// Parse geometry text into triangles
///
/// Quads are split into two triangles sharing their first vertex. Parsing
/// stops at the first malformed line and no faces are returned.
pub fn parse(text: &str) -> Result<Vec<Face>, MalformedGeometry> {
    let mut lists = AttributeLists::default();
    let mut faces = Vec::new();

    for (index, raw) in text.split('\n').enumerate() {
        let line = index + 1;
        let malformed = |kind| MalformedGeometry { line, kind };

        match classify(raw).map_err(malformed)? {
            Line::Position(position) => lists.positions.push(position),
            Line::Normal(normal) => lists.normals.push(normal),
            Line::TexCoord(uv) => lists.uvs.push(uv),
            Line::Face(groups) => {
                let vertices = groups
                    .iter()
                    .map(|group| lists.vertex(group))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(malformed)?;

                faces.push(Face::new(vertices[0], vertices[1], vertices[2]));
                if let Some(&fourth) = vertices.get(3) {
                    faces.push(Face::new(vertices[0], vertices[2], fourth));
                }
            }
            Line::Ignored => {}
        }
    }

    debug!(
        positions = lists.positions.len(),
        normals = lists.normals.len(),
        uvs = lists.uvs.len(),
        faces = faces.len(),
        "Parsed geometry"
    );
    Ok(faces)
}

enum Line {
    Position(Vec3),
    Normal(Vec3),
    TexCoord(Vec2),
    Face(Vec<IndexGroup>),
    Ignored,
}

/// One `v/t/n` reference as written in the source
#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexGroup {
    position: i64,
    uv: Option<i64>,
    normal: Option<i64>,
}

#[derive(Default)]
struct AttributeLists {
    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
}

impl AttributeLists {
    fn vertex(&self, group: &IndexGroup) -> Result<Vertex, MalformedKind> {
        let position = lookup(&self.positions, group.position, Attribute::Position)?;
        let uv = group
            .uv
            .map(|index| lookup(&self.uvs, index, Attribute::TexCoord))
            .transpose()?
            .unwrap_or_default();
        let normal = group
            .normal
            .map(|index| lookup(&self.normals, index, Attribute::Normal))
            .transpose()?
            .unwrap_or_default();
        Ok(Vertex::new(position, normal, uv))
    }
}

fn lookup<T: Copy>(list: &[T], index: i64, attribute: Attribute) -> Result<T, MalformedKind> {
    let out_of_range = || MalformedKind::IndexOutOfRange {
        attribute,
        index,
        available: list.len(),
    };

    let slot = match index {
        0 => return Err(MalformedKind::ZeroIndex { attribute }),
        i if i > 0 => usize::try_from(i - 1).map_err(|_| out_of_range())?,
        i => {
            let back = usize::try_from(i.unsigned_abs()).map_err(|_| out_of_range())?;
            list.len().checked_sub(back).ok_or_else(out_of_range)?
        }
    };

    list.get(slot).copied().ok_or_else(out_of_range)
}

fn classify(raw: &str) -> Result<Line, MalformedKind> {
    let line = raw.trim_end_matches('\r');
    let mut fields = line.split_whitespace();
    let Some(directive) = fields.next() else {
        return Ok(Line::Ignored);
    };
    let fields: Vec<&str> = fields.collect();

    match directive {
        "v" => Ok(Line::Position(parse_vec3("v", &fields)?)),
        "vn" => Ok(Line::Normal(parse_vec3("vn", &fields)?)),
        "vt" => {
            let [u, v] = parse_floats::<2>("vt", &fields)?;
            Ok(Line::TexCoord(Vec2::new(u, 1.0 - v)))
        }
        "f" => parse_face(&fields).map(Line::Face),
        other => {
            trace!(directive = other, "Ignoring geometry directive");
            Ok(Line::Ignored)
        }
    }
}

fn parse_vec3(directive: &'static str, fields: &[&str]) -> Result<Vec3, MalformedKind> {
    parse_floats::<3>(directive, fields).map(Vec3::from_array)
}

/// Parse the first `N` fields as floats, ignoring any extra trailing fields
fn parse_floats<const N: usize>(
    directive: &'static str,
    fields: &[&str],
) -> Result<[f32; N], MalformedKind> {
    if fields.len() < N {
        return Err(MalformedKind::MissingField {
            directive,
            expected: N,
            found: fields.len(),
        });
    }

    let mut values = [0.0; N];
    for (value, token) in values.iter_mut().zip(fields) {
        *value = parse_number(token)?;
    }
    Ok(values)
}

fn parse_number(token: &str) -> Result<f32, MalformedKind> {
    token
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| MalformedKind::InvalidNumber {
            token: token.to_string(),
        })
}

fn parse_face(fields: &[&str]) -> Result<Vec<IndexGroup>, MalformedKind> {
    match fields.len() {
        0..=2 => Err(MalformedKind::MissingField {
            directive: "f",
            expected: 3,
            found: fields.len(),
        }),
        3 | 4 => fields.iter().map(|token| parse_group(token)).collect(),
        vertices => Err(MalformedKind::UnsupportedPolygon { vertices }),
    }
}

fn parse_group(token: &str) -> Result<IndexGroup, MalformedKind> {
    let invalid = || MalformedKind::InvalidIndex {
        token: token.to_string(),
    };
    let index = |part: &str| part.parse::<i64>().map_err(|_| invalid());

    let parts: Vec<&str> = token.split('/').collect();
    let (position, uv, normal) = match parts[..] {
        [v] => (index(v)?, None, None),
        [v, t] => (index(v)?, Some(index(t)?), None),
        [v, "", n] => (index(v)?, None, Some(index(n)?)),
        [v, t, n] => (index(v)?, Some(index(t)?), Some(index(n)?)),
        _ => return Err(invalid()),
    };

    Ok(IndexGroup {
        position,
        uv,
        normal,
    })
}
