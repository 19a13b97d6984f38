//! Unskinned meshes, stored either as `.scb` (binary) or `.sco` (text).
//!
//! Both layouts describe triangles that each name their material and carry
//! one UV per corner. Decoders drop faces that do not form a triangle over
//! the vertex array and intern material names in first-seen order.

pub mod binary;
pub mod text;

use cgmath::{Vector2, Vector3};
use serde::Serialize;

use crate::math::handedness::{flip_position, SwitchHand};
use crate::primitives::valid_triangle;

pub use binary::{SCB_VERSION, SCB_VERSION_BOUNDS};

/// Axis-aligned box stored as its minimum corner and extent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: Vector3<f32>,
    pub size: Vector3<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticFace {
    pub indices: [u32; 3],
    /// Index into [`StaticMesh::materials`].
    pub material: usize,
    /// Per-corner UVs in file convention.
    pub uvs: [Vector2<f32>; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticMesh {
    /// Binary layout version. Text files decode as [`SCB_VERSION_BOUNDS`].
    pub version: u32,
    pub name: String,
    /// Central point of text files, zero for binary files.
    pub origin: Vector3<f32>,
    pub pivot: Option<Vector3<f32>>,
    pub bounds: Option<Bounds>,
    pub vertices: Vec<Vector3<f32>>,
    pub faces: Vec<StaticFace>,
    pub materials: Vec<String>,
    /// RGB per face corner, binary only.
    pub colors: Option<Vec<[u8; 3]>>,
    /// Faces removed on decode.
    pub dropped_faces: usize,
}

impl StaticMesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: SCB_VERSION_BOUNDS,
            name: name.into(),
            origin: Vector3::new(0.0, 0.0, 0.0),
            pivot: None,
            bounds: None,
            vertices: Vec::new(),
            faces: Vec::new(),
            materials: Vec::new(),
            colors: None,
            dropped_faces: 0,
        }
    }

    /// Bounding box of the vertices, `None` for an empty mesh.
    pub fn compute_bounds(&self) -> Option<Bounds> {
        let first = *self.vertices.first()?;
        let (min, max) = self.vertices.iter().fold((first, first), |(min, max), v| {
            (
                Vector3::new(min.x.min(v.x), min.y.min(v.y), min.z.min(v.z)),
                Vector3::new(max.x.max(v.x), max.y.max(v.y), max.z.max(v.z)),
            )
        });
        Some(Bounds {
            min,
            size: max - min,
        })
    }

    pub fn material_of(&self, face: &StaticFace) -> Option<&str> {
        self.materials.get(face.material).map(String::as_str)
    }
}

/// A face as read from a file, before filtering.
#[derive(Debug, Clone)]
pub(crate) struct RawFace {
    pub indices: [i64; 3],
    pub material: String,
    pub uvs: [Vector2<f32>; 3],
    pub colors: Option<[[u8; 3]; 3]>,
}

/// Faces kept after filtering, with interned materials.
#[derive(Debug, Default)]
pub(crate) struct FaceSet {
    pub faces: Vec<StaticFace>,
    pub materials: Vec<String>,
    pub colors: Vec<[u8; 3]>,
    pub dropped: usize,
}

/// Drops faces that are not triangles over `vertex_count` vertices and
/// interns the material names of the rest.
pub(crate) fn collect_faces(raw: Vec<RawFace>, vertex_count: usize) -> FaceSet {
    let mut set = FaceSet::default();
    for (i, face) in raw.into_iter().enumerate() {
        if !valid_triangle(face.indices, vertex_count) {
            log::warn!("removing badly built triangle {} {:?}", i, face.indices);
            set.dropped += 1;
            continue;
        }
        let material = match set.materials.iter().position(|m| *m == face.material) {
            Some(m) => m,
            None => {
                log::info!("found new material `{}`", face.material);
                set.materials.push(face.material);
                set.materials.len() - 1
            }
        };
        if let Some(colors) = face.colors {
            set.colors.extend_from_slice(&colors);
        }
        set.faces.push(StaticFace {
            indices: face.indices.map(|i| i as u32),
            material,
            uvs: face.uvs,
        });
    }
    set
}

impl SwitchHand for Bounds {
    fn switch_hand(&mut self) {
        self.min.x = -self.min.x;
        self.size.x = -self.size.x;
    }
}

impl SwitchHand for StaticMesh {
    fn switch_hand(&mut self) {
        for v in &mut self.vertices {
            *v = flip_position(*v);
        }
        self.origin = flip_position(self.origin);
        if let Some(pivot) = &mut self.pivot {
            *pivot = flip_position(*pivot);
        }
        if let Some(bounds) = &mut self.bounds {
            bounds.switch_hand();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A unit quad split into two triangles over two materials.
    pub(crate) fn quad() -> StaticMesh {
        let mut mesh = StaticMesh::new("crate_lid");
        mesh.vertices = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.5),
            Vector3::new(1.0, 1.0, 0.5),
        ];
        mesh.materials = vec!["wood".to_string(), "metal".to_string()];
        mesh.faces = vec![
            StaticFace {
                indices: [0, 1, 2],
                material: 0,
                uvs: [
                    Vector2::new(0.0, 0.0),
                    Vector2::new(1.0, 0.0),
                    Vector2::new(0.0, 1.0),
                ],
            },
            StaticFace {
                indices: [2, 1, 3],
                material: 1,
                uvs: [
                    Vector2::new(0.0, 1.0),
                    Vector2::new(1.0, 0.0),
                    Vector2::new(1.0, 1.0),
                ],
            },
        ];
        mesh.bounds = mesh.compute_bounds();
        mesh
    }

    #[test]
    fn test_compute_bounds() {
        let bounds = quad().compute_bounds().unwrap();
        assert_eq!(bounds.min, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(bounds.size, Vector3::new(1.0, 1.0, 0.5));
        assert!(StaticMesh::new("empty").compute_bounds().is_none());
    }

    #[test]
    fn test_collect_faces_drops_and_interns() {
        let uvs = [Vector2::new(0.0, 0.0); 3];
        let raw = vec![
            RawFace {
                indices: [0, 1, 1],
                material: "a".into(),
                uvs,
                colors: None,
            },
            RawFace {
                indices: [0, 1, 2],
                material: "b".into(),
                uvs,
                colors: None,
            },
            RawFace {
                indices: [2, 1, 0],
                material: "b".into(),
                uvs,
                colors: None,
            },
        ];
        let set = collect_faces(raw, 3);
        assert_eq!(set.dropped, 1);
        assert_eq!(set.materials, vec!["b".to_string()]);
        assert_eq!(set.faces.len(), 2);
        assert_eq!(set.faces[0].indices, [0, 1, 2]);
        assert_eq!(set.faces[1].material, 0);
    }

    #[test]
    fn test_switch_hand_flips_bounds_x() {
        let mesh = quad();
        let flipped = mesh.switched();
        let bounds = flipped.bounds.unwrap();
        assert_eq!(bounds.min.x, -0.0);
        assert_eq!(bounds.size.x, -1.0);
        assert_eq!(flipped.vertices[1].x, -1.0);
        assert_eq!(flipped.switched(), mesh);
    }
}
