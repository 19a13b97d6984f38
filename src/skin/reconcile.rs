//! Building a skin mesh from host geometry.
//!
//! Host meshes index positions and UVs separately, so one geometric vertex
//! may carry several UVs. The file stores one UV per vertex, so every
//! distinct (material, vertex, uv) triple becomes its own record.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use cgmath::{Vector2, Vector3, Zero};
use serde::{Deserialize, Serialize};

use super::{SkinMaterial, SkinMesh, SkinVertex, MAX_MATERIALS, MAX_VERTICES};
use crate::error::{ErrorContext, Format, Result, Violation};
use crate::skeleton::{Skeleton, MAX_INFLUENCES};

/// Host-side polygon with its triangulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePolygon {
    /// Geometric vertex per corner.
    pub vertices: Vec<usize>,
    /// UV index per corner, `None` when the polygon is unmapped.
    pub uvs: Option<Vec<usize>>,
    pub material: Option<usize>,
    /// Triangles as corner positions within this polygon.
    pub triangles: Vec<[usize; 3]>,
}

/// Host-side skinned mesh, in host convention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMesh {
    pub positions: Vec<Vector3<f32>>,
    /// One normal per geometric vertex.
    pub normals: Vec<Vector3<f32>>,
    pub uvs: Vec<Vector2<f32>>,
    pub polygons: Vec<SourcePolygon>,
    pub materials: Vec<String>,
    /// Per geometric vertex, weights keyed by position in `bound_joints`.
    pub weights: Vec<Vec<(usize, f32)>>,
    pub bound_joints: Vec<String>,
    pub has_holes: bool,
}

/// Geometric vertex and UV index a file vertex was emitted for.
type CopyKey = (usize, usize);

impl SkinMesh {
    /// Converts a host mesh into a version 1 skin mesh bound to `skeleton`.
    ///
    /// On success the skeleton's version and influence table are updated to
    /// match the slots written into the mesh. On error the skeleton is left
    /// untouched.
    pub fn from_source(source: &SourceMesh, skeleton: &mut Skeleton) -> Result<SkinMesh> {
        let ctx = ErrorContext::encode(Format::SkinMesh);

        check_materials(ctx, source)?;
        if source.has_holes {
            return Err(ctx.violation(Violation::MeshHoles));
        }
        for (p, polygon) in source.polygons.iter().enumerate() {
            check_polygon(ctx, source, p, polygon)?;
        }

        let binding = InfluenceBinding::resolve(ctx, &source.bound_joints, skeleton)?;

        let mut vertices: Vec<SkinVertex> = Vec::new();
        let mut indices: Vec<u16> = Vec::new();
        let mut materials = Vec::with_capacity(source.materials.len());

        for (m, name) in source.materials.iter().enumerate() {
            let polygons: Vec<&SourcePolygon> = source
                .polygons
                .iter()
                .filter(|p| p.material == Some(m))
                .collect();
            if polygons.is_empty() {
                log::warn!("material `{}` is not assigned to any polygon", name);
            }

            // vertex -> uv indices used by this material
            let mut used: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
            for polygon in &polygons {
                for (corner, &vertex) in polygon.vertices.iter().enumerate() {
                    let uvs = used.entry(vertex).or_default();
                    if let Some(polygon_uvs) = &polygon.uvs {
                        uvs.insert(polygon_uvs[corner]);
                    }
                }
            }

            let start_vertex = vertices.len();
            let mut copies: HashMap<CopyKey, usize> = HashMap::new();
            let mut first_copy: HashMap<usize, usize> = HashMap::new();
            for (&vertex, uvs) in &used {
                if uvs.is_empty() {
                    return Err(ctx.violation(Violation::MissingUv { vertex }));
                }
                let (influences, weights) = binding.pack(ctx, vertex, &source.weights)?;
                for &uv in uvs {
                    let index = vertices.len();
                    copies.insert((vertex, uv), index);
                    first_copy.entry(vertex).or_insert(index);
                    let host_uv = source.uvs[uv];
                    vertices.push(SkinVertex {
                        position: source.positions[vertex],
                        influences,
                        weights,
                        normal: source
                            .normals
                            .get(vertex)
                            .copied()
                            .unwrap_or_else(Vector3::zero),
                        uv: Vector2::new(host_uv.x, 1.0 - host_uv.y),
                    });
                }
            }
            if vertices.len() > MAX_VERTICES {
                return Err(ctx.violation(Violation::TooManyVertices {
                    count: vertices.len(),
                }));
            }

            let start_index = indices.len();
            for polygon in &polygons {
                for triangle in &polygon.triangles {
                    for &corner in triangle {
                        let vertex = polygon.vertices[corner];
                        let index = match &polygon.uvs {
                            Some(uvs) => copies[&(vertex, uvs[corner])],
                            None => first_copy[&vertex],
                        };
                        indices.push(index as u16);
                    }
                }
            }

            materials.push(SkinMaterial {
                name: name.clone(),
                start_vertex: start_vertex as u32,
                vertex_count: (vertices.len() - start_vertex) as u32,
                start_index: start_index as u32,
                index_count: (indices.len() - start_index) as u32,
            });
        }

        log::debug!(
            "reconciled {} geometric vertices into {} file vertices",
            source.positions.len(),
            vertices.len()
        );

        binding.apply(skeleton);
        Ok(SkinMesh {
            version: 1,
            materials,
            indices,
            vertices,
            reserved: [0; 3],
            dropped_indices: 0,
        })
    }
}

fn check_materials(ctx: ErrorContext, source: &SourceMesh) -> Result<()> {
    if source.materials.len() > MAX_MATERIALS {
        return Err(ctx.violation(Violation::TooManyMaterials {
            count: source.materials.len(),
        }));
    }
    if source.materials.is_empty() {
        return Err(ctx.violation(Violation::NoMaterials));
    }
    for (face, polygon) in source.polygons.iter().enumerate() {
        match polygon.material {
            None => return Err(ctx.violation(Violation::UnassignedGeometry { polygon: face })),
            Some(material) if material >= source.materials.len() => {
                return Err(ctx.violation(Violation::MaterialOutOfRange {
                    face,
                    material,
                    count: source.materials.len(),
                }))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn check_polygon(
    ctx: ErrorContext,
    source: &SourceMesh,
    p: usize,
    polygon: &SourcePolygon,
) -> Result<()> {
    let corners = polygon.vertices.len();
    if polygon.triangles.is_empty()
        || polygon
            .triangles
            .iter()
            .flatten()
            .any(|&corner| corner >= corners)
    {
        return Err(ctx.violation(Violation::InvalidTriangulation { polygon: p }));
    }
    if let Some(&vertex) = polygon
        .vertices
        .iter()
        .find(|&&v| v >= source.positions.len())
    {
        return Err(ctx.violation(Violation::VertexOutOfRange {
            polygon: p,
            vertex,
            count: source.positions.len(),
        }));
    }
    if let Some(uvs) = &polygon.uvs {
        if uvs.len() != corners {
            return Err(ctx.violation(Violation::InvalidTriangulation { polygon: p }));
        }
        if let Some(&index) = uvs.iter().find(|&&uv| uv >= source.uvs.len()) {
            return Err(ctx.violation(Violation::TableIndexOutOfRange {
                table: "uv",
                index,
                len: source.uvs.len(),
            }));
        }
    }
    Ok(())
}

/// Slot assignment for the mesh's bound joints.
struct InfluenceBinding {
    /// Skeleton index of every bound joint.
    joints: Vec<u32>,
    /// Influence slot written for every bound joint.
    slots: Vec<u8>,
    explicit_table: bool,
}

impl InfluenceBinding {
    fn resolve(ctx: ErrorContext, bound: &[String], skeleton: &Skeleton) -> Result<Self> {
        if bound.len() > MAX_INFLUENCES {
            return Err(ctx.violation(Violation::TooManyBoundJoints {
                count: bound.len(),
                excess: bound.len() - MAX_INFLUENCES,
            }));
        }
        let joints = bound
            .iter()
            .map(|name| {
                skeleton
                    .find_bone(name)
                    .map(|i| i as u32)
                    .ok_or_else(|| ctx.violation(Violation::UnresolvedJoint(name.clone())))
            })
            .collect::<Result<Vec<u32>>>()?;

        let explicit_table = skeleton.bones.len() > MAX_INFLUENCES;
        let slots = if explicit_table {
            (0..joints.len() as u8).collect()
        } else {
            joints.iter().map(|&j| j as u8).collect()
        };
        Ok(Self {
            joints,
            slots,
            explicit_table,
        })
    }

    /// Normalized influence slots and weights for one geometric vertex.
    fn pack(
        &self,
        ctx: ErrorContext,
        vertex: usize,
        weights: &[Vec<(usize, f32)>],
    ) -> Result<([u8; 4], [f32; 4])> {
        let nonzero: Vec<(usize, f32)> = weights
            .get(vertex)
            .map(|w| w.iter().copied().filter(|&(_, w)| w != 0.0).collect())
            .unwrap_or_default();
        if nonzero.len() > 4 {
            return Err(ctx.violation(Violation::TooManyInfluences {
                vertex,
                count: nonzero.len(),
            }));
        }
        let sum: f32 = nonzero.iter().map(|(_, w)| w).sum();
        if sum == 0.0 {
            return Err(ctx.violation(Violation::ZeroWeightSum { vertex }));
        }

        let mut influences = [0u8; 4];
        let mut packed = [0f32; 4];
        for (k, &(joint, weight)) in nonzero.iter().enumerate() {
            influences[k] = *self.slots.get(joint).ok_or_else(|| {
                ctx.violation(Violation::TableIndexOutOfRange {
                    table: "bound joint",
                    index: joint,
                    len: self.slots.len(),
                })
            })?;
            packed[k] = weight / sum;
        }
        Ok((influences, packed))
    }

    fn apply(self, skeleton: &mut Skeleton) {
        if self.explicit_table {
            skeleton.version = 2;
            skeleton.influence_table = Some(self.joints);
        } else {
            skeleton.version = 1;
            skeleton.influence_table = None;
        }
    }
}
