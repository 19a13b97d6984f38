//! Skinned meshes (`.skn`).
//!
//! ```text
//! 0x00  u32 magic 0x00112233, u16 version, u16 object count (always 1)
//! v1+:  i32 material count, materials of 0x50 bytes
//!         name[64], i32 start vertex, i32 vertex count, i32 start index, i32 index count
//!       i32 index count, i32 vertex count
//!       u16 indices
//!       vertices of 0x34 bytes
//!         3 x f32 position, u8[4] influence slots, f32[4] weights, 3 x f32 normal, 2 x f32 uv
//! v2:   3 x u32 reserved
//! ```
//!
//! Decoded meshes are in host convention for positions and normals. UVs
//! keep the file convention; the scene adapter flips V.

pub mod binding;
pub mod reconcile;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use anyhow::Context;
use binrw::binrw;
use cgmath::{Vector2, Vector3};
use serde::Serialize;

use crate::error::{ErrorContext, Format, Result, Violation};
use crate::math::handedness::{flip_normal, flip_position, SwitchHand};
use crate::math::{RVector2, RVector3};
use crate::primitives::{
    fixed_name, parse_fixed_name, read_le, read_vec_le, valid_triangle, write_le, MinLength,
};

pub use binding::JointWeights;
pub use reconcile::{SourceMesh, SourcePolygon};

pub const SKN_MAGIC: u32 = 0x0011_2233;
pub const MATERIAL_NAME_LEN: usize = 64;
pub const MATERIAL_RECORD_LEN: u64 = 0x50;
pub const VERTEX_RECORD_LEN: u64 = 0x34;
/// Materials a version 1 or 2 mesh may carry.
pub const MAX_MATERIALS: usize = 2;
/// Vertices addressable by 16-bit indices.
pub const MAX_VERTICES: usize = 1 << 16;

const MIN_FILE_LEN: u64 = 8;

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct SknHeader {
    pub magic: u32,
    pub version: u16,
    pub object_count: u16,
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct SknMaterialRecord {
    #[br(map = |raw: [u8; MATERIAL_NAME_LEN]| parse_fixed_name(&raw))]
    #[bw(map = |name: &String| fixed_name::<MATERIAL_NAME_LEN>(name))]
    pub name: String,
    pub start_vertex: i32,
    pub vertex_count: i32,
    pub start_index: i32,
    pub index_count: i32,
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct SknVertexRecord {
    pub position: RVector3,
    pub influences: [u8; 4],
    pub weights: [f32; 4],
    pub normal: RVector3,
    pub uv: RVector2,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkinVertex {
    pub position: Vector3<f32>,
    /// Influence slots, resolved through the skeleton's influence table.
    pub influences: [u8; 4],
    pub weights: [f32; 4],
    pub normal: Vector3<f32>,
    pub uv: Vector2<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkinMaterial {
    pub name: String,
    pub start_vertex: u32,
    pub vertex_count: u32,
    pub start_index: u32,
    pub index_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkinMesh {
    pub version: u16,
    pub materials: Vec<SkinMaterial>,
    pub indices: Vec<u16>,
    pub vertices: Vec<SkinVertex>,
    /// Trailing block of version 2 files.
    pub reserved: [u32; 3],
    /// Indices removed with degenerate or out-of-range triangles on decode.
    pub dropped_indices: usize,
}

impl From<SknVertexRecord> for SkinVertex {
    fn from(record: SknVertexRecord) -> Self {
        SkinVertex {
            position: record.position.0,
            influences: record.influences,
            weights: record.weights,
            normal: record.normal.0,
            uv: record.uv.0,
        }
    }
}

impl From<&SkinVertex> for SknVertexRecord {
    fn from(vertex: &SkinVertex) -> Self {
        SknVertexRecord {
            position: RVector3(vertex.position),
            influences: vertex.influences,
            weights: vertex.weights,
            normal: RVector3(vertex.normal),
            uv: RVector2(vertex.uv),
        }
    }
}

impl SkinMesh {
    pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let ctx = ErrorContext::decode(Format::SkinMesh);
        let mut min = MinLength::start(reader, ctx, MIN_FILE_LEN)?;

        let header: SknHeader = read_le(reader, ctx)?;
        if header.magic != SKN_MAGIC {
            return Err(ctx.malformed(format!("bad magic {:#010x}", header.magic)));
        }
        if header.version > 2 {
            return Err(ctx.unsupported(header.version as u32));
        }
        if header.object_count != 1 {
            return Err(ctx.malformed(format!(
                "expected exactly 1 object, found {}",
                header.object_count
            )));
        }

        let mut material_records: Vec<SknMaterialRecord> = Vec::new();
        if header.version >= 1 {
            min.add("material count", 1, 4)?;
            let count: i32 = read_le(reader, ctx)?;
            let count = non_negative(ctx, count, "material count")?;
            min.add("materials", count as u64, MATERIAL_RECORD_LEN)?;
            material_records = read_vec_le(reader, ctx, count)?;
        }

        min.add("index and vertex counts", 1, 8)?;
        let index_count: i32 = read_le(reader, ctx)?;
        let vertex_count: i32 = read_le(reader, ctx)?;
        let index_count = non_negative(ctx, index_count, "index count")?;
        let vertex_count = non_negative(ctx, vertex_count, "vertex count")?;
        if index_count % 3 != 0 {
            return Err(ctx.malformed(format!(
                "index count {} is not a multiple of 3",
                index_count
            )));
        }

        min.add("indices", index_count as u64, 2)?;
        min.add("vertices", vertex_count as u64, VERTEX_RECORD_LEN)?;
        if header.version == 2 {
            min.add("reserved block", 1, 12)?;
        }

        let raw_indices: Vec<u16> = read_vec_le(reader, ctx, index_count)?;
        let (indices, kept) = filter_triangles(&raw_indices, vertex_count);
        let dropped_indices = raw_indices.len() - indices.len();

        let records: Vec<SknVertexRecord> = read_vec_le(reader, ctx, vertex_count)?;
        let vertices: Vec<SkinVertex> = records.into_iter().map(SkinVertex::from).collect();

        let reserved = if header.version == 2 {
            read_le::<[u32; 3], _>(reader, ctx)?
        } else {
            [0; 3]
        };

        let materials = shift_material_ranges(ctx, &material_records, &kept, vertex_count)?;

        let mut mesh = SkinMesh {
            version: header.version,
            materials,
            indices,
            vertices,
            reserved,
            dropped_indices,
        };
        mesh.switch_hand();

        log::debug!(
            "read skin mesh v{}: {} vertices, {} indices, {} materials",
            mesh.version,
            mesh.vertices.len(),
            mesh.indices.len(),
            mesh.materials.len()
        );
        Ok(mesh)
    }

    pub fn encode<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let ctx = ErrorContext::encode(Format::SkinMesh);
        self.validate(ctx)?;
        let file = self.switched();

        write_le(
            &SknHeader {
                magic: SKN_MAGIC,
                version: file.version,
                object_count: 1,
            },
            writer,
            ctx,
        )?;

        if file.version >= 1 {
            write_le(&(file.materials.len() as i32), writer, ctx)?;
            for material in &file.materials {
                let record = SknMaterialRecord {
                    name: material.name.clone(),
                    start_vertex: material.start_vertex as i32,
                    vertex_count: material.vertex_count as i32,
                    start_index: material.start_index as i32,
                    index_count: material.index_count as i32,
                };
                write_le(&record, writer, ctx)?;
            }
        } else if !file.materials.is_empty() {
            log::warn!("version 0 skin meshes carry no materials, dropping {}", file.materials.len());
        }

        write_le(&(file.indices.len() as i32), writer, ctx)?;
        write_le(&(file.vertices.len() as i32), writer, ctx)?;
        for index in &file.indices {
            write_le(index, writer, ctx)?;
        }
        for vertex in &file.vertices {
            write_le(&SknVertexRecord::from(vertex), writer, ctx)?;
        }
        if file.version == 2 {
            write_le(&file.reserved, writer, ctx)?;
        }
        Ok(())
    }

    /// Structural checks run before writing.
    pub fn validate(&self, ctx: ErrorContext) -> Result<()> {
        if self.version > 2 {
            return Err(ctx.unsupported(self.version as u32));
        }
        if self.indices.len() % 3 != 0 {
            return Err(ctx.violation(Violation::IndexCountNotTriangles {
                count: self.indices.len(),
            }));
        }
        if self.vertices.len() > MAX_VERTICES {
            return Err(ctx.violation(Violation::TooManyVertices {
                count: self.vertices.len(),
            }));
        }
        if self.version >= 1 {
            if self.materials.is_empty() {
                return Err(ctx.violation(Violation::NoMaterials));
            }
            if self.materials.len() > MAX_MATERIALS {
                return Err(ctx.violation(Violation::TooManyMaterials {
                    count: self.materials.len(),
                }));
            }
        }
        for (i, material) in self.materials.iter().enumerate() {
            let vertex_end = material.start_vertex as u64 + material.vertex_count as u64;
            let index_end = material.start_index as u64 + material.index_count as u64;
            if vertex_end > self.vertices.len() as u64 || index_end > self.indices.len() as u64 {
                return Err(ctx.violation(Violation::MaterialRangeOutOfBounds { material: i }));
            }
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open skin mesh '{}'", path.display()))?;
        Ok(Self::decode(&mut BufReader::new(file))?)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create skin mesh '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.encode(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// True when triangles share vertices, i.e. the index count differs from
    /// the vertex count.
    pub fn has_shared_vertices(&self) -> bool {
        self.indices.len() != self.vertices.len()
    }
}

impl SwitchHand for SkinVertex {
    fn switch_hand(&mut self) {
        self.position = flip_position(self.position);
        self.normal = flip_normal(self.normal);
    }
}

impl SwitchHand for SkinMesh {
    fn switch_hand(&mut self) {
        for vertex in &mut self.vertices {
            vertex.switch_hand();
        }
    }
}

fn non_negative(ctx: ErrorContext, value: i32, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| ctx.malformed(format!("negative {} {}", what, value)))
}

/// Drops triangles that are degenerate or reference missing vertices.
///
/// Returns the kept indices and a keep flag per source triangle.
pub(crate) fn filter_triangles(indices: &[u16], vertex_count: usize) -> (Vec<u16>, Vec<bool>) {
    let mut kept_indices = Vec::with_capacity(indices.len());
    let mut kept = Vec::with_capacity(indices.len() / 3);
    for (t, tri) in indices.chunks_exact(3).enumerate() {
        let corners = [tri[0] as i64, tri[1] as i64, tri[2] as i64];
        if valid_triangle(corners, vertex_count) {
            kept_indices.extend_from_slice(tri);
            kept.push(true);
        } else {
            log::warn!("removing badly built triangle {} {:?}", t, tri);
            kept.push(false);
        }
    }
    (kept_indices, kept)
}

/// Moves material index ranges onto the filtered index array.
fn shift_material_ranges(
    ctx: ErrorContext,
    records: &[SknMaterialRecord],
    kept: &[bool],
    vertex_count: usize,
) -> Result<Vec<SkinMaterial>> {
    // dropped[t] = triangles removed before triangle t
    let mut dropped = Vec::with_capacity(kept.len() + 1);
    dropped.push(0u32);
    for &k in kept {
        let last = dropped[dropped.len() - 1];
        dropped.push(if k { last } else { last + 1 });
    }
    let nominal = kept.len() as i64 * 3;

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let out_of_bounds = record.start_index < 0
                || record.index_count < 0
                || record.start_vertex < 0
                || record.vertex_count < 0
                || record.start_index as i64 + record.index_count as i64 > nominal
                || record.start_vertex as i64 + record.vertex_count as i64 > vertex_count as i64;
            if out_of_bounds {
                return Err(ctx.violation(Violation::MaterialRangeOutOfBounds { material: i }));
            }
            let first = record.start_index as usize / 3;
            let end = (record.start_index + record.index_count) as usize / 3;
            let before = dropped[first];
            let within = dropped[end] - before;
            Ok(SkinMaterial {
                name: record.name.clone(),
                start_vertex: record.start_vertex as u32,
                vertex_count: record.vertex_count as u32,
                start_index: record.start_index as u32 - before * 3,
                index_count: record.index_count as u32 - within * 3,
            })
        })
        .collect()
}
