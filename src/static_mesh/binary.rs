//! Binary static meshes (`.scb`).
//!
//! ```text
//! 0x00  magic "r3d2Mesh", u32 version (0x20001 or 0x20002)
//! 0x0C  name[128]
//! 0x8C  i32 vertex count - 1, i32 face count, i32 colored
//! 0x20002: 3 x f32 bounds min, 3 x f32 bounds size
//!       vertices, 3 x f32
//!       faces of 100 bytes: 3 x i32, material[64], 3 x f32 u, 3 x f32 v
//! colored: 3 bytes of RGB per face corner
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use anyhow::Context;
use binrw::binrw;
use cgmath::{Vector2, Vector3};

use super::{collect_faces, Bounds, RawFace, StaticMesh};
use crate::error::{ErrorContext, Format, Result, Violation};
use crate::math::handedness::SwitchHand;
use crate::math::RVector3;
use crate::primitives::{
    expect_magic, fixed_name, parse_fixed_name, read_le, read_vec_le, write_le, MinLength,
};

pub const SCB_MAGIC: &[u8; 8] = b"r3d2Mesh";
pub const SCB_VERSION: u32 = 0x20001;
/// Version carrying a bounding box.
pub const SCB_VERSION_BOUNDS: u32 = 0x20002;
pub const MESH_NAME_LEN: usize = 128;
pub const MATERIAL_NAME_LEN: usize = 64;
pub const FACE_RECORD_LEN: u64 = 100;

const MIN_FILE_LEN: u64 = 152;

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct ScbHeader {
    pub version: u32,
    #[br(map = |raw: [u8; MESH_NAME_LEN]| parse_fixed_name(&raw))]
    #[bw(map = |name: &String| fixed_name::<MESH_NAME_LEN>(name))]
    pub name: String,
    pub vertex_count_minus_one: i32,
    pub face_count: i32,
    pub colored: i32,
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct ScbBounds {
    pub min: RVector3,
    pub size: RVector3,
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct ScbFaceRecord {
    pub indices: [i32; 3],
    #[br(map = |raw: [u8; MATERIAL_NAME_LEN]| parse_fixed_name(&raw))]
    #[bw(map = |name: &String| fixed_name::<MATERIAL_NAME_LEN>(name))]
    pub material: String,
    pub u: [f32; 3],
    pub v: [f32; 3],
}

impl StaticMesh {
    pub fn decode_binary<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let ctx = ErrorContext::decode(Format::StaticMeshBinary);
        let mut min = MinLength::start(reader, ctx, MIN_FILE_LEN)?;

        expect_magic(reader, ctx, SCB_MAGIC)?;
        let header: ScbHeader = read_le(reader, ctx)?;
        if header.version != SCB_VERSION && header.version != SCB_VERSION_BOUNDS {
            return Err(ctx.unsupported(header.version));
        }
        let vertex_count = usize::try_from(header.vertex_count_minus_one as i64 + 1).map_err(|_| {
            ctx.malformed(format!(
                "vertex count field {} is below -1",
                header.vertex_count_minus_one
            ))
        })?;
        let face_count = usize::try_from(header.face_count)
            .map_err(|_| ctx.malformed(format!("negative face count {}", header.face_count)))?;
        let colored = header.colored != 0;

        if header.version == SCB_VERSION_BOUNDS {
            min.add("bounding box", 1, 24)?;
        }
        min.add("vertices", vertex_count as u64, 12)?;
        min.add("faces", face_count as u64, FACE_RECORD_LEN)?;
        if colored {
            min.add("colors", face_count as u64, 9)?;
        }

        let bounds = if header.version == SCB_VERSION_BOUNDS {
            let raw: ScbBounds = read_le(reader, ctx)?;
            Some(Bounds {
                min: raw.min.0,
                size: raw.size.0,
            })
        } else {
            None
        };

        let vertices: Vec<RVector3> = read_vec_le(reader, ctx, vertex_count)?;
        let records: Vec<ScbFaceRecord> = read_vec_le(reader, ctx, face_count)?;
        let colors: Option<Vec<[[u8; 3]; 3]>> = if colored {
            Some(read_vec_le(reader, ctx, face_count)?)
        } else {
            None
        };

        let raw_faces = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| RawFace {
                indices: record.indices.map(i64::from),
                material: record.material,
                uvs: [0, 1, 2].map(|k| Vector2::new(record.u[k], record.v[k])),
                colors: colors.as_ref().map(|c| c[i]),
            })
            .collect();
        let set = collect_faces(raw_faces, vertex_count);

        let mut mesh = StaticMesh {
            version: header.version,
            name: header.name,
            origin: Vector3::new(0.0, 0.0, 0.0),
            pivot: None,
            bounds,
            vertices: vertices.into_iter().map(|v| v.0).collect(),
            faces: set.faces,
            materials: set.materials,
            colors: colored.then_some(set.colors),
            dropped_faces: set.dropped,
        };
        mesh.switch_hand();

        log::debug!(
            "read static mesh `{}` v{:#x}: {} vertices, {} faces, {} materials",
            mesh.name,
            mesh.version,
            mesh.vertices.len(),
            mesh.faces.len(),
            mesh.materials.len()
        );
        Ok(mesh)
    }

    pub fn encode_binary<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let ctx = ErrorContext::encode(Format::StaticMeshBinary);
        if self.version != SCB_VERSION && self.version != SCB_VERSION_BOUNDS {
            return Err(ctx.unsupported(self.version));
        }
        self.validate(ctx)?;

        let mut file = self.clone();
        if file.version == SCB_VERSION_BOUNDS && file.bounds.is_none() {
            file.bounds = Some(file.compute_bounds().unwrap_or(Bounds {
                min: Vector3::new(0.0, 0.0, 0.0),
                size: Vector3::new(0.0, 0.0, 0.0),
            }));
        }
        file.switch_hand();

        writer.write_all(SCB_MAGIC).map_err(|e| ctx.io(e))?;
        write_le(
            &ScbHeader {
                version: file.version,
                name: file.name.clone(),
                vertex_count_minus_one: file.vertices.len() as i32 - 1,
                face_count: file.faces.len() as i32,
                colored: file.colors.is_some() as i32,
            },
            writer,
            ctx,
        )?;
        if file.version == SCB_VERSION_BOUNDS {
            if let Some(bounds) = &file.bounds {
                write_le(
                    &ScbBounds {
                        min: RVector3(bounds.min),
                        size: RVector3(bounds.size),
                    },
                    writer,
                    ctx,
                )?;
            }
        }
        for v in &file.vertices {
            write_le(&RVector3(*v), writer, ctx)?;
        }
        for face in &file.faces {
            let record = ScbFaceRecord {
                indices: face.indices.map(|i| i as i32),
                material: file.materials[face.material].clone(),
                u: face.uvs.map(|uv| uv.x),
                v: face.uvs.map(|uv| uv.y),
            };
            write_le(&record, writer, ctx)?;
        }
        if let Some(colors) = &file.colors {
            for rgb in colors {
                write_le(rgb, writer, ctx)?;
            }
        }
        Ok(())
    }

    /// Face references and color count, checked before either layout is written.
    pub fn validate(&self, ctx: ErrorContext) -> Result<()> {
        for (i, face) in self.faces.iter().enumerate() {
            if face.material >= self.materials.len() {
                return Err(ctx.violation(Violation::MaterialOutOfRange {
                    face: i,
                    material: face.material,
                    count: self.materials.len(),
                }));
            }
            if let Some(&vertex) = face
                .indices
                .iter()
                .find(|&&v| v as usize >= self.vertices.len())
            {
                return Err(ctx.violation(Violation::VertexOutOfRange {
                    polygon: i,
                    vertex: vertex as usize,
                    count: self.vertices.len(),
                }));
            }
        }
        if let Some(colors) = &self.colors {
            if colors.len() != self.faces.len() * 3 {
                return Err(ctx.violation(Violation::ColorCount {
                    count: colors.len(),
                    expected: self.faces.len() * 3,
                }));
            }
        }
        Ok(())
    }

    pub fn from_scb_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open static mesh '{}'", path.display()))?;
        Ok(Self::decode_binary(&mut BufReader::new(file))?)
    }

    pub fn to_scb_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create static mesh '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.encode_binary(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
