//! Raw offset-table skeleton layout (version 3), decode only.
//!
//! All offsets are relative to the start of the file.
//!
//! ```text
//! 0x00  u32 size, u32 magic 0x22FD4FC3, u32, u16
//! 0x0E  u16 bone count
//! 0x10  i32 influence count
//! 0x14  u32 bone array offset
//! 0x18  u32 (unused region offset)
//! 0x1C  u32 influence array offset, u16 entries
//! 0x20  2 x u32 (unused region offsets)
//! 0x28  u32 name blob offset
//! ```
//!
//! Bone records are 0x64 bytes apart and carry their own id. Names follow
//! in record order, NUL terminated, each padded to a multiple of 4.

use std::io::{Read, Seek, SeekFrom};

use binrw::binrw;

use super::{Bone, Skeleton, DEFAULT_BONE_SCALE, RAW_SKL_MAGIC};
use crate::error::{ErrorContext, Format, Result, Violation};
use crate::math::{rigid_transform, RQuaternion, RVector3};
use crate::primitives::{read_le, read_nul_string, read_vec_le, MinLength};

pub const RAW_HEADER_LEN: u64 = 0x2C;
pub const RAW_BONE_STRIDE: u64 = 0x64;
const MAX_NAME_CHARS: usize = 31;

#[binrw]
#[derive(Debug, Clone, Default)]
#[brw(little)]
pub struct RawSklHeader {
    pub size: u32,
    pub magic: u32,
    pub reserved: u32,
    pub reserved2: u16,
    pub bone_count: u16,
    pub influence_count: i32,
    pub bones_offset: u32,
    pub after_bones_offset: u32,
    pub influences_offset: u32,
    pub reserved_offsets: [u32; 2],
    pub names_offset: u32,
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct RawBoneRecord {
    pub flags: u16,
    pub id: i16,
    pub parent: i16,
    pub reserved: u16,
    pub name_hash: u32,
    pub unused: f32,
    pub translation: RVector3,
    pub unused_1: [f32; 3],
    pub rotation: RQuaternion,
    #[brw(pad_after = 32)]
    pub centre: [f32; 3],
}

/// Reads a raw skeleton in file convention.
pub(super) fn read_raw<R: Read + Seek>(reader: &mut R, min: &mut MinLength) -> Result<Skeleton> {
    let ctx = ErrorContext::decode(Format::Skeleton);
    let start = reader.stream_position().map_err(|e| ctx.io(e))?;
    min.at_least("raw header", RAW_HEADER_LEN)?;

    let header: RawSklHeader = read_le(reader, ctx)?;
    if header.magic != RAW_SKL_MAGIC {
        return Err(ctx.malformed(format!("bad raw magic {:#x}", header.magic)));
    }
    let bone_count = header.bone_count as usize;
    let influence_count = usize::try_from(header.influence_count).map_err(|_| {
        ctx.malformed(format!("negative influence count {}", header.influence_count))
    })?;

    min.at_least(
        "raw bone array",
        header.bones_offset as u64 + bone_count as u64 * RAW_BONE_STRIDE,
    )?;
    min.at_least(
        "raw influence array",
        header.influences_offset as u64 + influence_count as u64 * 2,
    )?;
    min.at_least("raw name blob", header.names_offset as u64)?;

    let blob_len = (min.available() - header.names_offset as u64) as usize;
    reader
        .seek(SeekFrom::Start(start + header.names_offset as u64))
        .map_err(|e| ctx.io(e))?;
    let mut blob = vec![0u8; blob_len];
    reader.read_exact(&mut blob).map_err(|e| ctx.io(e))?;

    let mut slots: Vec<Option<Bone>> = vec![None; bone_count];
    let mut name_pos = 0usize;
    for i in 0..bone_count {
        reader
            .seek(SeekFrom::Start(
                start + header.bones_offset as u64 + i as u64 * RAW_BONE_STRIDE,
            ))
            .map_err(|e| ctx.io(e))?;
        let record: RawBoneRecord = read_le(reader, ctx)?;

        if name_pos >= blob.len() {
            return Err(ctx.truncated(
                "raw name blob",
                header.names_offset as u64 + name_pos as u64 + 1,
                min.available(),
            ));
        }
        let (name, stride) = read_nul_string(&blob[name_pos..], MAX_NAME_CHARS);
        name_pos += stride;

        let id = record.id;
        if id < 0 || id as usize >= bone_count {
            return Err(ctx.violation(Violation::BoneIdOutOfRange {
                id: id as i32,
                count: bone_count,
            }));
        }
        let slot = &mut slots[id as usize];
        if slot.is_some() {
            return Err(ctx.violation(Violation::DuplicateBoneId { id: id as usize }));
        }
        *slot = Some(Bone {
            name,
            parent: record.parent as i32,
            scale: DEFAULT_BONE_SCALE,
            transform: rigid_transform(record.rotation.0, record.translation.0),
            flags: record.flags as u32,
        });
    }

    let bones = slots
        .into_iter()
        .enumerate()
        .map(|(id, slot)| slot.ok_or_else(|| ctx.violation(Violation::MissingBoneId { id })))
        .collect::<Result<Vec<Bone>>>()?;

    reader
        .seek(SeekFrom::Start(start + header.influences_offset as u64))
        .map_err(|e| ctx.io(e))?;
    let influences: Vec<u16> = read_vec_le(reader, ctx, influence_count)?;

    log::debug!(
        "read raw skeleton with {} bones and {} influences",
        bones.len(),
        influences.len()
    );

    Ok(Skeleton {
        version: 3,
        bones,
        influence_table: Some(influences.into_iter().map(u32::from).collect()),
    })
}
