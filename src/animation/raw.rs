//! Table layout, version 4, decode only.
//!
//! ```text
//! 0x00  magic "r3d2anmd", i32 version
//! 0x0C  u32 data size (bytes after this 12 byte prefix)
//! 0x10  u32 magic 0xBE0794D3, 8 reserved bytes
//! 0x1C  i32 bone count, i32 frame count, f32 fps, 12 reserved bytes
//! 0x34  i32 positions offset, i32 quaternions offset, i32 frames offset
//! 0x40  12 reserved bytes
//! 0x4C  positions (3 x f32), quaternions (4 x f32),
//!       then frame count x bone count cells:
//!         u32 name hash, u16 position id, u16, u16 rotation id, u16
//! ```
//!
//! Table lengths come from the deltas between consecutive offsets.

use std::io::{Read, Seek};

use binrw::binrw;

use super::{correct_v4_fps, AnimationClip, BoneTrack, Pose};
use crate::error::{ErrorContext, Format, Result, Violation};
use crate::math::{RQuaternion, RVector3};
use crate::primitives::{read_le, read_vec_le, MinLength};

pub const RAW_ANM_MAGIC: u32 = 0xBE07_94D3;
pub const RAW_HEADER_END: u64 = 0x4C;
const PREFIX_LEN: u64 = 12;
const POSITION_LEN: i64 = 12;
const QUATERNION_LEN: i64 = 16;
const CELL_LEN: u64 = 12;

#[binrw]
#[derive(Debug, Clone, Default)]
#[brw(little)]
pub struct RawAnmHeader {
    pub data_size: u32,
    pub magic: u32,
    pub reserved: [u8; 8],
    pub bone_count: i32,
    pub frame_count: i32,
    pub fps: f32,
    pub reserved_1: [u8; 12],
    pub positions_offset: i32,
    pub quaternions_offset: i32,
    pub frames_offset: i32,
    pub reserved_2: [u8; 12],
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct FrameCell {
    pub name_hash: u32,
    pub position_id: u16,
    pub reserved: u16,
    pub rotation_id: u16,
    pub reserved_1: u16,
}

/// Reads the body after magic and version, in file convention.
pub(super) fn read_v4<R: Read + Seek>(reader: &mut R, min: &mut MinLength) -> Result<AnimationClip> {
    let ctx = ErrorContext::decode(Format::Animation);
    min.at_least("data size", PREFIX_LEN + 4)?;
    min.at_least("raw header", RAW_HEADER_END)?;

    let header: RawAnmHeader = read_le(reader, ctx)?;
    min.at_least("declared data", PREFIX_LEN + header.data_size as u64)?;
    if header.magic != RAW_ANM_MAGIC {
        return Err(ctx.malformed(format!("bad inner magic {:#010x}", header.magic)));
    }

    let bone_count = usize::try_from(header.bone_count)
        .map_err(|_| ctx.malformed(format!("negative bone count {}", header.bone_count)))?;
    let frame_count = usize::try_from(header.frame_count)
        .map_err(|_| ctx.malformed(format!("negative frame count {}", header.frame_count)))?;
    let position_count = table_len(
        ctx,
        "position",
        header.positions_offset,
        header.quaternions_offset,
        POSITION_LEN,
    )?;
    let rotation_count = table_len(
        ctx,
        "quaternion",
        header.quaternions_offset,
        header.frames_offset,
        QUATERNION_LEN,
    )?;

    min.add("position table", position_count as u64, POSITION_LEN as u64)?;
    min.add("quaternion table", rotation_count as u64, QUATERNION_LEN as u64)?;
    // track names come from the first frame's cells, so a clip with bones
    // needs at least one frame
    if bone_count > 0 && frame_count == 0 {
        return Err(ctx.malformed(format!("{} bones but no frames", bone_count)));
    }
    min.add(
        "frame table",
        (frame_count as u64).saturating_mul(bone_count as u64),
        CELL_LEN,
    )?;

    let positions: Vec<RVector3> = read_vec_le(reader, ctx, position_count)?;
    let rotations: Vec<RQuaternion> = read_vec_le(reader, ctx, rotation_count)?;

    let mut tracks: Vec<BoneTrack> = (0..bone_count)
        .map(|_| BoneTrack {
            name: String::new(),
            name_hash: 0,
            is_root: false,
            poses: Vec::with_capacity(frame_count),
        })
        .collect();

    for frame in 0..frame_count {
        for track in tracks.iter_mut() {
            let cell: FrameCell = read_le(reader, ctx)?;
            if frame == 0 {
                track.name_hash = cell.name_hash;
            }
            let translation = positions.get(cell.position_id as usize).ok_or_else(|| {
                ctx.violation(Violation::TableIndexOutOfRange {
                    table: "position",
                    index: cell.position_id as usize,
                    len: positions.len(),
                })
            })?;
            let rotation = rotations.get(cell.rotation_id as usize).ok_or_else(|| {
                ctx.violation(Violation::TableIndexOutOfRange {
                    table: "quaternion",
                    index: cell.rotation_id as usize,
                    len: rotations.len(),
                })
            })?;
            track.poses.push(Pose {
                rotation: rotation.0,
                translation: translation.0,
            });
        }
    }

    Ok(AnimationClip {
        version: 4,
        frame_count,
        fps: correct_v4_fps(header.fps),
        tracks,
    })
}

fn table_len(ctx: ErrorContext, table: &str, start: i32, end: i32, size: i64) -> Result<usize> {
    let delta = end as i64 - start as i64;
    if delta < 0 {
        return Err(ctx.malformed(format!(
            "{} table ends before it starts ({:#x} > {:#x})",
            table, start, end
        )));
    }
    Ok((delta / size) as usize)
}
