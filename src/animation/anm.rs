//! Dense layout, version 3.
//!
//! ```text
//! 0x00  magic "r3d2anmd", i32 version
//! 0x0C  u32 designer id, i32 bone count, i32 frame count, f32 fps
//! 0x1C  per bone: name[32], i32 flag (2 = root)
//!       then frame count x (quat x y z w, translation x y z)
//! ```

use std::io::{Read, Seek, Write};

use binrw::binrw;

use super::{AnimationClip, BoneTrack, Pose, ANM_MAGIC, ROOT_FLAG, TRACK_NAME_LEN};
use crate::error::{ErrorContext, Format, Result};
use crate::math::{RQuaternion, RVector3};
use crate::primitives::{fixed_name, parse_fixed_name, read_le, read_vec_le, write_le, MinLength};
use crate::skeleton::DESIGNER_ID;

pub const TRACK_HEADER_LEN: u64 = 0x24;
pub const POSE_RECORD_LEN: u64 = 0x1C;

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct AnmHeader {
    pub designer_id: u32,
    pub bone_count: i32,
    pub frame_count: i32,
    pub fps: f32,
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct AnmTrackHeader {
    #[br(map = |raw: [u8; TRACK_NAME_LEN]| parse_fixed_name(&raw))]
    #[bw(map = |name: &String| fixed_name::<TRACK_NAME_LEN>(name))]
    pub name: String,
    pub flag: i32,
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct PoseRecord {
    pub rotation: RQuaternion,
    pub translation: RVector3,
}

impl From<PoseRecord> for Pose {
    fn from(record: PoseRecord) -> Self {
        Pose {
            rotation: record.rotation.0,
            translation: record.translation.0,
        }
    }
}

/// Reads the body after magic and version, in file convention.
pub(super) fn read_v3<R: Read + Seek>(reader: &mut R, min: &mut MinLength) -> Result<AnimationClip> {
    let ctx = ErrorContext::decode(Format::Animation);
    let header: AnmHeader = read_le(reader, ctx)?;

    let bone_count = usize::try_from(header.bone_count)
        .map_err(|_| ctx.malformed(format!("negative bone count {}", header.bone_count)))?;
    let frame_count = usize::try_from(header.frame_count)
        .map_err(|_| ctx.malformed(format!("negative frame count {}", header.frame_count)))?;

    min.add("track headers", bone_count as u64, TRACK_HEADER_LEN)?;
    min.add(
        "pose data",
        (bone_count as u64).saturating_mul(frame_count as u64),
        POSE_RECORD_LEN,
    )?;

    let fps = correct_fps(header.fps);

    let mut tracks = Vec::with_capacity(bone_count);
    for _ in 0..bone_count {
        let track_header: AnmTrackHeader = read_le(reader, ctx)?;
        let poses: Vec<PoseRecord> = read_vec_le(reader, ctx, frame_count)?;
        tracks.push(BoneTrack {
            name: track_header.name,
            name_hash: 0,
            is_root: track_header.flag == ROOT_FLAG,
            poses: poses.into_iter().map(Pose::from).collect(),
        });
    }

    Ok(AnimationClip {
        version: 3,
        frame_count,
        fps,
        tracks,
    })
}

// The field is an f32, so raw values near -2^32 only land on multiples of
// 256 once wrapped. -4294967292.0, for one, reads back as -4294967296.0 and
// wraps to 0, which the clip then rejects.
fn correct_fps(raw: f32) -> f32 {
    super::correct_v3_fps(raw as f64) as f32
}

/// Writes a clip that is already in file convention.
pub(super) fn write_v3<W: Write + Seek>(clip: &AnimationClip, writer: &mut W) -> Result<()> {
    let ctx = ErrorContext::encode(Format::Animation);
    writer.write_all(ANM_MAGIC).map_err(|e| ctx.io(e))?;
    write_le(&3i32, writer, ctx)?;
    write_le(
        &AnmHeader {
            designer_id: DESIGNER_ID,
            bone_count: clip.tracks.len() as i32,
            frame_count: clip.frame_count as i32,
            fps: clip.fps,
        },
        writer,
        ctx,
    )?;

    for track in &clip.tracks {
        if track.name.is_empty() && track.name_hash != 0 {
            log::warn!(
                "track with hash {:#010x} has no name and is written unnamed",
                track.name_hash
            );
        }
        write_le(
            &AnmTrackHeader {
                name: track.name.clone(),
                flag: if track.is_root { ROOT_FLAG } else { 0 },
            },
            writer,
            ctx,
        )?;
        for pose in &track.poses {
            write_le(
                &PoseRecord {
                    rotation: RQuaternion(pose.rotation),
                    translation: RVector3(pose.translation),
                },
                writer,
                ctx,
            )?;
        }
    }
    Ok(())
}
