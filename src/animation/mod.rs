//! Skeletal animation clips (`.anm`).
//!
//! Version 3 stores each track as a header followed by its poses. Version 4
//! stores deduplicated position and rotation tables and a frame-major cell
//! table that indexes them. Both decode into bone-major [`BoneTrack`]s.

pub mod anm;
pub mod hash;
pub mod raw;
pub mod resolve;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use anyhow::Context;
use cgmath::{Quaternion, Vector3};
use serde::Serialize;

use crate::error::{ErrorContext, Format, Result, Violation};
use crate::math::handedness::{flip_position, flip_rotation, SwitchHand};
use crate::primitives::{expect_magic, read_le, MinLength};

pub use hash::name_hash;

pub const ANM_MAGIC: &[u8; 8] = b"r3d2anmd";
pub const TRACK_NAME_LEN: usize = 32;
/// Track flag marking a bone without a parent.
pub const ROOT_FLAG: i32 = 2;

const MIN_FILE_LEN: u64 = 28;

/// Local transform of one bone at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Pose {
    pub rotation: Quaternion<f32>,
    pub translation: Vector3<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoneTrack {
    /// Joint name, empty for hashed tracks.
    pub name: String,
    /// Joint name hash, 0 for named tracks.
    pub name_hash: u32,
    pub is_root: bool,
    pub poses: Vec<Pose>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationClip {
    pub version: u32,
    pub frame_count: usize,
    pub fps: f32,
    pub tracks: Vec<BoneTrack>,
}

/// Frame rate of a version 3 header.
///
/// Negative values wrap around 2^32.
pub fn correct_v3_fps(raw: f64) -> f64 {
    if raw < 0.0 {
        raw + 4_294_967_296.0
    } else {
        raw
    }
}

/// Frame rate of a version 4 header. Values below 1 are a frame period.
pub fn correct_v4_fps(raw: f32) -> f32 {
    if raw < 1.0 {
        1.0 / raw
    } else {
        raw
    }
}

impl AnimationClip {
    pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let ctx = ErrorContext::decode(Format::Animation);
        let mut min = MinLength::start(reader, ctx, MIN_FILE_LEN)?;

        expect_magic(reader, ctx, ANM_MAGIC)?;
        let version: i32 = read_le(reader, ctx)?;
        let mut clip = match version {
            3 => anm::read_v3(reader, &mut min)?,
            4 => {
                log::info!("animation is version 4, support for it is in beta");
                raw::read_v4(reader, &mut min)?
            }
            other => return Err(ctx.unsupported(other as u32)),
        };

        if !clip.fps.is_finite() || clip.fps <= 0.0 {
            return Err(ctx.malformed(format!("invalid frame rate {}", clip.fps)));
        }
        clip.switch_hand();

        log::debug!(
            "read animation v{}: {} tracks, {} frames at {} fps",
            clip.version,
            clip.tracks.len(),
            clip.frame_count,
            clip.fps
        );
        Ok(clip)
    }

    /// Writes the version 3 layout.
    pub fn encode<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let ctx = ErrorContext::encode(Format::Animation);
        if self.version != 3 {
            return Err(ctx.unsupported(self.version));
        }
        self.validate(ctx)?;
        anm::write_v3(&self.switched(), writer)
    }

    pub fn validate(&self, ctx: ErrorContext) -> Result<()> {
        for (i, track) in self.tracks.iter().enumerate() {
            if track.poses.len() != self.frame_count {
                return Err(ctx.violation(Violation::TrackLength {
                    track: i,
                    poses: track.poses.len(),
                    frames: self.frame_count,
                }));
            }
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open animation '{}'", path.display()))?;
        Ok(Self::decode(&mut BufReader::new(file))?)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create animation '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.encode(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn duration_secs(&self) -> f32 {
        self.frame_count as f32 / self.fps
    }
}

impl SwitchHand for Pose {
    fn switch_hand(&mut self) {
        self.rotation = flip_rotation(self.rotation);
        self.translation = flip_position(self.translation);
    }
}

impl SwitchHand for AnimationClip {
    fn switch_hand(&mut self) {
        for track in &mut self.tracks {
            for pose in &mut track.poses {
                pose.switch_hand();
            }
        }
    }
}
