//! Bone-list layout, versions 1 and 2.
//!
//! ```text
//! 0x00  magic "r3d2sklt"
//! 0x08  i32 version, u32 designer id, i32 bone count
//! 0x14  bone records, 0x58 bytes each
//!         name[32], i32 parent, f32 scale, 12 x f32 bind matrix
//! v2:   i32 influence count, i32 skeleton index per influence
//! ```

use std::io::{Read, Seek, Write};

use binrw::binrw;

use super::{Bone, Skeleton, BONE_NAME_LEN, DESIGNER_ID, SKL_MAGIC};
use crate::error::{ErrorContext, Format, Result};
use crate::math::RMatrix34;
use crate::primitives::{
    expect_magic, fixed_name, parse_fixed_name, read_le, read_vec_le, write_le, MinLength,
};

pub const BONE_RECORD_LEN: u64 = 0x58;

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct SklHeader {
    pub version: i32,
    pub designer_id: u32,
    pub bone_count: i32,
}

#[binrw]
#[derive(Debug, Clone)]
#[brw(little)]
pub struct SklBoneRecord {
    #[br(map = |raw: [u8; BONE_NAME_LEN]| parse_fixed_name(&raw))]
    #[bw(map = |name: &String| fixed_name::<BONE_NAME_LEN>(name))]
    pub name: String,
    pub parent: i32,
    pub scale: f32,
    pub transform: RMatrix34,
}

impl From<SklBoneRecord> for Bone {
    fn from(record: SklBoneRecord) -> Self {
        Bone {
            name: record.name,
            parent: record.parent,
            scale: record.scale,
            transform: record.transform.0,
            flags: 0,
        }
    }
}

impl From<&Bone> for SklBoneRecord {
    fn from(bone: &Bone) -> Self {
        SklBoneRecord {
            name: bone.name.clone(),
            parent: bone.parent,
            scale: bone.scale,
            transform: RMatrix34(bone.transform),
        }
    }
}

/// Reads a version 1 or 2 skeleton in file convention.
pub(super) fn read_list<R: Read + Seek>(reader: &mut R, min: &mut MinLength) -> Result<Skeleton> {
    let ctx = ErrorContext::decode(Format::Skeleton);
    expect_magic(reader, ctx, SKL_MAGIC)?;

    let header: SklHeader = read_le(reader, ctx)?;
    if header.version != 1 && header.version != 2 {
        return Err(ctx.unsupported(header.version as u32));
    }
    let bone_count = usize::try_from(header.bone_count)
        .map_err(|_| ctx.malformed(format!("negative bone count {}", header.bone_count)))?;

    min.add("bone records", bone_count as u64, BONE_RECORD_LEN)?;
    if header.version == 2 {
        min.add("influence count", 1, 4)?;
    }

    let records: Vec<SklBoneRecord> = read_vec_le(reader, ctx, bone_count)?;
    let bones: Vec<Bone> = records.into_iter().map(Bone::from).collect();

    let influence_table = if header.version == 2 {
        let count: i32 = read_le(reader, ctx)?;
        let count = usize::try_from(count)
            .map_err(|_| ctx.malformed(format!("negative influence count {}", count)))?;
        min.add("influence table", count as u64, 4)?;
        Some(read_vec_le::<u32, _>(reader, ctx, count)?)
    } else {
        None
    };

    log::debug!(
        "read skeleton v{} with {} bones",
        header.version,
        bones.len()
    );

    Ok(Skeleton {
        version: header.version as u32,
        bones,
        influence_table,
    })
}

/// Writes a skeleton that is already in file convention.
pub(super) fn write_list<W: Write + Seek>(skeleton: &Skeleton, writer: &mut W) -> Result<()> {
    let ctx = ErrorContext::encode(Format::Skeleton);
    writer.write_all(SKL_MAGIC).map_err(|e| ctx.io(e))?;

    let header = SklHeader {
        version: skeleton.version as i32,
        designer_id: DESIGNER_ID,
        bone_count: skeleton.bones.len() as i32,
    };
    write_le(&header, writer, ctx)?;

    for bone in &skeleton.bones {
        write_le(&SklBoneRecord::from(bone), writer, ctx)?;
    }

    if skeleton.version == 2 {
        let table = skeleton.influences();
        write_le(&(table.len() as i32), writer, ctx)?;
        for index in table {
            write_le(&index, writer, ctx)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, Violation};
    use cgmath::{Deg, Matrix4, Quaternion, Rotation3, Vector3};
    use std::io::Cursor;

    fn sample(version: u32) -> Skeleton {
        let root = Bone::new(
            "root",
            -1,
            crate::math::rigid_transform(Quaternion::from_angle_y(Deg(30.0)), Vector3::new(1.0, 2.0, 3.0)),
        );
        let spine = Bone::new(
            "spine",
            0,
            Matrix4::from_translation(Vector3::new(0.0, 4.0, -1.5)),
        );
        Skeleton {
            version,
            bones: vec![root, spine],
            influence_table: (version == 2).then(|| vec![1, 0]),
        }
    }

    fn encode(skeleton: &Skeleton) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        skeleton.encode(&mut out).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_v1_layout_and_roundtrip() {
        let skeleton = sample(1);
        let bytes = encode(&skeleton);
        assert_eq!(bytes.len(), 20 + 2 * BONE_RECORD_LEN as usize);
        assert_eq!(&bytes[..8], SKL_MAGIC);
        assert_eq!(&bytes[12..16], &DESIGNER_ID.to_le_bytes());

        let decoded = Skeleton::decode(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(decoded, skeleton);
    }

    #[test]
    fn test_v2_roundtrip_keeps_table() {
        let skeleton = sample(2);
        let bytes = encode(&skeleton);
        assert_eq!(bytes.len(), 20 + 2 * BONE_RECORD_LEN as usize + 4 + 8);

        let decoded = Skeleton::decode(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(decoded.influence_table, Some(vec![1, 0]));
        assert_eq!(decoded, skeleton);
    }

    #[test]
    fn test_file_stores_mirrored_translation() {
        let skeleton = sample(1);
        let bytes = encode(&skeleton);
        // translation x of the first bone is the 4th matrix float
        let offset = 20 + 40 + 12;
        let tx = f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        assert_eq!(tx, -1.0);
    }

    #[test]
    fn test_truncated_bone_table() {
        let bytes = encode(&sample(1));
        let err = Skeleton::decode(&mut Cursor::new(&bytes[..bytes.len() - 1])).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn test_truncated_influence_table() {
        let bytes = encode(&sample(2));
        let err = Skeleton::decode(&mut Cursor::new(&bytes[..bytes.len() - 4])).unwrap_err();
        match err {
            CodecError::Truncated { what, .. } => assert_eq!(what, "influence table"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = encode(&sample(1));
        bytes[8..12].copy_from_slice(&5i32.to_le_bytes());
        let err = Skeleton::decode(&mut Cursor::new(&bytes)).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedVersion { version: 5, .. }
        ));
    }

    #[test]
    fn test_too_short_file() {
        let err = Skeleton::decode(&mut Cursor::new(b"r3d2sklt".to_vec())).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { required: 20, .. }));
    }

    #[test]
    fn test_influence_entry_out_of_range() {
        let mut skeleton = sample(2);
        skeleton.influence_table = Some(vec![0, 7]);
        let err = skeleton.encode(&mut Cursor::new(Vec::new())).unwrap_err();
        assert_eq!(
            err.violation(),
            Some(&Violation::InfluenceOutOfRange {
                slot: 1,
                bone: 7,
                count: 2
            })
        );
    }

    #[test]
    fn test_v3_encode_is_unsupported() {
        let mut skeleton = sample(2);
        skeleton.version = 3;
        let err = skeleton.encode(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(
            err,
            CodecError::UnsupportedVersion { version: 3, .. }
        ));
    }
}
