use serde::Serialize;

use crate::animation::ANM_MAGIC;
use crate::error::Format;
use crate::skeleton::{RAW_SKL_MAGIC, SKL_MAGIC};
use crate::skin::SKN_MAGIC;
use crate::static_mesh::binary::SCB_MAGIC;
use crate::static_mesh::text::OBJECT_BEGIN;

/// File families recognised by their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileKind {
    Skeleton,
    RawSkeleton,
    SkinMesh,
    Animation,
    StaticMeshBinary,
    StaticMeshText,
}

impl FileKind {
    pub fn detect(bytes: &[u8]) -> Option<FileKind> {
        if bytes.starts_with(SKL_MAGIC) {
            return Some(FileKind::Skeleton);
        }
        if bytes.starts_with(ANM_MAGIC) {
            return Some(FileKind::Animation);
        }
        if bytes.starts_with(SCB_MAGIC) {
            return Some(FileKind::StaticMeshBinary);
        }
        if bytes.len() >= 8 && bytes[4..8] == RAW_SKL_MAGIC.to_le_bytes() {
            return Some(FileKind::RawSkeleton);
        }
        if bytes.starts_with(&SKN_MAGIC.to_le_bytes()) {
            return Some(FileKind::SkinMesh);
        }
        let head = &bytes[..bytes.len().min(OBJECT_BEGIN.len())];
        if head.eq_ignore_ascii_case(OBJECT_BEGIN.as_bytes()) {
            return Some(FileKind::StaticMeshText);
        }
        None
    }

    pub fn format(self) -> Format {
        match self {
            FileKind::Skeleton | FileKind::RawSkeleton => Format::Skeleton,
            FileKind::SkinMesh => Format::SkinMesh,
            FileKind::Animation => Format::Animation,
            FileKind::StaticMeshBinary => Format::StaticMeshBinary,
            FileKind::StaticMeshText => Format::StaticMeshText,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(FileKind::detect(b"r3d2sklt\x01\0\0\0"), Some(FileKind::Skeleton));
        assert_eq!(FileKind::detect(b"r3d2anmd"), Some(FileKind::Animation));
        assert_eq!(FileKind::detect(b"r3d2Mesh"), Some(FileKind::StaticMeshBinary));
        assert_eq!(
            FileKind::detect(&[0x33, 0x22, 0x11, 0x00, 1, 0, 1, 0]),
            Some(FileKind::SkinMesh)
        );
        assert_eq!(
            FileKind::detect(&[0x80, 0, 0, 0, 0xC3, 0x4F, 0xFD, 0x22]),
            Some(FileKind::RawSkeleton)
        );
        assert_eq!(
            FileKind::detect(b"[OBJECTBEGIN]\r\nName= a"),
            Some(FileKind::StaticMeshText)
        );
        assert_eq!(FileKind::detect(b"[Obj"), None);
        assert_eq!(FileKind::detect(b""), None);
    }
}
