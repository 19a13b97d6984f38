use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::skeleton::MAX_INFLUENCES;

pub type Result<T, E = CodecError> = std::result::Result<T, E>;

/// File family an error was raised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Format {
    Skeleton,
    SkinMesh,
    Animation,
    StaticMeshBinary,
    StaticMeshText,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::Skeleton => "skl",
            Format::SkinMesh => "skn",
            Format::Animation => "anm",
            Format::StaticMeshBinary => "scb",
            Format::StaticMeshText => "sco",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Decode,
    Encode,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Decode => f.write_str("decode"),
            Operation::Encode => f.write_str("encode"),
        }
    }
}

/// A data-integrity defect that stops the current call.
///
/// Every variant carries the offending index or count so callers can
/// surface the message as-is.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("bone {bone} has parent index {parent}, outside 0..{count}")]
    ParentOutOfRange { bone: usize, parent: i32, count: usize },

    #[error("bone {bone} is part of a parent cycle")]
    ParentCycle { bone: usize },

    #[error("raw bone id {id} is outside 0..{count}")]
    BoneIdOutOfRange { id: i32, count: usize },

    #[error("raw bone id {id} is stored more than once")]
    DuplicateBoneId { id: usize },

    #[error("no raw bone was stored for id {id}")]
    MissingBoneId { id: usize },

    #[error("influence table entry {slot} points at bone {bone}, skeleton has {count}")]
    InfluenceOutOfRange { slot: usize, bone: u32, count: usize },

    #[error("bone {bone} `{name}` is referenced by the influence table and cannot be removed")]
    InfluencedBoneRemoval { bone: usize, name: String },

    #[error("joint `{0}` cannot be resolved against the skeleton")]
    UnresolvedJoint(String),

    #[error("vertex {vertex} uses influence slot {slot}, only {len} are available")]
    InfluenceSlotOutOfRange { vertex: usize, slot: usize, len: usize },

    #[error("mesh uses {count} materials, at most 2 are supported")]
    TooManyMaterials { count: usize },

    #[error("mesh has no material assigned")]
    NoMaterials,

    #[error("polygon {polygon} has no material assigned")]
    UnassignedGeometry { polygon: usize },

    #[error("mesh has holes")]
    MeshHoles,

    #[error("polygon {polygon} has no valid triangulation")]
    InvalidTriangulation { polygon: usize },

    #[error("polygon {polygon} references vertex {vertex}, mesh has {count}")]
    VertexOutOfRange { polygon: usize, vertex: usize, count: usize },

    #[error("mesh is bound to {count} joints, the limit is {}; remove {excess}", MAX_INFLUENCES)]
    TooManyBoundJoints { count: usize, excess: usize },

    #[error("vertex {vertex} is influenced by {count} joints; set max influences to 4")]
    TooManyInfluences { vertex: usize, count: usize },

    #[error("vertex {vertex} has a zero weight sum")]
    ZeroWeightSum { vertex: usize },

    #[error("vertex {vertex} has no uv")]
    MissingUv { vertex: usize },

    #[error("{count} vertices do not fit 16-bit indices")]
    TooManyVertices { count: usize },

    #[error("index count {count} is not a multiple of 3")]
    IndexCountNotTriangles { count: usize },

    #[error("material {material} range lies outside the vertex or index arrays")]
    MaterialRangeOutOfBounds { material: usize },

    #[error("face {face} uses material {material}, mesh has {count}")]
    MaterialOutOfRange { face: usize, material: usize, count: usize },

    #[error("track {track} has {poses} poses, clip has {frames} frames")]
    TrackLength { track: usize, poses: usize, frames: usize },

    #[error("{table} index {index} is outside a table of {len}")]
    TableIndexOutOfRange { table: &'static str, index: usize, len: usize },

    #[error("{count} colors for {expected} face corners")]
    ColorCount { count: usize, expected: usize },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("{format}: {operation}: malformed header: {message}")]
    MalformedHeader {
        format: Format,
        operation: Operation,
        message: String,
    },

    #[error("{format}: {operation}: truncated {what}: needs {required} bytes, stream has {available}")]
    Truncated {
        format: Format,
        operation: Operation,
        what: &'static str,
        required: u64,
        available: u64,
    },

    #[error("{format}: {operation}: {violation}")]
    IntegrityViolation {
        format: Format,
        operation: Operation,
        violation: Violation,
    },

    #[error("{format}: {operation}: unsupported version {version:#x}")]
    UnsupportedVersion {
        format: Format,
        operation: Operation,
        version: u32,
    },

    #[error("{format}: line {line}: {message}")]
    Syntax {
        format: Format,
        line: usize,
        message: String,
    },

    #[error("{format}: {operation}: {source}")]
    Io {
        format: Format,
        operation: Operation,
        #[source]
        source: std::io::Error,
    },
}

impl CodecError {
    pub fn format(&self) -> Format {
        match self {
            CodecError::MalformedHeader { format, .. }
            | CodecError::Truncated { format, .. }
            | CodecError::IntegrityViolation { format, .. }
            | CodecError::UnsupportedVersion { format, .. }
            | CodecError::Syntax { format, .. }
            | CodecError::Io { format, .. } => *format,
        }
    }

    pub fn violation(&self) -> Option<&Violation> {
        match self {
            CodecError::IntegrityViolation { violation, .. } => Some(violation),
            _ => None,
        }
    }
}

/// Format and direction of the running call, used to build errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorContext {
    pub format: Format,
    pub operation: Operation,
}

impl ErrorContext {
    pub const fn decode(format: Format) -> Self {
        Self {
            format,
            operation: Operation::Decode,
        }
    }

    pub const fn encode(format: Format) -> Self {
        Self {
            format,
            operation: Operation::Encode,
        }
    }

    pub fn malformed(&self, message: impl Into<String>) -> CodecError {
        CodecError::MalformedHeader {
            format: self.format,
            operation: self.operation,
            message: message.into(),
        }
    }

    pub fn truncated(&self, what: &'static str, required: u64, available: u64) -> CodecError {
        CodecError::Truncated {
            format: self.format,
            operation: self.operation,
            what,
            required,
            available,
        }
    }

    pub fn violation(&self, violation: Violation) -> CodecError {
        CodecError::IntegrityViolation {
            format: self.format,
            operation: self.operation,
            violation,
        }
    }

    pub fn unsupported(&self, version: u32) -> CodecError {
        CodecError::UnsupportedVersion {
            format: self.format,
            operation: self.operation,
            version,
        }
    }

    pub fn io(&self, source: std::io::Error) -> CodecError {
        CodecError::Io {
            format: self.format,
            operation: self.operation,
            source,
        }
    }

    /// Maps a binrw failure onto the codec error kinds.
    pub fn binrw(&self, err: binrw::Error) -> CodecError {
        match err {
            binrw::Error::Io(source) => self.io(source),
            binrw::Error::BadMagic { pos, .. } => self.malformed(format!("bad magic at {:#x}", pos)),
            other => self.malformed(other.to_string()),
        }
    }
}
