//! Readers and writers for r3d character rigs, skins, animations and static
//! meshes, plus the drivers that replay them into a host scene.

pub mod animation;
pub mod error;
pub mod format;
pub mod math;
pub mod primitives;
pub mod scene;
pub mod skeleton;
pub mod skin;
pub mod static_mesh;

pub use animation::AnimationClip;
pub use error::{CodecError, ErrorContext, Format, Result, Violation};
pub use format::FileKind;
pub use math::SwitchHand;
pub use skeleton::Skeleton;
pub use skin::SkinMesh;
pub use static_mesh::StaticMesh;
