//! Bridge between decoded records and a host scene.
//!
//! The codecs never talk to a host. Drivers in this module take a decoded
//! record and replay it through a [`SceneAdapter`], or read host joints
//! through the adapter and build records for export.

pub mod export;
pub mod import;
pub mod options;

use cgmath::{Matrix4, Vector2, Vector3};
use serde::Serialize;

use crate::skin::JointWeights;

pub use export::{export_skeleton, export_skin, finish_static_export};
pub use import::{
    import_skeleton, import_skin, import_static_mesh, resolve_animation, resolve_skeleton,
    template_unused,
};
pub use options::{sibling_skeleton_path, ExportOptions, ImportOptions};

/// A joint as the host reports it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostJoint {
    pub name: String,
    pub transform: Matrix4<f32>,
    /// Position of the parent in the same enumeration.
    pub parent: Option<usize>,
}

/// Triangle mesh handed to the host, in host convention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostMesh {
    pub name: String,
    pub positions: Vec<Vector3<f32>>,
    pub normals: Option<Vec<Vector3<f32>>>,
    pub triangles: Vec<[u32; 3]>,
    /// One UV per triangle corner.
    pub corner_uvs: Vec<[Vector2<f32>; 3]>,
    /// Per triangle, an index into the material ids passed alongside.
    pub triangle_materials: Vec<Option<usize>>,
}

/// Host operations the drivers need.
///
/// Implementations own every host object they create and hand back opaque
/// ids for later calls.
pub trait SceneAdapter {
    type JointId: Copy;
    type MaterialId: Copy;
    type MeshId: Copy;

    fn enumerate_joints(&self) -> Vec<HostJoint>;

    fn create_joint(
        &mut self,
        name: &str,
        transform: Matrix4<f32>,
        parent: Option<Self::JointId>,
    ) -> anyhow::Result<Self::JointId>;

    fn create_material(&mut self, name: &str) -> anyhow::Result<Self::MaterialId>;

    fn create_mesh(
        &mut self,
        mesh: &HostMesh,
        materials: &[Self::MaterialId],
    ) -> anyhow::Result<Self::MeshId>;

    /// `weights[v]` lists `(skeleton index, weight)` for vertex `v`; the
    /// skeleton index selects the id in `joints`.
    fn bind_weights(
        &mut self,
        mesh: Self::MeshId,
        joints: &[Self::JointId],
        weights: &[JointWeights],
    ) -> anyhow::Result<()>;

    /// Marks a joint as a non-selectable template. Hosts without the concept
    /// ignore it.
    fn set_template(&mut self, _joint: Self::JointId) -> anyhow::Result<()> {
        Ok(())
    }
}
