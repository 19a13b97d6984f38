//! Building records from host objects.

use anyhow::{bail, Context};

use super::{ExportOptions, SceneAdapter};
use crate::skeleton::{Bone, Skeleton, MAX_INFLUENCES};
use crate::skin::{SkinMesh, SourceMesh};
use crate::static_mesh::{StaticMesh, SCB_VERSION_BOUNDS};

/// Dumps the host joints, in enumeration order, into a skeleton.
///
/// Every parent must be enumerated before its children.
pub fn export_skeleton<A: SceneAdapter>(adapter: &A) -> anyhow::Result<Skeleton> {
    let joints = adapter.enumerate_joints();
    let mut bones = Vec::with_capacity(joints.len());
    for (i, joint) in joints.iter().enumerate() {
        let parent = match joint.parent {
            Some(p) if p >= i => bail!(
                "joint `{}`: parent is not upper in hierarchy",
                joint.name
            ),
            Some(p) => p as i32,
            None => -1,
        };
        bones.push(Bone::new(joint.name.clone(), parent, joint.transform));
    }

    let version = if bones.len() > MAX_INFLUENCES { 2 } else { 1 };
    log::debug!("exporting {} joints as skeleton version {}", bones.len(), version);
    Ok(Skeleton {
        version,
        bones,
        influence_table: None,
    })
}

/// Exports the host skeleton and a skin mesh bound to it.
///
/// The returned skeleton's version and influence table match the slots
/// written into the mesh.
pub fn export_skin<A: SceneAdapter>(
    adapter: &A,
    source: &SourceMesh,
) -> anyhow::Result<(Skeleton, SkinMesh)> {
    let mut skeleton = export_skeleton(adapter)?;
    let mesh = SkinMesh::from_source(source, &mut skeleton)
        .context("Failed to build skin mesh from host geometry")?;
    Ok((skeleton, mesh))
}

/// Prepares a host-built static mesh for writing.
///
/// Bounds are recomputed and the version set to the bounded one. Colors are
/// kept only when `exportColors` is on, white-filled when missing.
pub fn finish_static_export(mesh: &mut StaticMesh, options: &ExportOptions) {
    mesh.version = SCB_VERSION_BOUNDS;
    mesh.bounds = mesh.compute_bounds();
    if options.export_colors {
        let expected = mesh.faces.len() * 3;
        let colors = mesh.colors.get_or_insert_with(Vec::new);
        if colors.len() != expected {
            log::warn!(
                "`{}` has {} corner colors for {} corners, filling with white",
                mesh.name,
                colors.len(),
                expected
            );
            colors.resize(expected, [255; 3]);
        }
    } else {
        mesh.colors = None;
    }
}
