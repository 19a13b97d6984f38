//! Replaying decoded records into a host.

use anyhow::Context;
use cgmath::{Vector2, Vector3};

use super::{HostMesh, ImportOptions, SceneAdapter};
use crate::animation::AnimationClip;
use crate::skeleton::Skeleton;
use crate::skin::SkinMesh;
use crate::static_mesh::StaticMesh;

/// Creates one joint per bone, parents first.
///
/// Returns the joint id of every bone, by bone index. Self-parented bones
/// are created as roots.
pub fn import_skeleton<A: SceneAdapter>(
    adapter: &mut A,
    skeleton: &Skeleton,
    options: &ImportOptions,
) -> anyhow::Result<Vec<A::JointId>> {
    for bone in skeleton.self_parented() {
        log::warn!(
            "bone {} `{}` is its own parent, importing it as a root",
            bone,
            skeleton.bones[bone].name
        );
    }

    let mut ids: Vec<Option<A::JointId>> = vec![None; skeleton.bones.len()];
    let mut pending: Vec<usize> = skeleton.roots();
    pending.reverse();
    while let Some(bone) = pending.pop() {
        let parent = match skeleton.parent_of(bone) {
            Some(p) => Some(ids[p].context("parent joint was not created")?),
            None => None,
        };
        let b = &skeleton.bones[bone];
        let id = adapter
            .create_joint(&b.name, b.transform, parent)
            .with_context(|| format!("Failed to create joint `{}`", b.name))?;
        ids[bone] = Some(id);
        let mut children = skeleton.children_of(bone);
        children.reverse();
        pending.extend(children);
    }

    let ids = ids
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .context("skeleton has bones outside any root's hierarchy")?;

    if options.template {
        template_unused(adapter, skeleton, &ids)?;
    }
    Ok(ids)
}

/// Templates leaf joints that no mesh influence uses.
pub fn template_unused<A: SceneAdapter>(
    adapter: &mut A,
    skeleton: &Skeleton,
    joints: &[A::JointId],
) -> anyhow::Result<()> {
    for bone in skeleton.unused_leaf_bones() {
        log::debug!("templating unused joint `{}`", skeleton.bones[bone].name);
        adapter.set_template(joints[bone])?;
    }
    Ok(())
}

/// Creates the mesh and its materials, and binds it when a skeleton is given.
///
/// `skeleton` pairs the decoded skeleton with the joint ids returned by
/// [`import_skeleton`].
pub fn import_skin<A: SceneAdapter>(
    adapter: &mut A,
    name: &str,
    mesh: &SkinMesh,
    skeleton: Option<(&Skeleton, &[A::JointId])>,
    options: &ImportOptions,
) -> anyhow::Result<A::MeshId> {
    let uvs: Vec<Vector2<f32>> = mesh
        .vertices
        .iter()
        .map(|v| Vector2::new(v.uv.x, 1.0 - v.uv.y))
        .collect();
    warn_uv_range(name, &uvs);

    let normals = if !options.normals {
        None
    } else if !mesh.has_shared_vertices() {
        log::warn!("`{}` has no shared vertices, skipping normals", name);
        None
    } else {
        Some(mesh.vertices.iter().map(|v| v.normal).collect())
    };

    let triangles: Vec<[u32; 3]> = mesh
        .indices
        .chunks_exact(3)
        .map(|t| [t[0] as u32, t[1] as u32, t[2] as u32])
        .collect();
    let mut triangle_materials = vec![None; triangles.len()];
    for (m, material) in mesh.materials.iter().enumerate() {
        let first = material.start_index as usize / 3;
        let count = material.index_count as usize / 3;
        for slot in triangle_materials.iter_mut().skip(first).take(count) {
            *slot = Some(m);
        }
    }

    let materials = mesh
        .materials
        .iter()
        .map(|m| adapter.create_material(&m.name))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let host_mesh = HostMesh {
        name: name.to_string(),
        positions: mesh.vertices.iter().map(|v| v.position).collect(),
        normals,
        corner_uvs: triangles
            .iter()
            .map(|t| t.map(|i| uvs[i as usize]))
            .collect(),
        triangles,
        triangle_materials,
    };
    let id = adapter
        .create_mesh(&host_mesh, &materials)
        .with_context(|| format!("Failed to create mesh `{}`", name))?;

    if let Some((skeleton, joints)) = skeleton {
        let weights = mesh.bind_to_skeleton(skeleton)?;
        adapter.bind_weights(id, joints, &weights)?;
    }
    Ok(id)
}

/// Creates a static mesh with one material per face group.
///
/// Vertices are placed relative to the mesh origin.
pub fn import_static_mesh<A: SceneAdapter>(
    adapter: &mut A,
    mesh: &StaticMesh,
) -> anyhow::Result<A::MeshId> {
    let corner_uvs: Vec<[Vector2<f32>; 3]> = mesh
        .faces
        .iter()
        .map(|f| f.uvs.map(|uv| Vector2::new(uv.x, 1.0 - uv.y)))
        .collect();
    let flat: Vec<Vector2<f32>> = corner_uvs.iter().flatten().copied().collect();
    warn_uv_range(&mesh.name, &flat);

    let materials = mesh
        .materials
        .iter()
        .map(|m| adapter.create_material(m))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let origin: Vector3<f32> = mesh.origin;
    let host_mesh = HostMesh {
        name: mesh.name.clone(),
        positions: mesh.vertices.iter().map(|v| *v - origin).collect(),
        normals: None,
        triangles: mesh.faces.iter().map(|f| f.indices).collect(),
        corner_uvs,
        triangle_materials: mesh.faces.iter().map(|f| Some(f.material)).collect(),
    };
    adapter
        .create_mesh(&host_mesh, &materials)
        .with_context(|| format!("Failed to create mesh `{}`", mesh.name))
}

/// Drops tracks without a host joint and returns the joint index, in
/// enumeration order, driven by each remaining track.
pub fn resolve_animation<A: SceneAdapter>(adapter: &A, clip: &mut AnimationClip) -> Vec<usize> {
    let names: Vec<String> = adapter
        .enumerate_joints()
        .into_iter()
        .map(|j| j.name)
        .collect();
    clip.retain_resolved(&names)
}

/// Removes bones the host does not have, matching names case-insensitively.
pub fn resolve_skeleton<A: SceneAdapter>(
    adapter: &A,
    skeleton: &mut Skeleton,
) -> anyhow::Result<Vec<String>> {
    let names: Vec<String> = adapter
        .enumerate_joints()
        .into_iter()
        .map(|j| j.name.to_lowercase())
        .collect();
    let removed = skeleton.remove_bones(|b| !names.contains(&b.name.to_lowercase()))?;
    Ok(removed)
}

fn warn_uv_range(name: &str, uvs: &[Vector2<f32>]) {
    let outside = uvs
        .iter()
        .filter(|uv| !(0.0..=1.0).contains(&uv.x) || !(0.0..=1.0).contains(&uv.y))
        .count();
    if outside > 0 {
        log::warn!(
            "`{}` has {} uv(s) outside [0, 1], textures may not map as expected",
            name,
            outside
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{name_hash, BoneTrack};
    use crate::scene::tests::MemoryScene;
    use crate::skeleton::Bone;
    use crate::skin::{SkinMaterial, SkinVertex};
    use crate::static_mesh::StaticFace;
    use cgmath::{Matrix4, SquareMatrix};

    fn skeleton() -> Skeleton {
        // bone 0 is a child of bone 2, so creation order differs from index order
        Skeleton {
            version: 2,
            bones: vec![
                Bone::new("hand", 2, Matrix4::identity()),
                Bone::new("prop", 3, Matrix4::identity()),
                Bone::new("arm", 3, Matrix4::identity()),
                Bone::new("root", -1, Matrix4::identity()),
            ],
            influence_table: Some(vec![3, 2, 0]),
        }
    }

    fn skin() -> SkinMesh {
        let vertex = |x: f32, slot: u8| SkinVertex {
            position: Vector3::new(x, 0.0, 0.0),
            influences: [slot, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
            normal: Vector3::new(0.0, 1.0, 0.0),
            uv: Vector2::new(0.5, 0.25),
        };
        SkinMesh {
            version: 1,
            materials: vec![SkinMaterial {
                name: "body".into(),
                start_vertex: 0,
                vertex_count: 3,
                start_index: 0,
                index_count: 3,
            }],
            indices: vec![0, 1, 2],
            vertices: vec![vertex(0.0, 0), vertex(1.0, 1), vertex(2.0, 2)],
            reserved: [0; 3],
            dropped_indices: 0,
        }
    }

    #[test]
    fn test_parents_are_created_first() {
        let mut scene = MemoryScene::default();
        let ids = import_skeleton(&mut scene, &skeleton(), &ImportOptions::default()).unwrap();
        assert_eq!(scene.joints[ids[3]].name, "root");
        assert_eq!(scene.joints[ids[0]].parent, Some(ids[2]));
        assert_eq!(scene.joints[ids[2]].parent, Some(ids[3]));
        assert_eq!(ids[3], 0);
        assert!(scene.templated.is_empty());
    }

    #[test]
    fn test_template_marks_unused_leaves() {
        let mut scene = MemoryScene::default();
        let options = ImportOptions {
            template: true,
            ..ImportOptions::default()
        };
        let ids = import_skeleton(&mut scene, &skeleton(), &options).unwrap();
        assert_eq!(scene.templated, vec![ids[1]]);

        let mut raw = skeleton();
        raw.version = 3;
        let mut scene = MemoryScene::default();
        import_skeleton(&mut scene, &raw, &options).unwrap();
        assert!(scene.templated.is_empty());
    }

    #[test]
    fn test_import_skin_binds_and_flips_v() {
        let skeleton = skeleton();
        let mut scene = MemoryScene::default();
        let joints = import_skeleton(&mut scene, &skeleton, &ImportOptions::default()).unwrap();
        let options = ImportOptions {
            import_skl: true,
            ..ImportOptions::default()
        };
        import_skin(&mut scene, "body", &skin(), Some((&skeleton, &joints)), &options).unwrap();

        let (mesh, materials) = &scene.meshes[0];
        assert_eq!(scene.materials, vec!["body".to_string()]);
        assert_eq!(materials, &vec![0]);
        assert_eq!(mesh.corner_uvs[0][0], Vector2::new(0.5, 0.75));
        assert_eq!(mesh.triangle_materials, vec![Some(0)]);
        // one triangle over three vertices: normals are skipped
        assert!(mesh.normals.is_none());

        let (_, bound_joints, weights) = &scene.bindings[0];
        assert_eq!(bound_joints, &joints);
        assert_eq!(weights[1], vec![(2, 1.0)]);
        assert_eq!(weights[2], vec![(0, 1.0)]);
    }

    #[test]
    fn test_static_mesh_is_placed_relative_to_origin() {
        let mut mesh = StaticMesh::new("rock");
        mesh.origin = Vector3::new(1.0, 0.0, 0.0);
        mesh.vertices = vec![
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ];
        mesh.materials = vec!["stone".into()];
        mesh.faces = vec![StaticFace {
            indices: [0, 1, 2],
            material: 0,
            uvs: [Vector2::new(0.0, 0.0); 3],
        }];
        let mut scene = MemoryScene::default();
        import_static_mesh(&mut scene, &mesh).unwrap();
        let (host, _) = &scene.meshes[0];
        assert_eq!(host.positions[1], Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(host.corner_uvs[0][0], Vector2::new(0.0, 1.0));
    }

    #[test]
    fn test_resolve_against_host_joints() {
        let mut scene = MemoryScene::default();
        import_skeleton(&mut scene, &skeleton(), &ImportOptions::default()).unwrap();

        let mut clip = AnimationClip {
            version: 4,
            frame_count: 0,
            fps: 30.0,
            tracks: vec![
                BoneTrack {
                    name: String::new(),
                    name_hash: name_hash("arm"),
                    is_root: false,
                    poses: Vec::new(),
                },
                BoneTrack {
                    name: String::new(),
                    name_hash: name_hash("tail"),
                    is_root: false,
                    poses: Vec::new(),
                },
            ],
        };
        let joints = resolve_animation(&scene, &mut clip);
        assert_eq!(clip.tracks.len(), 1);
        assert_eq!(scene.joints[joints[0]].name, "arm");

        let mut other = skeleton();
        other.influence_table = Some(vec![3]);
        other.bones.push(Bone::new("Extra", 3, Matrix4::identity()));
        let removed = resolve_skeleton(&scene, &mut other).unwrap();
        assert_eq!(removed, vec!["Extra".to_string()]);
        assert_eq!(other.bones.len(), 4);
    }
}
