//! Joint hierarchies (`.skl`).
//!
//! Three layouts share one record:
//!
//! * version 1: bone list, identity influence table
//! * version 2: bone list followed by an explicit influence table
//! * version 3: the raw offset-table layout, decode only
//!
//! Decoded skeletons are in host convention. `encode` mirrors a copy back
//! before writing.

pub mod raw;
pub mod skl;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::Context;
use cgmath::Matrix4;
use ptree::{item::StringItem, TreeBuilder};
use serde::Serialize;

use crate::error::{ErrorContext, Format, Result, Violation};
use crate::math::handedness::{flip_transform, SwitchHand};
use crate::primitives::MinLength;

pub const SKL_MAGIC: &[u8; 8] = b"r3d2sklt";
pub const RAW_SKL_MAGIC: u32 = 0x22FD_4FC3;
pub const DESIGNER_ID: u32 = 0x8421_1248;

/// Number of joints a skinned mesh can address.
pub const MAX_INFLUENCES: usize = 68;
pub const BONE_NAME_LEN: usize = 32;
pub const DEFAULT_BONE_SCALE: f32 = 0.1;

const MIN_FILE_LEN: u64 = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone, -1 for roots.
    pub parent: i32,
    pub scale: f32,
    pub transform: Matrix4<f32>,
    pub flags: u32,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: i32, transform: Matrix4<f32>) -> Self {
        Self {
            name: name.into(),
            parent,
            scale: DEFAULT_BONE_SCALE,
            transform,
            flags: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Skeleton {
    pub version: u32,
    pub bones: Vec<Bone>,
    /// Skeleton index for each mesh influence slot. `None` means identity.
    pub influence_table: Option<Vec<u32>>,
}

impl Skeleton {
    pub fn decode<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let ctx = ErrorContext::decode(Format::Skeleton);
        let mut min = MinLength::start(reader, ctx, MIN_FILE_LEN)?;

        let start = reader.stream_position().map_err(|e| ctx.io(e))?;
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic).map_err(|e| ctx.io(e))?;
        reader
            .seek(SeekFrom::Start(start))
            .map_err(|e| ctx.io(e))?;

        let mut skeleton = if &magic == SKL_MAGIC {
            skl::read_list(reader, &mut min)?
        } else if u32::from_le_bytes([magic[4], magic[5], magic[6], magic[7]]) == RAW_SKL_MAGIC {
            log::info!("skeleton uses the raw layout, support for it is in beta");
            raw::read_raw(reader, &mut min)?
        } else {
            return Err(ctx.malformed(format!(
                "unknown skeleton magic {:?}",
                String::from_utf8_lossy(&magic)
            )));
        };

        skeleton.validate(ctx)?;
        skeleton.switch_hand();
        Ok(skeleton)
    }

    /// Writes the version 1 or 2 layout.
    pub fn encode<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let ctx = ErrorContext::encode(Format::Skeleton);
        match self.version {
            1 | 2 => {
                self.validate(ctx)?;
                skl::write_list(&self.switched(), writer)
            }
            version => Err(ctx.unsupported(version)),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open skeleton '{}'", path.display()))?;
        let mut reader = BufReader::new(file);
        Ok(Self::decode(&mut reader)?)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create skeleton '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.encode(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Skeleton index for every influence slot a skinned mesh may use.
    pub fn influences(&self) -> Vec<u32> {
        match &self.influence_table {
            Some(table) => table.clone(),
            None => (0..self.bones.len().min(MAX_INFLUENCES) as u32).collect(),
        }
    }

    pub fn parent_of(&self, bone: usize) -> Option<usize> {
        let parent = self.bones.get(bone)?.parent;
        if parent < 0 || parent as usize == bone {
            None
        } else {
            Some(parent as usize)
        }
    }

    pub fn children_of(&self, bone: usize) -> Vec<usize> {
        (0..self.bones.len())
            .filter(|&i| self.parent_of(i) == Some(bone))
            .collect()
    }

    pub fn roots(&self) -> Vec<usize> {
        (0..self.bones.len())
            .filter(|&i| self.parent_of(i).is_none())
            .collect()
    }

    /// Bones whose parent index is their own index.
    pub fn self_parented(&self) -> Vec<usize> {
        self.bones
            .iter()
            .enumerate()
            .filter(|(i, bone)| bone.parent == *i as i32)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    /// Checks parent links and the influence table.
    ///
    /// A self-parented bone is logged and treated as a root. Out-of-range
    /// parents and parent cycles are fatal.
    pub fn validate(&self, ctx: ErrorContext) -> Result<()> {
        let count = self.bones.len();
        for (i, bone) in self.bones.iter().enumerate() {
            if bone.parent == i as i32 {
                log::warn!("bone {} `{}` is its own parent", i, bone.name);
            } else if bone.parent < -1 || bone.parent >= count as i32 {
                return Err(ctx.violation(Violation::ParentOutOfRange {
                    bone: i,
                    parent: bone.parent,
                    count,
                }));
            }
        }

        for i in 0..count {
            let mut current = self.parent_of(i);
            let mut steps = 0;
            while let Some(parent) = current {
                steps += 1;
                if steps > count {
                    return Err(ctx.violation(Violation::ParentCycle { bone: i }));
                }
                current = self.parent_of(parent);
            }
        }

        if let Some(table) = &self.influence_table {
            if let Some((slot, &bone)) = table
                .iter()
                .enumerate()
                .find(|(_, &bone)| bone as usize >= count)
            {
                return Err(ctx.violation(Violation::InfluenceOutOfRange { slot, bone, count }));
            }
        } else if count > MAX_INFLUENCES && self.version == 1 {
            log::warn!(
                "skeleton is version 1 with {} bones and should be version 2",
                count
            );
        }

        Ok(())
    }

    /// Removes every bone for which `unresolved` returns true.
    ///
    /// Children of a removed bone are attached to their nearest kept
    /// ancestor and the influence table is re-indexed. Bones referenced by
    /// the influence table cannot be removed. Nothing changes on error.
    /// Returns the removed names.
    pub fn remove_bones<F>(&mut self, mut unresolved: F) -> Result<Vec<String>>
    where
        F: FnMut(&Bone) -> bool,
    {
        let ctx = ErrorContext::decode(Format::Skeleton);
        let doomed: Vec<bool> = self.bones.iter().map(&mut unresolved).collect();
        if !doomed.contains(&true) {
            return Ok(Vec::new());
        }

        if let Some(&bone) = self
            .influences()
            .iter()
            .find(|&&bone| doomed.get(bone as usize).copied().unwrap_or(false))
        {
            return Err(ctx.violation(Violation::InfluencedBoneRemoval {
                bone: bone as usize,
                name: self.bones[bone as usize].name.clone(),
            }));
        }

        let mut remap: Vec<Option<usize>> = vec![None; self.bones.len()];
        let mut next = 0;
        for (i, slot) in remap.iter_mut().enumerate() {
            if !doomed[i] {
                *slot = Some(next);
                next += 1;
            }
        }

        let mut parents = Vec::with_capacity(next);
        for (i, bone) in self.bones.iter().enumerate() {
            if doomed[i] {
                continue;
            }
            let parent = if bone.parent == i as i32 {
                remap[i].map_or(-1, |p| p as i32)
            } else {
                let mut ancestor = self.parent_of(i);
                while let Some(a) = ancestor {
                    if !doomed[a] {
                        break;
                    }
                    ancestor = self.parent_of(a);
                }
                ancestor.and_then(|a| remap[a]).map_or(-1, |p| p as i32)
            };
            parents.push(parent);
        }

        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(next);
        for (i, bone) in std::mem::take(&mut self.bones).into_iter().enumerate() {
            if doomed[i] {
                log::warn!("removing unresolved bone `{}`", bone.name);
                removed.push(bone.name);
            } else {
                kept.push(bone);
            }
        }
        for (bone, parent) in kept.iter_mut().zip(parents) {
            bone.parent = parent;
        }
        self.bones = kept;

        if let Some(table) = &mut self.influence_table {
            for entry in table.iter_mut() {
                if let Some(new_index) = remap[*entry as usize] {
                    *entry = new_index as u32;
                }
            }
        }

        Ok(removed)
    }

    /// Leaf bones outside an explicit influence table.
    ///
    /// Hosts use this to template joints that never deform a mesh. Only
    /// version 2 skeletons with an explicit table report anything.
    pub fn unused_leaf_bones(&self) -> Vec<usize> {
        if self.version != 2 {
            return Vec::new();
        }
        let Some(table) = &self.influence_table else {
            return Vec::new();
        };
        (0..self.bones.len())
            .filter(|&i| !table.contains(&(i as u32)))
            .filter(|&i| self.children_of(i).is_empty())
            .collect()
    }

    pub fn tree(&self) -> StringItem {
        let mut tree = TreeBuilder::new("bones".to_string());
        for root in self.roots() {
            self.add_bone_to_tree(root, &mut tree);
        }
        tree.build()
    }

    fn add_bone_to_tree(&self, bone: usize, tree: &mut TreeBuilder) {
        let label = format!("[{}] {}", bone, self.bones[bone].name);
        let children = self.children_of(bone);
        if children.is_empty() {
            tree.add_empty_child(label);
        } else {
            tree.begin_child(label);
            for child in children {
                self.add_bone_to_tree(child, tree);
            }
            tree.end_child();
        }
    }

    pub fn print_tree(&self) -> std::io::Result<()> {
        ptree::print_tree(&self.tree())
    }
}

impl SwitchHand for Bone {
    fn switch_hand(&mut self) {
        self.transform = flip_transform(self.transform);
    }
}

impl SwitchHand for Skeleton {
    fn switch_hand(&mut self) {
        for bone in &mut self.bones {
            bone.switch_hand();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Vector3};

    fn chain(names: &[&str]) -> Skeleton {
        let bones = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                Bone::new(
                    *name,
                    i as i32 - 1,
                    Matrix4::from_translation(Vector3::new(i as f32, 0.0, 0.0)),
                )
            })
            .collect();
        Skeleton {
            version: 1,
            bones,
            influence_table: None,
        }
    }

    #[test]
    fn test_identity_influences_are_capped() {
        let names: Vec<String> = (0..70).map(|i| format!("b{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
        let skeleton = chain(&refs);
        let influences = skeleton.influences();
        assert_eq!(influences.len(), MAX_INFLUENCES);
        assert_eq!(influences[67], 67);
    }

    #[test]
    fn test_self_parent_is_reported_not_an_edge() {
        let mut skeleton = chain(&["root", "spine", "head"]);
        skeleton.bones[2].parent = 2;
        assert!(skeleton
            .validate(ErrorContext::decode(Format::Skeleton))
            .is_ok());
        assert_eq!(skeleton.self_parented(), vec![2]);
        assert_eq!(skeleton.parent_of(2), None);
        assert_eq!(skeleton.roots(), vec![0, 2]);
    }

    #[test]
    fn test_cycle_is_fatal() {
        let mut skeleton = chain(&["a", "b", "c"]);
        skeleton.bones[0].parent = 2;
        let err = skeleton
            .validate(ErrorContext::decode(Format::Skeleton))
            .unwrap_err();
        assert!(matches!(
            err.violation(),
            Some(Violation::ParentCycle { .. })
        ));
    }

    #[test]
    fn test_parent_out_of_range_is_fatal() {
        let mut skeleton = chain(&["a", "b"]);
        skeleton.bones[1].parent = 9;
        let err = skeleton
            .validate(ErrorContext::decode(Format::Skeleton))
            .unwrap_err();
        assert_eq!(
            err.violation(),
            Some(&Violation::ParentOutOfRange {
                bone: 1,
                parent: 9,
                count: 2
            })
        );
    }

    #[test]
    fn test_remove_bones_reattaches_and_is_idempotent() {
        let mut skeleton = chain(&["root", "spine", "neck", "head"]);
        skeleton.version = 2;
        skeleton.influence_table = Some(vec![0, 3]);

        let removed = skeleton.remove_bones(|b| b.name == "spine").unwrap();
        assert_eq!(removed, vec!["spine".to_string()]);
        assert_eq!(skeleton.bones.len(), 3);
        assert_eq!(skeleton.bones[1].name, "neck");
        assert_eq!(skeleton.bones[1].parent, 0);
        assert_eq!(skeleton.bones[2].parent, 1);
        assert_eq!(skeleton.influence_table, Some(vec![0, 2]));

        let again = skeleton.remove_bones(|b| b.name == "spine").unwrap();
        assert!(again.is_empty());
        assert_eq!(skeleton.bones.len(), 3);
    }

    #[test]
    fn test_remove_influenced_bone_is_refused() {
        let mut skeleton = chain(&["root", "spine"]);
        let before = skeleton.clone();
        let err = skeleton.remove_bones(|b| b.name == "spine").unwrap_err();
        assert!(matches!(
            err.violation(),
            Some(Violation::InfluencedBoneRemoval { bone: 1, .. })
        ));
        assert_eq!(skeleton, before);
    }

    #[test]
    fn test_unused_leaf_bones() {
        let mut skeleton = chain(&["root", "spine", "head"]);
        skeleton.bones.push(Bone::new("prop", 0, Matrix4::identity()));
        skeleton.version = 2;
        skeleton.influence_table = Some(vec![0, 1]);
        assert_eq!(skeleton.unused_leaf_bones(), vec![2, 3]);

        skeleton.version = 3;
        assert!(skeleton.unused_leaf_bones().is_empty());

        skeleton.version = 2;
        skeleton.influence_table = None;
        assert!(skeleton.unused_leaf_bones().is_empty());
    }

    #[test]
    fn test_tree_lists_hierarchy() {
        let skeleton = chain(&["root", "spine"]);
        let mut out = Vec::new();
        ptree::write_tree(&skeleton.tree(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("[0] root"));
        assert!(text.contains("[1] spine"));
    }

    #[test]
    fn test_switch_hand_twice_is_identity() {
        let skeleton = chain(&["root", "spine"]);
        assert_eq!(skeleton.switched().switched(), skeleton);
        assert_eq!(skeleton.switched().bones[1].transform.w.x, -1.0);
    }
}
