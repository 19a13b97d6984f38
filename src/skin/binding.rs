//! Influence slots to skeleton joints.

use super::SkinMesh;
use crate::error::{ErrorContext, Format, Result, Violation};
use crate::skeleton::Skeleton;

/// Normalized `(joint, weight)` pairs for one vertex.
pub type JointWeights = Vec<(usize, f32)>;

impl SkinMesh {
    /// Resolves every vertex's influence slots against `skeleton`.
    ///
    /// Zero-weight slots are ignored. Slots that resolve to the same joint are
    /// merged. The returned weights of each vertex sum to 1.
    pub fn bind_to_skeleton(&self, skeleton: &Skeleton) -> Result<Vec<JointWeights>> {
        let ctx = ErrorContext::decode(Format::SkinMesh);
        let table = skeleton.influences();
        let joint_count = skeleton.bones.len();

        self.vertices
            .iter()
            .enumerate()
            .map(|(v, vertex)| {
                let mut joints: JointWeights = Vec::with_capacity(4);
                for (&slot, &weight) in vertex.influences.iter().zip(&vertex.weights) {
                    if weight == 0.0 {
                        continue;
                    }
                    let slot = slot as usize;
                    let joint = *table.get(slot).ok_or_else(|| {
                        ctx.violation(Violation::InfluenceSlotOutOfRange {
                            vertex: v,
                            slot,
                            len: table.len(),
                        })
                    })? as usize;
                    if joint >= joint_count {
                        return Err(ctx.violation(Violation::UnresolvedJoint(format!(
                            "skeleton index {}",
                            joint
                        ))));
                    }
                    match joints.iter_mut().find(|(j, _)| *j == joint) {
                        Some((_, w)) => *w += weight,
                        None => joints.push((joint, weight)),
                    }
                }

                let sum: f32 = joints.iter().map(|(_, w)| w).sum();
                if sum == 0.0 {
                    return Err(ctx.violation(Violation::ZeroWeightSum { vertex: v }));
                }
                for (_, w) in &mut joints {
                    *w /= sum;
                }
                Ok(joints)
            })
            .collect()
    }
}
