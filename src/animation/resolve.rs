//! Matching tracks to host joints.

use super::{name_hash, AnimationClip, BoneTrack};

impl BoneTrack {
    /// Index of the joint in `joints` this track drives.
    ///
    /// Hashed tracks try the joint name as written, then lowercased. Named
    /// tracks try an exact match, then a case-insensitive one. A track with
    /// neither drives nothing.
    pub fn find_joint<S: AsRef<str>>(&self, joints: &[S]) -> Option<usize> {
        if self.name_hash != 0 {
            joints
                .iter()
                .position(|j| name_hash(j.as_ref()) == self.name_hash)
                .or_else(|| {
                    joints
                        .iter()
                        .position(|j| name_hash(&j.as_ref().to_lowercase()) == self.name_hash)
                })
        } else if self.name.is_empty() {
            None
        } else {
            joints
                .iter()
                .position(|j| j.as_ref() == self.name)
                .or_else(|| {
                    let lower = self.name.to_lowercase();
                    joints
                        .iter()
                        .position(|j| j.as_ref().to_lowercase() == lower)
                })
        }
    }

    fn label(&self) -> String {
        if self.name_hash != 0 {
            format!("hash {:#010x}", self.name_hash)
        } else {
            format!("`{}`", self.name)
        }
    }
}

impl AnimationClip {
    /// Joint index for every track, `None` where no joint matches.
    pub fn resolve_tracks<S: AsRef<str>>(&self, joints: &[S]) -> Vec<Option<usize>> {
        self.tracks.iter().map(|t| t.find_joint(joints)).collect()
    }

    /// Drops tracks that match no joint and returns the joint index of each
    /// remaining track, in track order.
    pub fn retain_resolved<S: AsRef<str>>(&mut self, joints: &[S]) -> Vec<usize> {
        let mut resolved = Vec::with_capacity(self.tracks.len());
        let mut i = 0;
        while i < self.tracks.len() {
            match self.tracks[i].find_joint(joints) {
                Some(joint) => {
                    resolved.push(joint);
                    i += 1;
                }
                None => {
                    let track = self.tracks.remove(i);
                    log::warn!("no joint found for track {}", track.label());
                }
            }
        }

        if self.tracks.len() <= 1 {
            log::warn!(
                "only {} track(s) matched the rig, wrong animation for this rig?",
                self.tracks.len()
            );
        }
        resolved
    }
}
