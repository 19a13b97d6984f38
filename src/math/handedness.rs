//! Mirroring between the file convention and the host convention.
//!
//! The rule mirrors across the YZ plane. Every function here is its own
//! inverse, so the same call converts file data to host data and back.

use cgmath::{Matrix4, Quaternion, Vector3};

/// Records that can be mirrored in place.
pub trait SwitchHand {
    fn switch_hand(&mut self);

    /// Mirrored copy, used by encoders that must not touch the caller's record.
    fn switched(&self) -> Self
    where
        Self: Clone,
    {
        let mut copy = self.clone();
        copy.switch_hand();
        copy
    }
}

pub fn flip_position(v: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(-v.x, v.y, v.z)
}

pub fn flip_normal(n: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(n.x, -n.y, -n.z)
}

pub fn flip_rotation(q: Quaternion<f32>) -> Quaternion<f32> {
    Quaternion::new(q.s, q.v.x, -q.v.y, -q.v.z)
}

/// Conjugates the affine part of `m` by `diag(-1, 1, 1)`.
///
/// For a rigid transform this equals flipping its rotation with
/// [`flip_rotation`] and its translation with [`flip_position`]. The
/// projective row is left untouched.
pub fn flip_transform(m: Matrix4<f32>) -> Matrix4<f32> {
    let mut out = m;
    out.x.y = -m.x.y;
    out.x.z = -m.x.z;
    out.y.x = -m.y.x;
    out.z.x = -m.z.x;
    out.w.x = -m.w.x;
    out
}

impl SwitchHand for Vector3<f32> {
    fn switch_hand(&mut self) {
        *self = flip_position(*self);
    }
}
