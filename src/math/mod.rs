pub mod handedness;

use binrw::binrw;
use cgmath::{Matrix4, Quaternion, Vector2, Vector3};

pub use handedness::SwitchHand;

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct RVector3(
    #[br(map = |raw: [f32; 3]| Vector3::new(raw[0], raw[1], raw[2]))]
    #[bw(map = |v: &Vector3<f32>| [v.x, v.y, v.z])]
    pub Vector3<f32>,
);

impl RVector3 {
    pub fn to_slice(&self) -> [f32; 3] {
        let v = &self.0;
        [v.x, v.y, v.z]
    }
}

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct RVector2(
    #[br(map = |raw: [f32; 2]| Vector2::new(raw[0], raw[1]))]
    #[bw(map = |v: &Vector2<f32>| [v.x, v.y])]
    pub Vector2<f32>,
);

impl Default for RVector2 {
    fn default() -> Self {
        Self(Vector2::new(0.0, 0.0))
    }
}

/// Quaternion stored as `x, y, z, w`.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct RQuaternion(
    #[br(map = |raw: [f32; 4]| Quaternion::new(raw[3], raw[0], raw[1], raw[2]))]
    #[bw(map = |q: &Quaternion<f32>| [q.v.x, q.v.y, q.v.z, q.s])]
    pub Quaternion<f32>,
);

impl RQuaternion {
    pub fn to_slice(&self) -> [f32; 4] {
        let q = &self.0;
        [q.v.x, q.v.y, q.v.z, q.s]
    }
}

/// Bind matrix as stored by skeleton files: the top three rows of a
/// column-vector transform, row-major, translation in the last column.
/// The projective row is not stored and reads back as `(0, 0, 0, 1)`.
#[binrw]
#[derive(Debug, Clone, Copy, PartialEq)]
#[brw(little)]
pub struct RMatrix34(
    #[br(map = |raw: [f32; 12]| Matrix4::new(
        raw[0], raw[4], raw[8], 0.0,
        raw[1], raw[5], raw[9], 0.0,
        raw[2], raw[6], raw[10], 0.0,
        raw[3], raw[7], raw[11], 1.0,
    ))]
    #[bw(map = |m: &Matrix4<f32>| [
        m.x.x, m.y.x, m.z.x, m.w.x,
        m.x.y, m.y.y, m.z.y, m.w.y,
        m.x.z, m.y.z, m.z.z, m.w.z
    ])]
    pub Matrix4<f32>,
);

impl RMatrix34 {
    pub fn to_row_major_slice(&self) -> [f32; 12] {
        let m = &self.0;
        [
            m.x.x, m.y.x, m.z.x, m.w.x, m.x.y, m.y.y, m.z.y, m.w.y, m.x.z, m.y.z, m.z.z, m.w.z,
        ]
    }
}

/// Rigid transform that rotates by `rotation` then translates.
pub fn rigid_transform(rotation: Quaternion<f32>, translation: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_translation(translation) * Matrix4::from(rotation)
}

/// Translation column of a rigid transform.
pub fn translation_of(m: &Matrix4<f32>) -> Vector3<f32> {
    Vector3::new(m.w.x, m.w.y, m.w.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::{BinRead, BinWrite};
    use cgmath::{Deg, InnerSpace, Rotation3};
    use std::io::Cursor;

    #[test]
    fn test_quaternion_file_order_is_xyzw() {
        let bytes: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0]
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect();
        let q = RQuaternion::read_le(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(q.0.s, 4.0);
        assert_eq!(q.0.v, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(q.to_slice(), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matrix34_translation_sits_in_last_column() {
        let raw: [f32; 12] = [1.0, 0.0, 0.0, 5.0, 0.0, 1.0, 0.0, 6.0, 0.0, 0.0, 1.0, 7.0];
        let bytes: Vec<u8> = raw.iter().flat_map(|f| f.to_le_bytes()).collect();
        let m = RMatrix34::read_le(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(translation_of(&m.0), Vector3::new(5.0, 6.0, 7.0));
        assert_eq!(m.0.x.w, 0.0);
        assert_eq!(m.0.w.w, 1.0);

        let mut out = Cursor::new(Vec::new());
        m.write_le(&mut out).unwrap();
        assert_eq!(out.into_inner(), bytes);
        assert_eq!(m.to_row_major_slice(), raw);
    }

    #[test]
    fn test_rigid_transform_rotates_then_translates() {
        let rotation = Quaternion::from_angle_z(Deg(90.0));
        let m = rigid_transform(rotation, Vector3::new(1.0, 2.0, 3.0));
        let p = m * cgmath::Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert!((p.x - 1.0).abs() < 1e-6);
        assert!((p.y - 3.0).abs() < 1e-6);
        assert!((p.z - 3.0).abs() < 1e-6);
        assert!((rotation.magnitude() - 1.0).abs() < 1e-6);
    }
}
