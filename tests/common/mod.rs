// Common test utilities and helpers
#![allow(dead_code)]

use std::io::Cursor;

use binrw::BinWriterExt;
use cgmath::{Matrix4, SquareMatrix, Vector2, Vector3};
use r3d_tools_lib::animation::raw::{RawAnmHeader, RAW_ANM_MAGIC, RAW_HEADER_END};
use r3d_tools_lib::skeleton::Bone;
use r3d_tools_lib::skin::{SkinMaterial, SkinVertex, SKN_MAGIC};
use r3d_tools_lib::Skeleton;

/// Skeleton of `count` bones where each bone is the child of the previous one
pub fn chain_skeleton(count: usize) -> Skeleton {
    Skeleton {
        version: if count > 68 { 2 } else { 1 },
        bones: (0..count)
            .map(|i| {
                let transform = Matrix4::from_translation(Vector3::new(0.0, i as f32, 0.5));
                Bone::new(format!("bone_{:02}", i), i as i32 - 1, transform)
            })
            .collect(),
        influence_table: None,
    }
}

/// Skeleton whose bones all hang off a single root
pub fn flat_skeleton(names: &[&str]) -> Skeleton {
    Skeleton {
        version: 1,
        bones: names
            .iter()
            .enumerate()
            .map(|(i, name)| Bone::new(*name, if i == 0 { -1 } else { 0 }, Matrix4::identity()))
            .collect(),
        influence_table: None,
    }
}

pub fn skin_vertex(position: [f32; 3], influences: [u8; 4], weights: [f32; 4]) -> SkinVertex {
    SkinVertex {
        position: Vector3::from(position),
        influences,
        weights,
        normal: Vector3::new(0.0, 0.0, 1.0),
        uv: Vector2::new(0.25, 0.5),
    }
}

pub fn material(name: &str, vertices: (u32, u32), indices: (u32, u32)) -> SkinMaterial {
    SkinMaterial {
        name: name.to_string(),
        start_vertex: vertices.0,
        vertex_count: vertices.1,
        start_index: indices.0,
        index_count: indices.1,
    }
}

/// Version 1 skin file with one material spanning everything
pub fn skn_v1_bytes(indices: &[u16], vertices: &[[f32; 3]]) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    out.write_le(&SKN_MAGIC).unwrap();
    out.write_le(&1u16).unwrap();
    out.write_le(&1u16).unwrap();

    out.write_le(&1u32).unwrap();
    let mut name = [0u8; 64];
    name[..4].copy_from_slice(b"body");
    out.write_le(&name).unwrap();
    out.write_le(&0i32).unwrap();
    out.write_le(&(vertices.len() as i32)).unwrap();
    out.write_le(&0i32).unwrap();
    out.write_le(&(indices.len() as i32)).unwrap();

    out.write_le(&(indices.len() as i32)).unwrap();
    out.write_le(&(vertices.len() as i32)).unwrap();
    for index in indices {
        out.write_le(index).unwrap();
    }
    for position in vertices {
        out.write_le(position).unwrap();
        out.write_le(&[0u8; 4]).unwrap();
        out.write_le(&[1.0f32, 0.0, 0.0, 0.0]).unwrap();
        out.write_le(&[0.0f32, 1.0, 0.0]).unwrap();
        out.write_le(&[0.5f32, 0.5]).unwrap();
    }
    out.into_inner()
}

/// Version 4 clip, one frame, every bone at pose 0
pub fn anm_v4_bytes(fps: f32, hashes: &[u32]) -> Vec<u8> {
    let positions_offset = (RAW_HEADER_END - 12) as i32;
    let quaternions_offset = positions_offset + 12;
    let frames_offset = quaternions_offset + 16;
    let data_size = frames_offset as u32 + 12 * hashes.len() as u32;

    let mut out = Cursor::new(Vec::new());
    out.write_le(b"r3d2anmd").unwrap();
    out.write_le(&4i32).unwrap();
    out.write_le(&RawAnmHeader {
        data_size,
        magic: RAW_ANM_MAGIC,
        bone_count: hashes.len() as i32,
        frame_count: 1,
        fps,
        positions_offset,
        quaternions_offset,
        frames_offset,
        ..Default::default()
    })
    .unwrap();
    out.write_le(&[0.0f32, 1.0, 0.0]).unwrap();
    out.write_le(&[0.0f32, 0.0, 0.0, 1.0]).unwrap();
    for hash in hashes {
        out.write_le(hash).unwrap();
        out.write_le(&[0u16; 4]).unwrap();
    }
    out.into_inner()
}
