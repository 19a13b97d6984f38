// Tests for static mesh decoding, filtering and export preparation

use std::io::Cursor;

use binrw::BinWriterExt;
use r3d_tools_lib::scene::{finish_static_export, ExportOptions};
use r3d_tools_lib::static_mesh::binary::{ScbFaceRecord, ScbHeader, SCB_MAGIC};
use r3d_tools_lib::static_mesh::SCB_VERSION;
use r3d_tools_lib::{CodecError, StaticMesh, Violation};

#[path = "common/mod.rs"]
mod common;

fn face(indices: [i32; 3], material: &str) -> ScbFaceRecord {
    ScbFaceRecord {
        indices,
        material: material.to_string(),
        u: [0.0, 1.0, 0.0],
        v: [0.0, 0.0, 1.0],
    }
}

/// Unbounded, colored scb with three vertices
fn scb_bytes(faces: &[ScbFaceRecord]) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    out.write_le(SCB_MAGIC).unwrap();
    out.write_le(&ScbHeader {
        version: SCB_VERSION,
        name: "fence".to_string(),
        vertex_count_minus_one: 2,
        face_count: faces.len() as i32,
        colored: 1,
    })
    .unwrap();
    for v in [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]] {
        out.write_le(&v).unwrap();
    }
    for f in faces {
        out.write_le(f).unwrap();
    }
    for (i, _) in faces.iter().enumerate() {
        out.write_le(&[[i as u8; 3]; 3]).unwrap();
    }
    out.into_inner()
}

#[test]
fn degenerate_and_dangling_faces_are_dropped() {
    let bytes = scb_bytes(&[
        face([0, 1, 1], "paint"),
        face([0, 1, 2], "wood"),
        face([0, 1, 3], "metal"),
        face([2, 1, 0], "paint"),
    ]);
    let mesh = StaticMesh::decode_binary(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(mesh.dropped_faces, 2);
    assert_eq!(mesh.faces.len(), 2);
    assert_eq!(mesh.faces[0].indices, [0, 1, 2]);
    // materials of dropped faces are never interned
    assert_eq!(mesh.materials, vec!["wood".to_string(), "paint".to_string()]);
    assert_eq!(mesh.faces[1].material, 1);

    let colors = mesh.colors.unwrap();
    assert_eq!(colors.len(), 6);
    assert_eq!(colors[0], [1; 3]);
    assert_eq!(colors[3], [3; 3]);
}

#[test]
fn truncated_face_table_is_reported() {
    let mut bytes = scb_bytes(&[face([0, 1, 2], "wood")]);
    bytes.truncate(bytes.len() - 20);
    let err = StaticMesh::decode_binary(&mut Cursor::new(bytes)).unwrap_err();
    assert!(matches!(err, CodecError::Truncated { .. }));
}

#[test]
fn text_trailing_garbage_is_a_syntax_error() {
    let text = "[ObjectBegin]\nName= fence\nCentralPoint= 0 0 0\nVerts= 3\n\
                0 0 0\n1 0 0\n0 1 0\nFaces= 1\n\
                3 0 1 2 wood 0 0 1 0 0 1\n\
                [Garbage]\n";
    let err = StaticMesh::decode_text(Cursor::new(text)).unwrap_err();
    assert!(matches!(err, CodecError::Syntax { .. }));
}

#[test]
fn export_preparation_adds_bounds_and_colors() {
    let bytes = scb_bytes(&[face([0, 1, 2], "wood")]);
    let mut mesh = StaticMesh::decode_binary(&mut Cursor::new(bytes)).unwrap();
    mesh.colors = None;

    finish_static_export(&mut mesh, &ExportOptions::parse("exportColors=1"));
    assert!(mesh.bounds.is_some());
    assert_eq!(mesh.colors.as_ref().map(Vec::len), Some(3));

    let mut out = Cursor::new(Vec::new());
    mesh.encode_binary(&mut out).unwrap();
    out.set_position(0);
    assert_eq!(StaticMesh::decode_binary(&mut out).unwrap(), mesh);
}

#[test]
fn encode_rejects_unknown_material() {
    let bytes = scb_bytes(&[face([0, 1, 2], "wood")]);
    let mut mesh = StaticMesh::decode_binary(&mut Cursor::new(bytes)).unwrap();
    mesh.faces[0].material = 4;
    let err = mesh.encode_binary(&mut Cursor::new(Vec::new())).unwrap_err();
    assert_eq!(
        err.violation(),
        Some(&Violation::MaterialOutOfRange {
            face: 0,
            material: 4,
            count: 1
        })
    );
}
