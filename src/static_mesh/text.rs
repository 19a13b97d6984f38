//! Text static meshes (`.sco`).
//!
//! ```text
//! [ObjectBegin]
//! Name= crate_lid
//! CentralPoint= 0.0000 0.0000 0.0000
//! PivotPoint= 0.0000 0.0000 0.0000        (optional)
//! Verts= 3
//! x y z                                   (one line per vertex)
//! Faces= 1
//! 3<TAB>i0i1i2<TAB>material<TAB>u0 v0 u1 v1 u2 v2
//! [ObjectEnd]
//! ```
//!
//! Keys compare case-insensitively. Indices are right-aligned to 5
//! columns and material names to 20.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use cgmath::{Vector2, Vector3};

use super::{collect_faces, RawFace, StaticMesh, SCB_VERSION_BOUNDS};
use crate::error::{ErrorContext, Format, Result};
use crate::math::handedness::SwitchHand;
use crate::primitives::text::{first_token, LineReader};
use crate::primitives::truncate_str;

pub const OBJECT_BEGIN: &str = "[ObjectBegin]";
pub const OBJECT_END: &str = "[ObjectEnd]";
pub const MAX_NAME_CHARS: usize = 127;
pub const MAX_MATERIAL_CHARS: usize = 80;

impl StaticMesh {
    pub fn decode_text<R: BufRead>(reader: R) -> Result<Self> {
        let ctx = ErrorContext::decode(Format::StaticMeshText);
        let mut lines = LineReader::new(reader, Format::StaticMeshText);

        let first = lines.try_next_line()?.unwrap_or_default();
        let starts_with_begin = first
            .get(..OBJECT_BEGIN.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(OBJECT_BEGIN));
        if !starts_with_begin {
            return Err(ctx.malformed(format!("expected `{}`", OBJECT_BEGIN)));
        }

        let name = lines.keyed("Name=")?.join(" ");
        let origin = read_point(&mut lines, "CentralPoint=")?;

        let mut line = lines.next_line()?;
        let pivot = if first_token(&line).is_some_and(|t| t.eq_ignore_ascii_case("PivotPoint=")) {
            let tokens = lines.expect_key(&line, "PivotPoint=")?;
            let pivot = parse_point(&lines, &tokens)?;
            line = lines.next_line()?;
            Some(pivot)
        } else {
            None
        };

        let tokens = lines.expect_key(&line, "Verts=")?;
        let vertex_count: usize = lines.parse(tokens.first().map(String::as_str), "vertex count")?;
        // counts are untrusted, the body grows line by line
        let mut vertices = Vec::new();
        for _ in 0..vertex_count {
            let line = lines.next_line()?;
            let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            vertices.push(parse_point(&lines, &tokens)?);
        }

        let tokens = lines.keyed("Faces=")?;
        let face_count: usize = lines.parse(tokens.first().map(String::as_str), "face count")?;
        let mut raw_faces = Vec::new();
        for _ in 0..face_count {
            let line = lines.next_line()?;
            raw_faces.push(parse_face(&lines, &line)?);
        }

        if let Some(line) = lines.try_next_line()? {
            if !first_token(&line).is_some_and(|t| t.eq_ignore_ascii_case(OBJECT_END)) {
                return Err(lines.syntax(format!("expected `{}`", OBJECT_END)));
            }
        }

        let set = collect_faces(raw_faces, vertices.len());
        let mut mesh = StaticMesh {
            version: SCB_VERSION_BOUNDS,
            name,
            origin,
            pivot,
            bounds: None,
            vertices,
            faces: set.faces,
            materials: set.materials,
            colors: None,
            dropped_faces: set.dropped,
        };
        mesh.switch_hand();
        Ok(mesh)
    }

    pub fn encode_text<W: Write>(&self, writer: &mut W) -> Result<()> {
        let ctx = ErrorContext::encode(Format::StaticMeshText);
        self.validate(ctx)?;
        let file = self.switched();
        file.write_lines(writer).map_err(|e| ctx.io(e))
    }

    fn write_lines<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        writeln!(w, "{}", OBJECT_BEGIN)?;
        if self.name.chars().count() > MAX_NAME_CHARS {
            log::warn!("mesh name truncated to {} characters", MAX_NAME_CHARS);
        }
        writeln!(w, "Name= {}", truncate_chars(&self.name, MAX_NAME_CHARS))?;
        let o = self.origin;
        writeln!(w, "CentralPoint= {:.4} {:.4} {:.4}", o.x, o.y, o.z)?;
        if let Some(p) = self.pivot {
            writeln!(w, "PivotPoint= {:.4} {:.4} {:.4}", p.x, p.y, p.z)?;
        }

        writeln!(w, "Verts= {}", self.vertices.len())?;
        for v in &self.vertices {
            writeln!(w, "{:.4} {:.4} {:.4}", v.x, v.y, v.z)?;
        }

        writeln!(w, "Faces= {}", self.faces.len())?;
        for face in &self.faces {
            let [i0, i1, i2] = face.indices;
            let material = truncate_chars(&self.materials[face.material], MAX_MATERIAL_CHARS);
            let [a, b, c] = face.uvs;
            writeln!(
                w,
                "3\t{:>5}{:>5}{:>5}\t{:>20}\t{:.14} {:.14} {:.14} {:.14} {:.14} {:.14}",
                i0, i1, i2, material, a.x, a.y, b.x, b.y, c.x, c.y
            )?;
        }
        writeln!(w, "{}", OBJECT_END)
    }

    pub fn from_sco_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open static mesh '{}'", path.display()))?;
        Ok(Self::decode_text(BufReader::new(file))?)
    }

    pub fn to_sco_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create static mesh '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);
        self.encode_text(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((end, _)) => truncate_str(s, end),
        None => s,
    }
}

fn read_point<R: BufRead>(lines: &mut LineReader<R>, key: &str) -> Result<Vector3<f32>> {
    let tokens = lines.keyed(key)?;
    parse_point(lines, &tokens)
}

fn parse_point<R: BufRead>(lines: &LineReader<R>, tokens: &[String]) -> Result<Vector3<f32>> {
    let mut it = tokens.iter().map(String::as_str);
    Ok(Vector3::new(
        lines.parse(it.next(), "x")?,
        lines.parse(it.next(), "y")?,
        lines.parse(it.next(), "z")?,
    ))
}

fn parse_face<R: BufRead>(lines: &LineReader<R>, line: &str) -> Result<RawFace> {
    let mut it = line.split([' ', '\t']).filter(|t| !t.is_empty());
    let corners: i32 = lines.parse(it.next(), "corner count")?;
    if corners != 3 {
        return Err(lines.syntax(format!("face has {} corners, only triangles are supported", corners)));
    }
    let indices = [
        lines.parse(it.next(), "index")?,
        lines.parse(it.next(), "index")?,
        lines.parse(it.next(), "index")?,
    ];
    let material = it
        .next()
        .ok_or_else(|| lines.syntax("missing material"))?
        .to_string();
    let mut uvs = [Vector2::new(0.0, 0.0); 3];
    for uv in &mut uvs {
        uv.x = lines.parse(it.next(), "u")?;
        uv.y = lines.parse(it.next(), "v")?;
    }
    Ok(RawFace {
        indices,
        material,
        uvs,
        colors: None,
    })
}
