use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use r3d_tools_lib::scene::sibling_skeleton_path;
use r3d_tools_lib::{AnimationClip, FileKind, Skeleton, SkinMesh, StaticMesh};

#[derive(Debug, Default)]
struct Args {
    path: PathBuf,
    json: bool,
    tree: bool,
    bind: bool,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let args = match parse_args(&args) {
        Some(args) => args,
        None => {
            eprintln!("Usage:");
            eprintln!("  r3d-inspect <file> [--json] [--tree] [--bind]");
            eprintln!();
            eprintln!("  --json   dump the decoded record as JSON");
            eprintln!("  --tree   print the bone hierarchy of a skeleton");
            eprintln!("  --bind   bind a skin mesh to the skeleton next to it");
            eprintln!();
            eprintln!("Examples:");
            eprintln!("  r3d-inspect ./annie.skl --tree");
            eprintln!("  r3d-inspect ./annie.skn --bind");
            eprintln!("  RUST_LOG=debug r3d-inspect ./annie_run.anm --json");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args) {
        eprintln!("Inspect failed: {:?}", e);
        std::process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Option<Args> {
    let mut parsed = Args::default();
    let mut path = None;
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--json" => parsed.json = true,
            "--tree" => parsed.tree = true,
            "--bind" => parsed.bind = true,
            flag if flag.starts_with("--") => {
                eprintln!("Unknown flag '{}'", flag);
                return None;
            }
            other => path = Some(PathBuf::from(other)),
        }
    }
    parsed.path = path?;
    Some(parsed)
}

fn run(args: &Args) -> anyhow::Result<()> {
    let bytes = std::fs::read(&args.path)
        .with_context(|| format!("Failed to read '{}'", args.path.display()))?;
    let Some(kind) = FileKind::detect(&bytes) else {
        bail!("'{}' is not a recognised r3d file", args.path.display());
    };
    eprintln!("{}: {:?} ({})", args.path.display(), kind, kind.format());

    let mut cursor = Cursor::new(bytes);
    match kind {
        FileKind::Skeleton | FileKind::RawSkeleton => {
            let skeleton = Skeleton::decode(&mut cursor)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&skeleton)?);
            } else {
                print_skeleton(&skeleton);
            }
            if args.tree {
                skeleton.print_tree()?;
            }
        }
        FileKind::SkinMesh => {
            let mesh = SkinMesh::decode(&mut cursor)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&mesh)?);
            } else {
                print_skin(&mesh);
            }
            if args.bind {
                bind_sibling(&args.path, &mesh)?;
            }
        }
        FileKind::Animation => {
            let clip = AnimationClip::decode(&mut cursor)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&clip)?);
            } else {
                print_animation(&clip);
            }
        }
        FileKind::StaticMeshBinary | FileKind::StaticMeshText => {
            let mesh = if kind == FileKind::StaticMeshBinary {
                StaticMesh::decode_binary(&mut cursor)?
            } else {
                StaticMesh::decode_text(cursor)?
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&mesh)?);
            } else {
                print_static(&mesh);
            }
        }
    }
    Ok(())
}

fn print_skeleton(skeleton: &Skeleton) {
    println!("version: {}", skeleton.version);
    println!("bones: {}", skeleton.bones.len());
    match &skeleton.influence_table {
        Some(table) => println!("influences: {} (explicit)", table.len()),
        None => println!("influences: {} (identity)", skeleton.influences().len()),
    }
    for (i, bone) in skeleton.bones.iter().enumerate() {
        println!("  [{}] {} parent={}", i, bone.name, bone.parent);
    }
}

fn print_skin(mesh: &SkinMesh) {
    println!("version: {}", mesh.version);
    println!("vertices: {}", mesh.vertices.len());
    println!("triangles: {}", mesh.indices.len() / 3);
    if mesh.dropped_indices > 0 {
        println!("dropped triangles: {}", mesh.dropped_indices / 3);
    }
    for material in &mesh.materials {
        println!(
            "  material {} vertices {}+{} indices {}+{}",
            material.name,
            material.start_vertex,
            material.vertex_count,
            material.start_index,
            material.index_count
        );
    }
}

fn print_animation(clip: &AnimationClip) {
    println!("version: {}", clip.version);
    println!("frames: {} at {} fps ({:.2}s)", clip.frame_count, clip.fps, clip.duration_secs());
    println!("tracks: {}", clip.tracks.len());
    for track in &clip.tracks {
        if track.name_hash != 0 {
            println!("  {:#010x}{}", track.name_hash, if track.is_root { " (root)" } else { "" });
        } else {
            println!("  {}{}", track.name, if track.is_root { " (root)" } else { "" });
        }
    }
}

fn print_static(mesh: &StaticMesh) {
    println!("name: {}", mesh.name);
    println!("version: {:#x}", mesh.version);
    println!("vertices: {}", mesh.vertices.len());
    println!("faces: {}", mesh.faces.len());
    if mesh.dropped_faces > 0 {
        println!("dropped faces: {}", mesh.dropped_faces);
    }
    if let Some(bounds) = &mesh.bounds {
        println!(
            "bounds: min ({}, {}, {}) size ({}, {}, {})",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.size.x, bounds.size.y, bounds.size.z
        );
    }
    println!("colors: {}", if mesh.colors.is_some() { "yes" } else { "no" });
    for material in &mesh.materials {
        println!("  material {}", material);
    }
}

fn bind_sibling(skin: &Path, mesh: &SkinMesh) -> anyhow::Result<()> {
    let skl = sibling_skeleton_path(skin);
    let skeleton = Skeleton::from_file(&skl)?;
    let weights = mesh
        .bind_to_skeleton(&skeleton)
        .with_context(|| format!("Failed to bind to '{}'", skl.display()))?;
    let mut used: Vec<usize> = weights.iter().flatten().map(|(joint, _)| *joint).collect();
    used.sort_unstable();
    used.dedup();
    println!("bound to {} ({} joints used)", skl.display(), used.len());
    for joint in used {
        println!("  {}", skeleton.bones[joint].name);
    }
    Ok(())
}
