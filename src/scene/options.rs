//! Translator option strings, `key=value;key=value`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportOptions {
    /// Load the sibling skeleton and bind the mesh to it.
    pub import_skl: bool,
    /// Template leaf joints that no mesh influence uses.
    pub template: bool,
    /// Import vertex normals.
    pub normals: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            import_skl: false,
            template: false,
            normals: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExportOptions {
    /// Write per-corner colors into binary static meshes.
    pub export_colors: bool,
}

impl ImportOptions {
    pub fn parse(options: &str) -> Self {
        let mut parsed = Self::default();
        for (key, value) in pairs(options) {
            match key {
                "importSkl" => parsed.import_skl = value,
                "template" => parsed.template = value,
                "normals" => parsed.normals = value,
                other => log::debug!("ignoring import option `{}`", other),
            }
        }
        parsed
    }
}

impl ExportOptions {
    pub fn parse(options: &str) -> Self {
        let mut parsed = Self::default();
        for (key, value) in pairs(options) {
            match key {
                "exportColors" => parsed.export_colors = value,
                other => log::debug!("ignoring export option `{}`", other),
            }
        }
        parsed
    }
}

/// Boolean `key=value` pairs; entries without a value are skipped.
fn pairs(options: &str) -> impl Iterator<Item = (&str, bool)> {
    options.split(';').filter_map(|entry| {
        let (key, value) = entry.split_once('=')?;
        let value = value.trim().parse::<u32>().map_or(false, |v| v != 0);
        Some((key.trim(), value))
    })
}

/// Skeleton stored next to a skin mesh, `body.skn` -> `body.skl`.
pub fn sibling_skeleton_path(skin: impl AsRef<Path>) -> PathBuf {
    skin.as_ref().with_extension("skl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_options() {
        let options = ImportOptions::parse("importSkl=1;template=0;normals=0;bogus=1;template");
        assert_eq!(
            options,
            ImportOptions {
                import_skl: true,
                template: false,
                normals: false,
            }
        );
        assert_eq!(ImportOptions::parse(""), ImportOptions::default());
    }

    #[test]
    fn test_non_numeric_value_is_false() {
        assert!(!ImportOptions::parse("importSkl=yes").import_skl);
        assert!(ExportOptions::parse("exportColors=2").export_colors);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ImportOptions = serde_json::from_str(r#"{"importSkl": true}"#).unwrap();
        assert!(options.import_skl);
        assert!(options.normals);
    }

    #[test]
    fn test_sibling_skeleton_path() {
        assert_eq!(
            sibling_skeleton_path("chars/annie.skn"),
            PathBuf::from("chars/annie.skl")
        );
    }
}
