//! Packaging metadata from `pyproject.toml`.
//!
//! The build tool owns the metadata; this only reads `[project].name` and
//! `[project].version` to label runs and to recognize which artifacts in the
//! output directory belong to the current version.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;

#[derive(Debug, Deserialize)]
struct PyProject {
    project: Option<ProjectTable>,
}

#[derive(Debug, Deserialize)]
struct ProjectTable {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    dynamic: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub dynamic_version: bool,
}

/// Archive suffixes an sdist can carry after its version.
const SDIST_SUFFIXES: &[&str] = &[".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".zip"];

impl PackageMetadata {
    /// Whether `filename` is an artifact of this package's current version.
    /// Always true when the version is dynamic or unknown.
    ///
    /// Names compare after wheel-name normalization and versions after PEP 440
    /// normalization, so `zwishh-sdk-0.3.1.tar.gz` belongs to `zwishh-sdk 0.3.1`
    /// and `pkg-1.0.0rc1-py3-none-any.whl` to `pkg 1.0.0-rc1`.
    pub fn owns_artifact(&self, filename: &str) -> bool {
        let Some(version) = &self.version else {
            return true;
        };
        let wanted_name = normalize_name(&self.name);
        let wanted_version = normalize_version(version);

        filename
            .match_indices('-')
            .filter(|(i, _)| normalize_name(&filename[..*i]) == wanted_name)
            .filter_map(|(i, _)| artifact_version(&filename[i + 1..]))
            .any(|found| normalize_version(found) == wanted_version)
    }
}

/// Version segment of what follows `<name>-` in a wheel or sdist filename.
fn artifact_version(rest: &str) -> Option<&str> {
    let segment = rest.split('-').next()?;
    let version = SDIST_SUFFIXES
        .iter()
        .find_map(|suffix| segment.strip_suffix(suffix))
        .unwrap_or(segment);
    (!version.is_empty()).then_some(version)
}

/// Wheel/sdist filename form of a project name: runs of `-`, `_`, `.` become `_`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('_');
            }
            last_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        }
    }
    out
}

/// Comparison form of a version under PEP 440 normalization: lowercase, no leading `v`, canonical
/// pre/post/dev tags (`alpha` -> `a`, `beta` -> `b`, `c`/`pre`/`preview` -> `rc`,
/// `r`/`rev` -> `post`) with no separator before a tag or between a tag and
/// its number. A local segment (`+ubuntu-1`) keeps `.` as its only separator.
pub fn normalize_version(version: &str) -> String {
    let lowered = version.trim().to_lowercase();
    let lowered = lowered.strip_prefix('v').unwrap_or(&lowered);
    let (public, local) = match lowered.split_once('+') {
        Some((public, local)) => (public, Some(local)),
        None => (lowered, None),
    };

    let mut out = String::with_capacity(lowered.len());
    let mut pending_sep: Option<char> = None;
    let mut chars = public.chars().peekable();

    while let Some(c) = chars.next() {
        if matches!(c, '-' | '_' | '.') {
            pending_sep = Some(c);
            continue;
        }

        if c.is_ascii_alphabetic() {
            let mut word = String::from(c);
            while let Some(&next) = chars.peek() {
                if !next.is_ascii_alphabetic() {
                    break;
                }
                word.push(next);
                chars.next();
            }
            let tag = match word.as_str() {
                "alpha" => "a",
                "beta" => "b",
                "c" | "pre" | "preview" => "rc",
                "r" | "rev" => "post",
                other => other,
            };
            pending_sep = None;
            out.push_str(tag);
            continue;
        }

        if let Some(sep) = pending_sep.take() {
            let after_tag = out.chars().last().is_some_and(|l| l.is_ascii_alphabetic());
            if !after_tag {
                out.push(sep);
            }
        }
        out.push(c);
    }

    if let Some(local) = local {
        out.push('+');
        out.push_str(&local.replace(['-', '_'], "."));
    }

    out
}

/// Read metadata from `<project>/pyproject.toml`. `Ok(None)` when the file or
/// the `[project]` table is absent.
pub fn read(project_dir: &Path) -> Result<Option<PackageMetadata>> {
    let path = paths::pyproject(project_dir);
    if !path.exists() {
        return Ok(None);
    }

    let content = io::read_file(&path, &format!("read {}", path.display()))?;
    parse(&content).map_err(|e| {
        Error::config_invalid_value("pyproject.toml", None, e).with_hint(format!(
            "Check {} for TOML syntax errors",
            path.display()
        ))
    })
}

fn parse(content: &str) -> std::result::Result<Option<PackageMetadata>, String> {
    let doc: PyProject = toml::from_str(content).map_err(|e| e.to_string())?;
    let Some(project) = doc.project else {
        return Ok(None);
    };
    let Some(name) = project.name else {
        return Ok(None);
    };

    Ok(Some(PackageMetadata {
        name,
        dynamic_version: project.dynamic.iter().any(|d| d == "version"),
        version: project.version,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reads_name_and_version() {
        let meta = parse(
            r#"
[build-system]
requires = ["setuptools>=61"]

[project]
name = "zwishh-sdk"
version = "0.3.1"
"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(meta.name, "zwishh-sdk");
        assert_eq!(meta.version.as_deref(), Some("0.3.1"));
        assert!(!meta.dynamic_version);
    }

    #[test]
    fn parse_detects_dynamic_version() {
        let meta = parse("[project]\nname = \"pkg\"\ndynamic = [\"version\"]\n")
            .unwrap()
            .unwrap();
        assert!(meta.dynamic_version);
        assert!(meta.version.is_none());
        assert!(meta.owns_artifact("anything-1.0.whl"));
    }

    #[test]
    fn parse_without_project_table() {
        assert_eq!(parse("[tool.black]\nline-length = 100\n").unwrap(), None);
    }

    #[test]
    fn parse_rejects_invalid_toml() {
        assert!(parse("[project\nname=").is_err());
    }

    #[test]
    fn normalize_name_collapses_separators() {
        assert_eq!(normalize_name("Zwishh-SDK"), "zwishh_sdk");
        assert_eq!(normalize_name("a.-_b"), "a_b");
    }

    #[test]
    fn normalize_version_canonicalizes_tags() {
        assert_eq!(normalize_version("1.0.0-rc1"), "1.0.0rc1");
        assert_eq!(normalize_version("1.0.0.Beta.2"), "1.0.0b2");
        assert_eq!(normalize_version("2.1-alpha"), "2.1a");
        assert_eq!(normalize_version("1.0c3"), "1.0rc3");
        assert_eq!(normalize_version("1.0-rev-4"), "1.0post4");
        assert_eq!(normalize_version("v1.2.3.dev0"), "1.2.3dev0");
        assert_eq!(normalize_version("1.0+Ubuntu-1"), "1.0+ubuntu.1");
        assert_eq!(normalize_version("0.3.1"), "0.3.1");
    }

    #[test]
    fn owns_artifact_accepts_normalized_prerelease_filenames() {
        let meta = PackageMetadata {
            name: "pkg".to_string(),
            version: Some("1.0.0-rc1".to_string()),
            dynamic_version: false,
        };
        assert!(meta.owns_artifact("pkg-1.0.0rc1-py3-none-any.whl"));
        assert!(meta.owns_artifact("pkg-1.0.0rc1.tar.gz"));
        assert!(!meta.owns_artifact("pkg-1.0.0rc2.tar.gz"));
        assert!(!meta.owns_artifact("pkg-1.0.0-py3-none-any.whl"));
    }

    #[test]
    fn owns_artifact_accepts_hyphenated_sdist_names() {
        let meta = PackageMetadata {
            name: "zwishh-sdk".to_string(),
            version: Some("0.3.1".to_string()),
            dynamic_version: false,
        };
        assert!(meta.owns_artifact("zwishh-sdk-0.3.1.tar.gz"));
        assert!(meta.owns_artifact("Zwishh.SDK-0.3.1.zip"));
        assert!(!meta.owns_artifact("zwishh-sdk-0.3.0.tar.gz"));
        assert!(!meta.owns_artifact("zwishh-0.3.1.tar.gz"));
        assert!(!meta.owns_artifact("zwishh-sdk-extra-0.3.1.tar.gz"));
    }

    #[test]
    fn owns_artifact_matches_current_version_only() {
        let meta = PackageMetadata {
            name: "zwishh-sdk".to_string(),
            version: Some("0.3.1".to_string()),
            dynamic_version: false,
        };
        assert!(meta.owns_artifact("zwishh_sdk-0.3.1-py3-none-any.whl"));
        assert!(meta.owns_artifact("zwishh_sdk-0.3.1.tar.gz"));
        assert!(!meta.owns_artifact("zwishh_sdk-0.3.0-py3-none-any.whl"));
        assert!(!meta.owns_artifact("zwishh_sdk-0.3.10.tar.gz"));
    }
}
