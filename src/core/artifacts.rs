//! Build output directory: listing, cleaning, and stale-artifact detection.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::metadata::PackageMetadata;

/// A distributable file in the output directory.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

/// Names present in the output directory at one point in time.
pub type ArtifactSnapshot = BTreeSet<String>;

#[derive(Debug, Clone, Serialize)]
pub struct CleanResult {
    pub path: String,
    /// False when there was nothing to remove.
    pub removed: bool,
    pub removed_files: usize,
}

/// List artifacts directly inside `output_dir`, sorted by name.
///
/// A missing directory lists as empty. Dotfiles and subdirectories are ignored.
pub fn list(output_dir: &Path) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for path in artifact_paths(output_dir)? {
        let name = file_name(&path);
        let meta = fs::metadata(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("stat {}", path.display())))
        })?;
        artifacts.push(Artifact {
            sha256: sha256_file(&path)?,
            size: meta.len(),
            path: path.display().to_string(),
            name,
        });
    }
    Ok(artifacts)
}

pub fn snapshot(output_dir: &Path) -> Result<ArtifactSnapshot> {
    Ok(artifact_paths(output_dir)?
        .iter()
        .map(|p| file_name(p))
        .collect())
}

fn artifact_paths(output_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(output_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::internal_io(
                e.to_string(),
                Some(format!("read {}", output_dir.display())),
            ))
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && !file_name(p).starts_with('.'))
        .collect();
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("open {}", path.display()))))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("hash {}", path.display()))))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Remove the output directory. Succeeds when it does not exist.
pub fn clean(output_dir: &Path) -> Result<CleanResult> {
    let removed_files = match fs::symlink_metadata(output_dir) {
        Ok(meta) if meta.is_dir() => count_files(output_dir),
        Ok(_) => {
            return Err(Error::validation_invalid_argument(
                "output_dir",
                format!("{} exists but is not a directory", output_dir.display()),
                Some(output_dir.display().to_string()),
                None,
            ))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Ok(CleanResult {
                path: output_dir.display().to_string(),
                removed: false,
                removed_files: 0,
            })
        }
        Err(e) => {
            return Err(Error::internal_io(
                e.to_string(),
                Some(format!("stat {}", output_dir.display())),
            ))
        }
    };

    match fs::remove_dir_all(output_dir) {
        Ok(()) => {}
        // Raced with another remover; the end state is what we wanted.
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(Error::internal_io(
                e.to_string(),
                Some(format!("remove {}", output_dir.display())),
            ))
        }
    }

    log_status!("clean", "Removed {} ({} files)", output_dir.display(), removed_files);

    Ok(CleanResult {
        path: output_dir.display().to_string(),
        removed: true,
        removed_files,
    })
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() {
                        count_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Artifacts that did not come from the build that just ran.
///
/// A file is stale when it was already present before the build, or when it
/// belongs to a different version of the package than the one in metadata.
pub fn stale(
    before: &ArtifactSnapshot,
    after: &[Artifact],
    metadata: Option<&PackageMetadata>,
) -> Vec<String> {
    after
        .iter()
        .filter(|a| {
            before.contains(&a.name) || metadata.is_some_and(|m| !m.owns_artifact(&a.name))
        })
        .map(|a| a.name.clone())
        .collect()
}

/// Filter artifacts by a glob pattern on the file name (e.g. `*.whl`).
pub fn select(artifacts: Vec<Artifact>, pattern: Option<&str>) -> Result<Vec<Artifact>> {
    let Some(pattern) = pattern else {
        return Ok(artifacts);
    };

    let compiled = glob::Pattern::new(pattern).map_err(|e| {
        Error::validation_invalid_argument(
            "pattern",
            format!("Invalid glob pattern '{}': {}", pattern, e),
            Some(pattern.to_string()),
            None,
        )
    })?;

    Ok(artifacts
        .into_iter()
        .filter(|a| compiled.matches(&a.name))
        .collect())
}
