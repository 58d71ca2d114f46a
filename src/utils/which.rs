//! Program lookup on a PATH value.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Locate `program` the way the shell would, against an explicit PATH value.
///
/// Names containing a path separator are checked directly (relative ones
/// against `cwd`). Bare names are searched in each PATH entry in order.
pub fn find_program(program: &str, path: Option<&OsStr>, cwd: &Path) -> Option<PathBuf> {
    if program.contains('/') || program.contains(std::path::MAIN_SEPARATOR) {
        let candidate = Path::new(program);
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            cwd.join(candidate)
        };
        return is_executable(&candidate).then_some(candidate);
    }

    let path = path?;
    std::env::split_paths(path)
        .flat_map(|dir| candidates(&dir, program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.BAT;.CMD".to_string());
    let mut out = vec![dir.join(program)];
    out.extend(
        exts.split(';')
            .filter(|e| !e.is_empty())
            .map(|ext| dir.join(format!("{}{}", program, ext.to_lowercase()))),
    );
    out
}

#[cfg(not(windows))]
fn candidates(dir: &Path, program: &str) -> Vec<PathBuf> {
    vec![dir.join(program)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn make_tool(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn finds_program_in_first_matching_entry() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        make_tool(second.path(), "flake8", 0o755);
        let expected = make_tool(first.path(), "flake8", 0o755);

        let path = std::env::join_paths([first.path(), second.path()]).unwrap();
        let found = find_program("flake8", Some(&path), Path::new("/"));
        assert_eq!(found, Some(expected));
    }

    #[test]
    fn skips_non_executable_files() {
        let dir = TempDir::new().unwrap();
        make_tool(dir.path(), "twine", 0o644);
        let path = std::env::join_paths([dir.path()]).unwrap();
        assert_eq!(find_program("twine", Some(&path), Path::new("/")), None);
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("scripts")).unwrap();
        let expected = make_tool(&dir.path().join("scripts"), "build.sh", 0o755);
        assert_eq!(
            find_program("scripts/build.sh", None, dir.path()),
            Some(expected)
        );
    }

    #[test]
    fn missing_path_finds_nothing() {
        assert_eq!(find_program("pytest", None, Path::new("/")), None);
    }
}
