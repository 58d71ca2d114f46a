//! File I/O primitives with consistent error handling.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// Read file contents with standardized error handling.
pub fn read_file(path: &Path, operation: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(operation.to_string())))
}

/// Write content to file atomically (write to .tmp, then rename).
///
/// Creates missing parent directories. Readers always see either the old
/// content or the new content, never a partial write.
pub fn write_file_atomic(path: &Path, content: &str, operation: &str) -> Result<()> {
    let parent = path.parent().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    let filename = path.file_name().ok_or_else(|| {
        Error::internal_io(
            format!("Invalid path: {}", path.display()),
            Some(operation.to_string()),
        )
    })?;

    fs::create_dir_all(parent).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (create dir)", operation)))
    })?;

    let tmp_path = parent.join(format!("{}.tmp", filename.to_string_lossy()));

    fs::write(&tmp_path, content).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("{} (write temp)", operation)))
    })?;

    fs::rename(&tmp_path, path)
        .map_err(|e| Error::internal_io(e.to_string(), Some(format!("{} (rename)", operation))))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_file_atomic_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".github/workflows/release.yml");
        write_file_atomic(&path, "name: release\n", "write workflow").unwrap();
        assert_eq!(read_file(&path, "read").unwrap(), "name: release\n");
        assert!(!dir.path().join(".github/workflows/release.yml.tmp").exists());
    }

    #[test]
    fn read_file_missing_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_file(&dir.path().join("missing"), "read missing").unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::InternalIoError);
    }
}
