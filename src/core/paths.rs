use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Project-level pipeline config file name.
pub const PROJECT_CONFIG_FILE: &str = "pkgship.json";

/// Base pkgship config directory (universal ~/.config/pkgship/ on all platforms)
pub fn pkgship() -> Result<PathBuf> {
    #[cfg(windows)]
    {
        let appdata = env::var("APPDATA").map_err(|_| {
            Error::internal_unexpected(
                "APPDATA environment variable not set on Windows".to_string(),
            )
        })?;
        Ok(PathBuf::from(appdata).join("pkgship"))
    }

    #[cfg(not(windows))]
    {
        let home = env::var("HOME").map_err(|_| {
            Error::internal_unexpected(
                "HOME environment variable not set on Unix-like system".to_string(),
            )
        })?;
        Ok(PathBuf::from(home).join(".config").join("pkgship"))
    }
}

/// Global defaults file, merged under every project config
pub fn global_config() -> Result<PathBuf> {
    Ok(pkgship()?.join("pkgship.json"))
}

/// Project config file path
pub fn project_config(project_dir: &Path) -> PathBuf {
    project_dir.join(PROJECT_CONFIG_FILE)
}

/// Packaging metadata file path
pub fn pyproject(project_dir: &Path) -> PathBuf {
    project_dir.join("pyproject.toml")
}

/// Resolve a configured path against the project root, expanding `~`.
pub fn resolve_in(project_dir: &Path, configured: &str) -> PathBuf {
    let expanded = shellexpand::tilde(configured);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}
