//! Virtual environment activation.
//!
//! Activation is the same thing `source .venv/bin/activate` does, minus the
//! prompt: set `VIRTUAL_ENV`, prepend the environment's bin dir to `PATH`, and
//! drop `PYTHONHOME`.

use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::error::{Error, Result};

#[cfg(windows)]
const BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const BIN_DIR: &str = "bin";

/// How the environment for pipeline steps was chosen.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivationSource {
    /// The caller already had `VIRTUAL_ENV` set.
    Inherited,
    /// Activated from the project's configured venv path.
    Project,
    /// No venv; tools come from the caller's PATH.
    None,
}

/// Environment overrides applied to every step process.
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub source: ActivationSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venv: Option<String>,
    /// Effective PATH steps run with (also used for tool lookup).
    #[serde(skip)]
    pub path: Option<OsString>,
    #[serde(skip)]
    pub env: Vec<(String, String)>,
    #[serde(skip)]
    pub remove: Vec<String>,
}

impl Activation {
    pub fn none() -> Self {
        Self {
            source: ActivationSource::None,
            venv: None,
            path: std::env::var_os("PATH"),
            env: Vec::new(),
            remove: Vec::new(),
        }
    }

    /// Apply overrides to a process about to be spawned.
    pub fn apply(&self, cmd: &mut std::process::Command) {
        for key in &self.remove {
            cmd.env_remove(key);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(path) = &self.path {
            cmd.env("PATH", path);
        }
    }
}

pub fn bin_dir(venv: &Path) -> PathBuf {
    venv.join(BIN_DIR)
}

/// Resolve the activation for a project.
///
/// `required` comes from the variant: the manual release requires the venv,
/// CI runs with whatever the runner provides.
pub fn activate(project: &ProjectConfig, required: bool) -> Result<Activation> {
    if let Some(existing) = std::env::var_os("VIRTUAL_ENV") {
        if !existing.is_empty() {
            return Ok(Activation {
                source: ActivationSource::Inherited,
                venv: Some(PathBuf::from(existing).display().to_string()),
                path: std::env::var_os("PATH"),
                env: Vec::new(),
                remove: Vec::new(),
            });
        }
    }

    let venv = project.venv_dir();
    activate_dir(&venv, required && project.config.venv.required)
}

/// Activate a specific venv directory. Missing venvs are an error only when `required`.
pub fn activate_dir(venv: &Path, required: bool) -> Result<Activation> {
    let bin = bin_dir(venv);
    if !bin.is_dir() {
        if required {
            return Err(Error::environment_not_found(
                venv.display().to_string(),
                bin.display().to_string(),
            ));
        }
        log_status!("venv", "No virtual environment at {}, using PATH", venv.display());
        return Ok(Activation::none());
    }

    let path = prepend_path(&bin, std::env::var_os("PATH"))?;
    log_status!("venv", "Activated {}", venv.display());

    Ok(Activation {
        source: ActivationSource::Project,
        venv: Some(venv.display().to_string()),
        path: Some(path),
        env: vec![("VIRTUAL_ENV".to_string(), venv.display().to_string())],
        remove: vec!["PYTHONHOME".to_string()],
    })
}

fn prepend_path(bin: &Path, current: Option<OsString>) -> Result<OsString> {
    let mut entries = vec![bin.to_path_buf()];
    if let Some(current) = current {
        entries.extend(std::env::split_paths(&current));
    }
    std::env::join_paths(entries).map_err(|e| {
        Error::internal_unexpected(format!("Cannot build PATH with {}: {}", bin.display(), e))
    })
}
