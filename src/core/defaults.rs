use serde::{Deserialize, Serialize};
use std::fs;

use crate::config;
use crate::paths;
use crate::utils::io;

/// Root configuration structure for pkgship.json (global and per-project).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    #[serde(default = "default_lint")]
    pub lint: StepCommand,

    #[serde(default = "default_test")]
    pub test: StepCommand,

    #[serde(default = "default_build")]
    pub build: StepCommand,

    #[serde(default = "default_upload")]
    pub upload: StepCommand,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    #[serde(default = "default_true")]
    pub clean_before_build: bool,

    #[serde(default)]
    pub venv: VenvConfig,

    #[serde(default)]
    pub ci: CiConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lint: default_lint(),
            test: default_test(),
            build: default_build(),
            upload: default_upload(),
            output_dir: default_output_dir(),
            clean_before_build: true,
            venv: VenvConfig::default(),
            ci: CiConfig::default(),
        }
    }
}

/// A shell command bound to one pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepCommand {
    pub command: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl StepCommand {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            enabled: true,
        }
    }
}

/// Local virtual environment the manual pipeline activates before running.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VenvConfig {
    #[serde(default = "default_venv_path")]
    pub path: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl Default for VenvConfig {
    fn default() -> Self {
        Self {
            path: default_venv_path(),
            required: true,
        }
    }
}

/// Events that trigger the CI variant of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CiConfig {
    #[serde(default = "default_ci_branches")]
    pub branches: Vec<String>,
    #[serde(default = "default_ci_tags")]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub pull_requests: bool,
    #[serde(default = "default_python_version")]
    pub python_version: String,
    /// Workflow step that puts `pkgship` on the runner's PATH. Empty omits it.
    #[serde(default = "default_pkgship_install")]
    pub pkgship_install: String,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            branches: default_ci_branches(),
            tags: default_ci_tags(),
            pull_requests: true,
            python_version: default_python_version(),
            pkgship_install: default_pkgship_install(),
        }
    }
}

// =============================================================================
// Default value functions
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_lint() -> StepCommand {
    StepCommand::new("flake8 src tests")
}

fn default_test() -> StepCommand {
    StepCommand::new("pytest -q")
}

fn default_build() -> StepCommand {
    StepCommand::new("python -m build --outdir {{output_dir}}")
}

fn default_upload() -> StepCommand {
    StepCommand::new("twine upload {{artifacts}}")
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_venv_path() -> String {
    ".venv".to_string()
}

fn default_ci_branches() -> Vec<String> {
    vec!["main".to_string(), "release/*".to_string()]
}

fn default_ci_tags() -> Vec<String> {
    vec!["v*.*.*".to_string()]
}

fn default_python_version() -> String {
    "3.11".to_string()
}

fn default_pkgship_install() -> String {
    "cargo install pkgship --locked".to_string()
}

// =============================================================================
// Loading functions
// =============================================================================

/// Load global defaults: built-ins overlaid key by key with the user's
/// pkgship.json. A missing file yields the built-ins; a malformed one is an error.
pub fn load_defaults() -> crate::Result<PipelineConfig> {
    let path = paths::global_config()?;
    config::overlay_file(builtin_defaults(), &path, &mut Vec::new())
}

/// Save global defaults (creates the config directory if missing).
pub fn save_defaults(config: &PipelineConfig) -> crate::Result<()> {
    let path = paths::global_config()?;

    let content = serde_json::to_string_pretty(config).map_err(|e| {
        crate::Error::internal_json(e.to_string(), Some("serialize pkgship.json".to_string()))
    })?;

    io::write_file_atomic(&path, &content, &format!("write {}", path.display()))
}

/// Delete the global pkgship.json (reset to built-in defaults)
pub fn reset_defaults() -> crate::Result<bool> {
    let path = paths::global_config()?;

    if path.exists() {
        fs::remove_file(&path).map_err(|e| {
            crate::Error::internal_io(e.to_string(), Some(format!("delete {}", path.display())))
        })?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Path to the global pkgship.json (for display purposes)
pub fn defaults_path() -> crate::Result<String> {
    Ok(paths::global_config()?.display().to_string())
}

/// Built-in defaults (ignoring any file config)
pub fn builtin_defaults() -> PipelineConfig {
    PipelineConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_mirror_release_scripts() {
        let config = builtin_defaults();
        assert_eq!(config.lint.command, "flake8 src tests");
        assert_eq!(config.test.command, "pytest -q");
        assert_eq!(config.output_dir, "dist");
        assert!(config.clean_before_build);
        assert!(config.upload.command.contains("{{artifacts}}"));
    }

    #[test]
    fn partial_json_fills_missing_fields() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"lint": {"command": "ruff check src tests"}}"#).unwrap();
        assert_eq!(config.lint.command, "ruff check src tests");
        assert!(config.lint.enabled);
        assert_eq!(config.test, builtin_defaults().test);
        assert_eq!(config.ci.tags, vec!["v*.*.*".to_string()]);
    }

    #[test]
    fn step_can_be_disabled() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"upload": {"command": "twine upload dist/*", "enabled": false}}"#)
                .unwrap();
        assert!(!config.upload.enabled);
    }
}
