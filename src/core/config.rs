//! Project configuration: layered pkgship.json resolution.
//!
//! Effective config = built-in defaults, overlaid by the global
//! `~/.config/pkgship/pkgship.json`, overlaid by `<project>/pkgship.json`.
//! Objects merge key by key; arrays and scalars from the later layer win.

use serde::Serialize;
use serde_json::Value;
use std::path::{Component, Path, PathBuf};

use crate::defaults::{self, PipelineConfig};
use crate::error::{Error, Result};
use crate::paths;
use crate::utils::io;

/// Fully resolved configuration for one project directory.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectConfig {
    pub root: PathBuf,
    pub config: PipelineConfig,
    /// Config files that contributed, lowest precedence first.
    pub sources: Vec<String>,
}

impl ProjectConfig {
    pub fn output_dir(&self) -> PathBuf {
        paths::resolve_in(&self.root, &self.config.output_dir)
    }

    pub fn venv_dir(&self) -> PathBuf {
        paths::resolve_in(&self.root, &self.config.venv.path)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub path: String,
    pub overwritten: bool,
    pub config: PipelineConfig,
}

/// Resolve the project directory from an optional `--path` argument.
pub fn resolve_project_dir(path: Option<&str>) -> Result<PathBuf> {
    let dir = match path {
        Some(p) => PathBuf::from(shellexpand::tilde(p).as_ref()),
        None => std::env::current_dir()
            .map_err(|e| Error::internal_io(e.to_string(), Some("read cwd".to_string())))?,
    };

    if !dir.is_dir() {
        return Err(Error::validation_invalid_argument(
            "path",
            format!("Project directory does not exist: {}", dir.display()),
            Some(dir.display().to_string()),
            None,
        ));
    }

    // Steps run with the project as cwd; every derived path must be absolute.
    dir.canonicalize().map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("resolve {}", dir.display())))
    })
}

/// Load the effective config for a project directory.
pub fn load(project_dir: &Path) -> Result<ProjectConfig> {
    let global = paths::global_config().ok();
    load_layers(project_dir, global.as_deref())
}

/// Built-ins, then the global file (if any), then the project file.
pub(crate) fn load_layers(project_dir: &Path, global: Option<&Path>) -> Result<ProjectConfig> {
    let mut sources = Vec::new();
    let mut base = defaults::builtin_defaults();
    if let Some(global) = global {
        base = overlay_file(base, global, &mut sources)?;
    }

    let config = load_with_base(project_dir, base, &mut sources)?;
    validate(&config)?;

    Ok(ProjectConfig {
        root: project_dir.to_path_buf(),
        config,
        sources,
    })
}

/// Overlay the project file (if any) on `base`.
pub(crate) fn load_with_base(
    project_dir: &Path,
    base: PipelineConfig,
    sources: &mut Vec<String>,
) -> Result<PipelineConfig> {
    overlay_file(base, &paths::project_config(project_dir), sources)
}

/// Merge the JSON object at `path` over `base` key by key. A missing file
/// leaves `base` untouched; `path` is recorded in `sources` only when applied.
pub(crate) fn overlay_file(
    base: PipelineConfig,
    path: &Path,
    sources: &mut Vec<String>,
) -> Result<PipelineConfig> {
    if !path.exists() {
        return Ok(base);
    }

    let content = io::read_file(path, &format!("read {}", path.display()))?;
    let overlay: Value = serde_json::from_str(&content)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;

    if !overlay.is_object() {
        return Err(Error::config_invalid_value(
            path.display().to_string(),
            None,
            "top-level value must be a JSON object",
        ));
    }

    let mut merged = serde_json::to_value(&base).map_err(|e| {
        Error::internal_json(e.to_string(), Some("serialize defaults".to_string()))
    })?;
    merge_json(&mut merged, overlay);

    let config = serde_json::from_value(merged)
        .map_err(|e| Error::config_invalid_json(path.display().to_string(), e))?;
    sources.push(path.display().to_string());
    Ok(config)
}

/// Deep-merge `overlay` into `base`. Objects merge recursively; everything else is replaced.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_obj), Value::Object(overlay_obj)) => {
            for (key, value) in overlay_obj {
                match base_obj.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_obj.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Set `value` at a JSON pointer (`/lint/command`), creating intermediate objects.
pub fn set_json_pointer(root: &mut Value, pointer: &str, value: Value) -> Result<()> {
    let Some(path) = pointer.strip_prefix('/') else {
        return Err(Error::validation_invalid_argument(
            "pointer",
            "JSON pointer must start with '/'",
            Some(pointer.to_string()),
            None,
        ));
    };
    if path.is_empty() {
        *root = value;
        return Ok(());
    }

    let tokens: Vec<String> = path
        .split('/')
        .map(|t| t.replace("~1", "/").replace("~0", "~"))
        .collect();
    let (last, parents) = tokens
        .split_last()
        .ok_or_else(|| Error::internal_unexpected("empty JSON pointer"))?;

    let mut current = root;
    for token in parents {
        let obj = current.as_object_mut().ok_or_else(|| {
            Error::validation_invalid_argument(
                "pointer",
                format!("'{}' does not point into an object", pointer),
                Some(pointer.to_string()),
                None,
            )
        })?;
        current = obj
            .entry(token.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }

    let obj = current.as_object_mut().ok_or_else(|| {
        Error::validation_invalid_argument(
            "pointer",
            format!("'{}' does not point into an object", pointer),
            Some(pointer.to_string()),
            None,
        )
    })?;
    obj.insert(last.clone(), value);
    Ok(())
}

/// Reject configs that would make the pipeline misbehave.
pub fn validate(config: &PipelineConfig) -> Result<()> {
    for (name, step) in [
        ("lint", &config.lint),
        ("test", &config.test),
        ("build", &config.build),
        ("upload", &config.upload),
    ] {
        if step.enabled && step.command.trim().is_empty() {
            return Err(Error::config_invalid_value(
                format!("{}.command", name),
                None,
                "command is empty but the step is enabled",
            )
            .with_hint(format!("Set {}.enabled to false to skip the step", name)));
        }
    }

    validate_output_dir(&config.output_dir)?;

    for pattern in config.ci.branches.iter().chain(config.ci.tags.iter()) {
        if pattern.trim().is_empty() {
            return Err(Error::config_invalid_value(
                "ci",
                Some(pattern.clone()),
                "trigger patterns must not be empty",
            ));
        }
    }

    Ok(())
}

/// The output directory is deleted by the clean step, so it must stay inside the project.
fn validate_output_dir(output_dir: &str) -> Result<()> {
    let trimmed = output_dir.trim();
    if trimmed.is_empty() {
        return Err(Error::config_invalid_value(
            "output_dir",
            Some(output_dir.to_string()),
            "must not be empty",
        ));
    }

    let path = Path::new(trimmed);
    let escapes = path.is_absolute()
        || trimmed.starts_with('~')
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir));
    let is_root = path.components().all(|c| matches!(c, Component::CurDir));

    if escapes || is_root {
        return Err(Error::config_invalid_value(
            "output_dir",
            Some(output_dir.to_string()),
            "must be a relative subdirectory of the project",
        ));
    }

    Ok(())
}

/// Write a pkgship.json with the built-in defaults into `project_dir`.
pub fn init(project_dir: &Path, force: bool) -> Result<InitResult> {
    let path = paths::project_config(project_dir);
    let exists = path.exists();
    if exists && !force {
        return Err(Error::config_already_exists(path.display().to_string()));
    }

    let config = defaults::builtin_defaults();
    let content = serde_json::to_string_pretty(&config).map_err(|e| {
        Error::internal_json(e.to_string(), Some("serialize pkgship.json".to_string()))
    })?;
    io::write_file_atomic(
        &path,
        &format!("{}\n", content),
        &format!("write {}", path.display()),
    )?;

    log_status!("init", "Wrote {}", path.display());

    Ok(InitResult {
        path: path.display().to_string(),
        overwritten: exists,
        config,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn merge_json_overrides_nested_keys_only() {
        let mut base = json!({"lint": {"command": "flake8 src tests", "enabled": true}, "output_dir": "dist"});
        merge_json(&mut base, json!({"lint": {"command": "ruff check ."}}));
        assert_eq!(base["lint"]["command"], "ruff check .");
        assert_eq!(base["lint"]["enabled"], true);
        assert_eq!(base["output_dir"], "dist");
    }

    #[test]
    fn set_json_pointer_creates_path() {
        let mut root = json!({"lint": {"command": "flake8 src tests"}});
        set_json_pointer(&mut root, "/lint/enabled", json!(false)).unwrap();
        set_json_pointer(&mut root, "/ci/tags", json!(["release-*"])).unwrap();
        assert_eq!(root["lint"]["enabled"], false);
        assert_eq!(root["lint"]["command"], "flake8 src tests");
        assert_eq!(root["ci"]["tags"][0], "release-*");
    }

    #[test]
    fn set_json_pointer_rejects_bad_pointers() {
        let mut root = json!({"output_dir": "dist"});
        assert!(set_json_pointer(&mut root, "output_dir", json!("x")).is_err());
        assert!(set_json_pointer(&mut root, "/output_dir/nested", json!("x")).is_err());
    }

    #[test]
    fn merge_json_replaces_arrays() {
        let mut base = json!({"ci": {"branches": ["main", "release/*"]}});
        merge_json(&mut base, json!({"ci": {"branches": ["trunk"]}}));
        assert_eq!(base["ci"]["branches"], json!(["trunk"]));
    }

    #[test]
    fn load_without_project_file_uses_base() {
        let dir = TempDir::new().unwrap();
        let mut sources = Vec::new();
        let config =
            load_with_base(dir.path(), defaults::builtin_defaults(), &mut sources).unwrap();
        assert_eq!(config, defaults::builtin_defaults());
        assert!(sources.is_empty());
    }

    #[test]
    fn load_overlays_project_file() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pkgship.json"),
            r#"{"clean_before_build": false, "test": {"command": "pytest -q -x"}}"#,
        )
        .unwrap();

        let mut sources = Vec::new();
        let config =
            load_with_base(dir.path(), defaults::builtin_defaults(), &mut sources).unwrap();
        assert!(!config.clean_before_build);
        assert_eq!(config.test.command, "pytest -q -x");
        assert_eq!(config.lint.command, "flake8 src tests");
        assert_eq!(sources.len(), 1);
    }

    #[test]
    fn partial_global_file_overlays_builtins() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let global = home.path().join("pkgship.json");
        fs::write(
            &global,
            r#"{"lint": {"enabled": false}, "output_dir": "build/out"}"#,
        )
        .unwrap();

        let loaded = load_layers(project.path(), Some(&global)).unwrap();

        assert!(!loaded.config.lint.enabled);
        assert_eq!(loaded.config.lint.command, "flake8 src tests");
        assert_eq!(loaded.config.output_dir, "build/out");
        assert_eq!(loaded.sources, vec![global.display().to_string()]);
    }

    #[test]
    fn project_file_wins_over_global_file() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let global = home.path().join("pkgship.json");
        fs::write(&global, r#"{"output_dir": "build/out", "test": {"command": "tox"}}"#).unwrap();
        fs::write(project.path().join("pkgship.json"), r#"{"output_dir": "wheels"}"#).unwrap();

        let loaded = load_layers(project.path(), Some(&global)).unwrap();

        assert_eq!(loaded.config.output_dir, "wheels");
        assert_eq!(loaded.config.test.command, "tox");
        assert_eq!(loaded.sources.len(), 2);
    }

    #[test]
    fn malformed_global_file_is_an_error() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let global = home.path().join("pkgship.json");
        fs::write(&global, "{ \"lint\": ").unwrap();

        let err = load_layers(project.path(), Some(&global)).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn absent_global_file_is_not_a_source() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        let loaded = load_layers(project.path(), Some(&home.path().join("pkgship.json"))).unwrap();
        assert!(loaded.sources.is_empty());
        assert_eq!(loaded.config, defaults::builtin_defaults());
    }

    #[test]
    fn load_rejects_invalid_json() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pkgship.json"), "{ not json").unwrap();
        let err = load_with_base(dir.path(), defaults::builtin_defaults(), &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigInvalidJson);
    }

    #[test]
    fn load_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pkgship.json"), "[]").unwrap();
        let err = load_with_base(dir.path(), defaults::builtin_defaults(), &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigInvalidValue);
    }

    #[test]
    fn validate_rejects_escaping_output_dir() {
        for bad in ["", ".", "..", "../dist", "/tmp/dist", "~/dist", "./"] {
            let mut config = defaults::builtin_defaults();
            config.output_dir = bad.to_string();
            assert!(validate(&config).is_err(), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn validate_accepts_nested_output_dir() {
        let mut config = defaults::builtin_defaults();
        config.output_dir = "build/dist".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn validate_rejects_empty_enabled_command() {
        let mut config = defaults::builtin_defaults();
        config.lint.command = "  ".to_string();
        assert!(validate(&config).is_err());

        config.lint.enabled = false;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let first = init(dir.path(), false).unwrap();
        assert!(!first.overwritten);

        let err = init(dir.path(), false).unwrap_err();
        assert_eq!(err.code, crate::ErrorCode::ConfigAlreadyExists);

        let forced = init(dir.path(), true).unwrap();
        assert!(forced.overwritten);
    }
}
