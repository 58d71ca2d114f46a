use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::Utc;

use crate::artifacts;
use crate::config::{self, ProjectConfig};
use crate::defaults::StepCommand;
use crate::error::{Error, Result};
use crate::metadata::{self, PackageMetadata};
use crate::pipeline::{self, PipelineStep};
use crate::utils::shell;
use crate::utils::template::{self, TemplateVars};
use crate::venv::{self, Activation};

use super::executor::ReleaseStepExecutor;
use super::resolver::ReleaseCapabilityResolver;
use super::types::{
    ReleaseOptions, ReleasePlan, ReleasePlanStatus, ReleasePlanStep, ReleaseRun,
    ReleaseStepType, ReleaseVariant,
};

const STEPS_FIELD: &str = "release.steps";

/// Execute a release by computing the steps and running them in order.
/// Stops at the first failing step. Dry runs are served by [`plan`].
pub fn run(project_dir: &Path, options: &ReleaseOptions) -> Result<ReleaseRun> {
    let project = config::load(project_dir)?;
    run_project(&project, options)
}

pub(crate) fn run_project(project: &ProjectConfig, options: &ReleaseOptions) -> Result<ReleaseRun> {
    let started_at = Utc::now().to_rfc3339();
    let package = metadata::read(&project.root)?;
    let activation = resolve_activation(project, options)?;
    let (steps, disabled) = build_steps(project, package.as_ref(), options)?;

    let disabled_ids: Vec<String> = steps
        .iter()
        .filter(|s| disabled.contains(&s.id))
        .map(|s| s.id.clone())
        .collect();
    let runnable: Vec<PipelineStep> = steps
        .into_iter()
        .filter(|s| !disabled.contains(&s.id))
        .collect();

    let resolver = ReleaseCapabilityResolver::new(&activation, project.root.clone());
    let executor = ReleaseStepExecutor::new(
        project,
        activation.clone(),
        package.clone(),
        options.output_mode,
    );

    log_status!(
        "release",
        "Running {} step(s) in {}",
        runnable.len(),
        project.root.display()
    );
    let result = pipeline::run(&runnable, &executor, &resolver, STEPS_FIELD)?;
    let exit_code = result.exit_code();

    if let Some(failed) = result.first_failure() {
        log_status!("release", "Stopped at '{}' (exit code {})", failed.id, exit_code);
    }

    Ok(ReleaseRun {
        run_id: uuid::Uuid::new_v4().to_string(),
        project_dir: project.root.display().to_string(),
        variant: options.variant,
        package,
        environment: activation,
        started_at,
        finished_at: Utc::now().to_rfc3339(),
        result,
        disabled: disabled_ids,
        artifacts: artifacts::list(&project.output_dir())?,
        exit_code,
    })
}

/// Plan a release: the variant's steps with their resolved commands, each
/// marked ready, missing (tool not on PATH), or disabled.
///
/// What you preview (dry-run) is what `run` executes.
pub fn plan(project_dir: &Path, options: &ReleaseOptions) -> Result<ReleasePlan> {
    let project = config::load(project_dir)?;
    plan_project(&project, options)
}

pub(crate) fn plan_project(project: &ProjectConfig, options: &ReleaseOptions) -> Result<ReleasePlan> {
    let package = metadata::read(&project.root)?;
    let activation = resolve_activation(project, options)?;
    let (steps, disabled) = build_steps(project, package.as_ref(), options)?;

    let resolver = ReleaseCapabilityResolver::new(&activation, project.root.clone());
    let planned = pipeline::plan(&steps, &resolver, &disabled, STEPS_FIELD)?;
    let steps: Vec<ReleasePlanStep> = planned.steps.into_iter().map(Into::into).collect();

    let mut warnings = planned.warnings;
    let mut hints = Vec::new();

    if package.is_none() {
        warnings.push(
            "No [project] name in pyproject.toml; stale artifacts are detected by pre-build contents only"
                .to_string(),
        );
    }
    if options.variant == ReleaseVariant::Ci && options.clean == Some(true) {
        warnings.push("The ci variant never cleans; --clean has no effect".to_string());
    }
    if steps.iter().any(|s| s.status == ReleasePlanStatus::Missing) {
        hints.push(match &activation.venv {
            Some(venv) => format!("Install the missing tools into {}", venv),
            None => "Install the missing tools or activate the project's virtual environment"
                .to_string(),
        });
    }
    let upload_ignores_artifacts = steps.iter().any(|s| {
        s.id == ReleaseStepType::Upload.as_str()
            && s.status != ReleasePlanStatus::Disabled
            && s.command
                .as_deref()
                .is_some_and(|c| !template::is_present(c, TemplateVars::ARTIFACTS))
    });
    if upload_ignores_artifacts {
        hints.push(
            "The upload command does not use {{artifacts}}; it will not see the checked artifact list"
                .to_string(),
        );
    }
    if options.dry_run {
        hints.push("Dry run: no commands will be executed".to_string());
    }

    Ok(ReleasePlan {
        project_dir: project.root.display().to_string(),
        variant: options.variant,
        package,
        output_dir: project.output_dir().display().to_string(),
        environment: activation,
        steps,
        warnings,
        hints,
    })
}

fn resolve_activation(project: &ProjectConfig, options: &ReleaseOptions) -> Result<Activation> {
    if options.no_venv {
        return Ok(Activation::none());
    }
    venv::activate(project, options.requires_venv())
}

/// Steps for the requested variant (or the single requested step), plus
/// the ids that config or flags switched off.
fn build_steps(
    project: &ProjectConfig,
    package: Option<&PackageMetadata>,
    options: &ReleaseOptions,
) -> Result<(Vec<PipelineStep>, HashSet<String>)> {
    let output_dir = project.output_dir().display().to_string();
    let root = project.root.display().to_string();
    let output_dir_arg = shell::quote_arg(&output_dir);
    let root_arg = shell::quote_arg(&root);
    let name = package.map(|p| p.name.as_str()).unwrap_or_default();
    let version = package
        .and_then(|p| p.version.as_deref())
        .unwrap_or_default();
    let vars: [(&str, &str); 4] = [
        (TemplateVars::OUTPUT_DIR, output_dir_arg.as_str()),
        (TemplateVars::PROJECT_DIR, root_arg.as_str()),
        (TemplateVars::PACKAGE_NAME, name),
        (TemplateVars::PACKAGE_VERSION, version),
    ];

    let selected: Vec<ReleaseStepType> = match options.only {
        Some(only) => vec![only],
        None => options.variant.steps().to_vec(),
    };

    let mut steps = Vec::with_capacity(selected.len());
    let mut disabled = HashSet::new();

    for step_type in selected {
        let mut step_config = HashMap::new();
        let enabled = match step_command(project, step_type) {
            None => {
                options.only.is_some()
                    || options.clean.unwrap_or(project.config.clean_before_build)
            }
            Some(configured) => {
                if options.only.is_some() && configured.command.trim().is_empty() {
                    return Err(Error::config_invalid_value(
                        format!("{}.command", step_type.as_str()),
                        None,
                        "Command is empty",
                    ));
                }
                step_config.insert(
                    "command".to_string(),
                    serde_json::json!(template::render(&configured.command, &vars)),
                );
                // A step asked for by name runs even when disabled for releases.
                let enabled = options.only.is_some() || configured.enabled;
                enabled && !(step_type == ReleaseStepType::Upload && options.skip_upload)
            }
        };

        if !enabled {
            disabled.insert(step_type.as_str().to_string());
        }
        steps.push(PipelineStep {
            id: step_type.as_str().to_string(),
            step_type: step_type.as_str().to_string(),
            label: Some(step_type.label().to_string()),
            config: step_config,
        });
    }

    Ok((steps, disabled))
}

/// Configured command for a step. Clean is native and has none.
fn step_command(project: &ProjectConfig, step_type: ReleaseStepType) -> Option<&StepCommand> {
    match step_type {
        ReleaseStepType::Lint => Some(&project.config.lint),
        ReleaseStepType::Test => Some(&project.config.test),
        ReleaseStepType::Clean => None,
        ReleaseStepType::Build => Some(&project.config.build),
        ReleaseStepType::Upload => Some(&project.config.upload),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::defaults::builtin_defaults;
    use crate::engine::pipeline::PipelineRunStatus;
    use std::fs;
    use tempfile::TempDir;

    const BUILD_ONE_SET: &str = "mkdir -p {{output_dir}} && touch {{output_dir}}/pkg-{{package_version}}.tar.gz {{output_dir}}/pkg-{{package_version}}-py3-none-any.whl";

    fn project(dir: &Path, lint: &str, test: &str, build: &str, upload: &str) -> ProjectConfig {
        let mut config = builtin_defaults();
        config.lint.command = lint.to_string();
        config.test.command = test.to_string();
        config.build.command = build.to_string();
        config.upload.command = upload.to_string();
        ProjectConfig {
            root: dir.to_path_buf(),
            config,
            sources: Vec::new(),
        }
    }

    fn pyproject(dir: &Path, version: &str) {
        fs::write(
            dir.join("pyproject.toml"),
            format!("[project]\nname = \"pkg\"\nversion = \"{}\"\n", version),
        )
        .unwrap();
    }

    fn manual() -> ReleaseOptions {
        ReleaseOptions {
            no_venv: true,
            ..ReleaseOptions::default()
        }
    }

    #[test]
    fn lint_violation_stops_before_anything_is_built() {
        let dir = TempDir::new().unwrap();
        pyproject(dir.path(), "1.0");
        let project = project(
            dir.path(),
            "echo 'src/client.py:3:1: F401 unused import' >&2; exit 1",
            "touch tested",
            BUILD_ONE_SET,
            "touch uploaded",
        );

        let run = run_project(&project, &manual()).unwrap();

        assert_eq!(run.exit_code, 1);
        assert!(!run.succeeded());
        assert_eq!(run.result.status, PipelineRunStatus::Failed);
        assert_eq!(
            run.result.steps[0].error_code.as_deref(),
            Some("pipeline.lint_failed")
        );
        assert!(run.result.steps[1..]
            .iter()
            .all(|s| s.status == PipelineRunStatus::Skipped));
        assert!(!dir.path().join("tested").exists());
        assert!(!dir.path().join("uploaded").exists());
        assert!(!dir.path().join("dist").exists());
        assert!(run.artifacts.is_empty());
    }

    #[test]
    fn test_failure_inherits_exit_code_and_skips_build() {
        let dir = TempDir::new().unwrap();
        pyproject(dir.path(), "1.0");
        let project = project(dir.path(), "true", "exit 3", BUILD_ONE_SET, "touch uploaded");

        let run = run_project(&project, &manual()).unwrap();

        assert_eq!(run.exit_code, 3);
        assert!(!dir.path().join("dist").exists());
        assert!(!dir.path().join("uploaded").exists());
    }

    #[test]
    fn passing_project_builds_one_artifact_set_and_uploads_it() {
        let dir = TempDir::new().unwrap();
        pyproject(dir.path(), "1.0");
        let project = project(
            dir.path(),
            "true",
            "true",
            BUILD_ONE_SET,
            "ls {{artifacts}} > uploaded.txt",
        );

        let run = run_project(&project, &manual()).unwrap();

        assert_eq!(run.exit_code, 0);
        assert_eq!(run.result.status, PipelineRunStatus::Success);
        assert_eq!(run.result.summary.succeeded, 5);
        let names: Vec<&str> = run.artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["pkg-1.0-py3-none-any.whl", "pkg-1.0.tar.gz"]);

        let uploaded = fs::read_to_string(dir.path().join("uploaded.txt")).unwrap();
        assert!(uploaded.contains("pkg-1.0.tar.gz"));
        assert!(uploaded.contains("pkg-1.0-py3-none-any.whl"));
    }

    #[test]
    fn rebuild_without_clean_keeps_old_artifacts_and_warns() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path(), "true", "true", BUILD_ONE_SET, "true");
        let ci = ReleaseOptions {
            variant: ReleaseVariant::Ci,
            no_venv: true,
            ..ReleaseOptions::default()
        };

        pyproject(dir.path(), "1.0");
        let first = run_project(&project, &ci).unwrap();
        assert_eq!(first.artifacts.len(), 2);
        assert!(first.result.steps[2].warnings.is_empty());

        pyproject(dir.path(), "1.1");
        let second = run_project(&project, &ci).unwrap();

        assert_eq!(second.exit_code, 0);
        let names: HashSet<String> = second.artifacts.iter().map(|a| a.name.clone()).collect();
        for artifact in &first.artifacts {
            assert!(names.contains(&artifact.name));
        }
        assert_eq!(second.artifacts.len(), 4);

        let build = &second.result.steps[2];
        assert_eq!(build.id, "build");
        assert_eq!(build.warnings.len(), 1);
        assert!(build.warnings[0].contains("pkg-1.0.tar.gz"));
        let stale = build.data.as_ref().unwrap()["stale"].as_array().unwrap();
        assert_eq!(stale.len(), 2);
    }

    #[test]
    fn fresh_prerelease_build_reports_no_stale_artifacts() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pyproject.toml"),
            "[project]\nname = \"zwishh-sdk\"\nversion = \"1.0.0-rc1\"\n",
        )
        .unwrap();
        let project = project(
            dir.path(),
            "true",
            "true",
            "mkdir -p {{output_dir}} && touch {{output_dir}}/zwishh_sdk-1.0.0rc1-py3-none-any.whl {{output_dir}}/zwishh-sdk-1.0.0rc1.tar.gz",
            "true",
        );
        let options = ReleaseOptions {
            skip_upload: true,
            ..manual()
        };

        let run = run_project(&project, &options).unwrap();

        assert_eq!(run.exit_code, 0);
        assert_eq!(run.artifacts.len(), 2);
        let build = run.result.steps.iter().find(|s| s.id == "build").unwrap();
        assert!(build.warnings.is_empty(), "{:?}", build.warnings);
    }

    #[test]
    fn clean_before_build_removes_previous_artifacts() {
        let dir = TempDir::new().unwrap();
        pyproject(dir.path(), "1.1");
        fs::create_dir(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/pkg-1.0.tar.gz"), "old").unwrap();

        let project = project(dir.path(), "true", "true", BUILD_ONE_SET, "true");
        let options = ReleaseOptions {
            clean: Some(true),
            skip_upload: true,
            ..manual()
        };

        let run = run_project(&project, &options).unwrap();

        assert_eq!(run.exit_code, 0);
        assert_eq!(run.disabled, vec!["upload"]);
        assert_eq!(run.artifacts.len(), 2);
        assert!(run.artifacts.iter().all(|a| a.name.starts_with("pkg-1.1")));
    }

    #[test]
    fn upload_with_empty_output_dir_fails_before_invoking_tool() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path(), "true", "true", "true", "touch uploaded");

        let run = run_project(&project, &ReleaseOptions {
            no_venv: true,
            ..ReleaseOptions::single(ReleaseStepType::Upload)
        })
        .unwrap();

        assert_eq!(run.exit_code, 1);
        assert_eq!(
            run.result.steps[0].error_code.as_deref(),
            Some("pipeline.no_artifacts")
        );
        assert!(!dir.path().join("uploaded").exists());
    }

    #[test]
    fn missing_tool_stops_run() {
        let dir = TempDir::new().unwrap();
        let project = project(
            dir.path(),
            "true",
            "definitely-not-a-real-test-runner -q",
            "touch built",
            "true",
        );

        let run = run_project(&project, &manual()).unwrap();

        assert_eq!(run.result.status, PipelineRunStatus::Missing);
        assert_eq!(run.exit_code, 1);
        assert!(!dir.path().join("built").exists());
    }

    #[test]
    fn single_clean_runs_even_when_clean_before_build_is_off() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("dist")).unwrap();
        let mut project = project(dir.path(), "true", "true", "true", "true");
        project.config.clean_before_build = false;

        let options = ReleaseOptions {
            no_venv: true,
            ..ReleaseOptions::single(ReleaseStepType::Clean)
        };
        let run = run_project(&project, &options).unwrap();
        assert_eq!(run.exit_code, 0);
        assert!(!dir.path().join("dist").exists());

        let again = run_project(&project, &options).unwrap();
        assert_eq!(again.exit_code, 0);
    }

    #[test]
    fn plan_shapes_follow_variant_and_flags() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path(), "true", "true", "true", "true");

        let ci = plan_project(
            &project,
            &ReleaseOptions {
                variant: ReleaseVariant::Ci,
                no_venv: true,
                ..ReleaseOptions::default()
            },
        )
        .unwrap();
        let ids: Vec<&str> = ci.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["lint", "test", "build"]);

        let manual_plan = plan_project(
            &project,
            &ReleaseOptions {
                clean: Some(false),
                skip_upload: true,
                dry_run: true,
                ..manual()
            },
        )
        .unwrap();
        let statuses: Vec<&ReleasePlanStatus> =
            manual_plan.steps.iter().map(|s| &s.status).collect();
        assert_eq!(
            statuses,
            vec![
                &ReleasePlanStatus::Ready,
                &ReleasePlanStatus::Ready,
                &ReleasePlanStatus::Disabled,
                &ReleasePlanStatus::Ready,
                &ReleasePlanStatus::Disabled,
            ]
        );
        assert!(manual_plan.hints.iter().any(|h| h.starts_with("Dry run")));
    }

    #[test]
    fn plan_renders_output_dir_into_commands() {
        let dir = TempDir::new().unwrap();
        let project = project(
            dir.path(),
            "true",
            "true",
            "python -m build --outdir {{output_dir}}",
            "true",
        );
        let plan = plan_project(&project, &manual()).unwrap();
        let build = plan.steps.iter().find(|s| s.id == "build").unwrap();
        let expected = format!(
            "python -m build --outdir {}",
            shell::quote_arg(&dir.path().join("dist").display().to_string())
        );
        assert_eq!(build.command.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn clean_step_carries_no_config() {
        let dir = TempDir::new().unwrap();
        let project = project(dir.path(), "true", "true", "true", "true");

        let (steps, disabled) = build_steps(&project, None, &manual()).unwrap();
        let clean = steps.iter().find(|s| s.id == "clean").unwrap();

        assert!(clean.config.is_empty());
        assert!(!disabled.contains("clean"));
        let build = steps.iter().find(|s| s.id == "build").unwrap();
        assert!(build.config.contains_key("command"));
    }

    #[test]
    fn missing_required_venv_fails_before_any_step() {
        if std::env::var_os("VIRTUAL_ENV").is_some() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let project = project(dir.path(), "touch linted", "true", "true", "true");

        let err = run_project(&project, &ReleaseOptions::default()).unwrap_err();

        assert_eq!(err.code, crate::ErrorCode::EnvironmentNotFound);
        assert!(!dir.path().join("linted").exists());
    }
}
