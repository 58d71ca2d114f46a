//! CI trigger surface: which events run the pipeline, and the workflow that wires it up.
//!
//! Branch and tag filters are glob patterns (`release/*`, `v*.*.*`). A `*`
//! never crosses a `/`, matching how GitHub Actions filters refs.

use glob_match::glob_match;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::config::{self, ProjectConfig};
use crate::defaults::CiConfig;
use crate::error::{Error, Result};
use crate::release::{self, ReleaseOptions, ReleaseRun, ReleaseVariant};
use crate::utils::command::OutputMode;
use crate::utils::io;

pub const WORKFLOW_PATH: &str = ".github/workflows/pkgship.yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CiEvent {
    Push { branch: String },
    Tag { name: String },
    PullRequest { base: String },
}

impl CiEvent {
    /// Parse a GitHub ref (`refs/heads/main`, `refs/tags/v1.0.0`) into a push or tag event.
    pub fn from_ref(git_ref: &str) -> Result<Self> {
        if let Some(branch) = git_ref.strip_prefix("refs/heads/") {
            return Ok(CiEvent::Push {
                branch: branch.to_string(),
            });
        }
        if let Some(name) = git_ref.strip_prefix("refs/tags/") {
            return Ok(CiEvent::Tag {
                name: name.to_string(),
            });
        }
        Err(Error::validation_invalid_argument(
            "ref",
            format!("Unsupported ref '{}'", git_ref),
            Some(git_ref.to_string()),
            Some(vec!["refs/heads/<branch>".to_string(), "refs/tags/<tag>".to_string()]),
        ))
    }

    /// Build an event from the variables GitHub Actions sets on every job.
    pub fn from_github(
        event_name: Option<&str>,
        git_ref: Option<&str>,
        base_ref: Option<&str>,
    ) -> Result<Self> {
        let Some(event_name) = event_name.filter(|e| !e.is_empty()) else {
            return Err(
                Error::validation_missing_argument(vec!["GITHUB_EVENT_NAME".to_string()])
                    .with_hint("Outside GitHub Actions, pass --branch, --tag, or --pull-request"),
            );
        };

        match event_name {
            "pull_request" | "pull_request_target" => {
                let base = base_ref.filter(|b| !b.is_empty()).ok_or_else(|| {
                    Error::validation_missing_argument(vec!["GITHUB_BASE_REF".to_string()])
                })?;
                Ok(CiEvent::PullRequest {
                    base: base.to_string(),
                })
            }
            _ => {
                let git_ref = git_ref.filter(|r| !r.is_empty()).ok_or_else(|| {
                    Error::validation_missing_argument(vec!["GITHUB_REF".to_string()])
                })?;
                Self::from_ref(git_ref)
            }
        }
    }

    pub fn from_env() -> Result<Self> {
        let event_name = std::env::var("GITHUB_EVENT_NAME").ok();
        let git_ref = std::env::var("GITHUB_REF").ok();
        let base_ref = std::env::var("GITHUB_BASE_REF").ok();
        Self::from_github(
            event_name.as_deref(),
            git_ref.as_deref(),
            base_ref.as_deref(),
        )
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDecision {
    pub event: CiEvent,
    pub triggered: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

fn first_match(patterns: &[String], value: &str) -> Option<String> {
    patterns
        .iter()
        .find(|pattern| glob_match(pattern, value))
        .cloned()
}

/// Decide whether `event` triggers the CI pipeline under `config`.
pub fn evaluate(config: &CiConfig, event: CiEvent) -> TriggerDecision {
    let mut warnings = Vec::new();

    let (matched_pattern, reason) = match &event {
        CiEvent::Push { branch } => match first_match(&config.branches, branch) {
            Some(pattern) => {
                let reason = format!("Branch '{}' matches '{}'", branch, pattern);
                (Some(pattern), reason)
            }
            None => (
                None,
                format!(
                    "Branch '{}' matches none of [{}]",
                    branch,
                    config.branches.join(", ")
                ),
            ),
        },
        CiEvent::Tag { name } => match first_match(&config.tags, name) {
            Some(pattern) => {
                if let Some(warning) = semver_warning(name) {
                    warnings.push(warning);
                }
                let reason = format!("Tag '{}' matches '{}'", name, pattern);
                (Some(pattern), reason)
            }
            None => (
                None,
                format!("Tag '{}' matches none of [{}]", name, config.tags.join(", ")),
            ),
        },
        CiEvent::PullRequest { base } => {
            if config.pull_requests {
                (
                    Some("pull_request".to_string()),
                    format!("Pull request into '{}'", base),
                )
            } else {
                (
                    None,
                    "Pull request builds are disabled (ci.pull_requests = false)".to_string(),
                )
            }
        }
    };

    TriggerDecision {
        triggered: matched_pattern.is_some(),
        event,
        reason,
        matched_pattern,
        warnings,
    }
}

/// Version tags should parse as semver once a leading `v` is dropped.
fn semver_warning(tag: &str) -> Option<String> {
    let version = tag.strip_prefix('v').unwrap_or(tag);
    match semver::Version::parse(version) {
        Ok(_) => None,
        Err(e) => Some(format!(
            "Tag '{}' is not a semantic version ({}); the built package version may not match",
            tag, e
        )),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CiRun {
    pub decision: TriggerDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<ReleaseRun>,
    pub exit_code: i32,
}

/// Run the CI variant (lint, test, build) when `event` triggers it.
pub fn run(project_dir: &Path, event: CiEvent, output_mode: OutputMode) -> Result<CiRun> {
    let project = config::load(project_dir)?;
    run_project(&project, event, output_mode)
}

fn run_project(project: &ProjectConfig, event: CiEvent, output_mode: OutputMode) -> Result<CiRun> {
    let decision = evaluate(&project.config.ci, event);
    if !decision.triggered {
        log_status!("ci", "Not triggered: {}", decision.reason);
        return Ok(CiRun {
            decision,
            run: None,
            exit_code: 0,
        });
    }

    log_status!("ci", "{}", decision.reason);
    let options = ReleaseOptions {
        variant: ReleaseVariant::Ci,
        output_mode,
        ..ReleaseOptions::default()
    };
    let run = release::run_project(project, &options)?;
    Ok(CiRun {
        exit_code: run.exit_code,
        decision,
        run: Some(run),
    })
}

// ============================================================================
// Workflow generation
// ============================================================================

#[derive(Debug, Serialize)]
struct Workflow {
    name: String,
    on: WorkflowTriggers,
    jobs: BTreeMap<String, WorkflowJob>,
}

#[derive(Debug, Serialize)]
struct WorkflowTriggers {
    push: PushFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pull_request: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Serialize)]
struct PushFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    branches: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct WorkflowJob {
    #[serde(rename = "runs-on")]
    runs_on: String,
    steps: Vec<WorkflowStep>,
}

#[derive(Debug, Serialize)]
struct WorkflowStep {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    with: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<String>,
}

impl WorkflowStep {
    fn uses(action: &str) -> Self {
        Self {
            name: None,
            uses: Some(action.to_string()),
            with: None,
            run: None,
        }
    }

    fn run(name: &str, command: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            uses: None,
            with: None,
            run: Some(command.to_string()),
        }
    }
}

/// Render a GitHub Actions workflow that runs `pkgship ci run` on the configured triggers.
pub fn workflow_yaml(config: &CiConfig) -> Result<String> {
    let mut setup_python = WorkflowStep::uses("actions/setup-python@v5");
    setup_python.with = Some(BTreeMap::from([(
        "python-version".to_string(),
        config.python_version.clone(),
    )]));

    let mut steps = vec![
        WorkflowStep::uses("actions/checkout@v4"),
        setup_python,
        WorkflowStep::run(
            "Install tools",
            "python -m pip install --upgrade pip flake8 pytest build && python -m pip install -e .",
        ),
    ];
    if !config.pkgship_install.trim().is_empty() {
        steps.push(WorkflowStep::run("Install pkgship", &config.pkgship_install));
    }
    steps.push(WorkflowStep::run("Run pipeline", "pkgship ci run --stream"));

    let workflow = Workflow {
        name: "pipeline".to_string(),
        on: WorkflowTriggers {
            push: PushFilter {
                branches: config.branches.clone(),
                tags: config.tags.clone(),
            },
            pull_request: config.pull_requests.then(BTreeMap::new),
        },
        jobs: BTreeMap::from([(
            "pipeline".to_string(),
            WorkflowJob {
                runs_on: "ubuntu-latest".to_string(),
                steps,
            },
        )]),
    };

    serde_yml::to_string(&workflow)
        .map_err(|e| Error::internal_unexpected(format!("Failed to render workflow: {}", e)))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub path: String,
    pub overwritten: bool,
}

/// Write the workflow into `<project>/.github/workflows/pkgship.yml`.
pub fn write_workflow(project: &ProjectConfig, force: bool) -> Result<WorkflowResult> {
    let path = project.root.join(WORKFLOW_PATH);
    let exists = path.exists();
    if exists && !force {
        return Err(Error::config_already_exists(path.display().to_string()));
    }

    let content = workflow_yaml(&project.config.ci)?;
    io::write_file_atomic(&path, &content, &format!("write {}", path.display()))?;
    log_status!("ci", "Wrote {}", path.display());

    Ok(WorkflowResult {
        path: path.display().to_string(),
        overwritten: exists,
    })
}
