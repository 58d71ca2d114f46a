use serde::Serialize;
use std::collections::HashMap;

use crate::artifacts::Artifact;
use crate::engine::pipeline::{self, PipelinePlanStep, PipelineRunResult};
use crate::metadata::PackageMetadata;
use crate::utils::command::OutputMode;
use crate::venv::Activation;

/// The five release steps, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStepType {
    Lint,
    Test,
    Clean,
    Build,
    Upload,
}

impl ReleaseStepType {
    pub const ALL: [ReleaseStepType; 5] = [
        ReleaseStepType::Lint,
        ReleaseStepType::Test,
        ReleaseStepType::Clean,
        ReleaseStepType::Build,
        ReleaseStepType::Upload,
    ];

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "lint" => Some(ReleaseStepType::Lint),
            "test" => Some(ReleaseStepType::Test),
            "clean" => Some(ReleaseStepType::Clean),
            "build" => Some(ReleaseStepType::Build),
            "upload" => Some(ReleaseStepType::Upload),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseStepType::Lint => "lint",
            ReleaseStepType::Test => "test",
            ReleaseStepType::Clean => "clean",
            ReleaseStepType::Build => "build",
            ReleaseStepType::Upload => "upload",
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            ReleaseStepType::Lint => "Lint sources",
            ReleaseStepType::Test => "Run test suite",
            ReleaseStepType::Clean => "Remove previous build output",
            ReleaseStepType::Build => "Build distributions",
            ReleaseStepType::Upload => "Upload distributions to the package index",
        }
    }
}

/// Which pipeline shape to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseVariant {
    /// Lint, test, build. No clean, no upload, venv optional.
    Ci,
    /// Lint, test, optional clean, build, upload. Venv required.
    #[default]
    Manual,
}

impl ReleaseVariant {
    pub fn steps(&self) -> &'static [ReleaseStepType] {
        match self {
            ReleaseVariant::Ci => &[
                ReleaseStepType::Lint,
                ReleaseStepType::Test,
                ReleaseStepType::Build,
            ],
            ReleaseVariant::Manual => &ReleaseStepType::ALL,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    pub variant: ReleaseVariant,
    /// Override `clean_before_build`. `None` keeps the config value.
    pub clean: Option<bool>,
    pub skip_upload: bool,
    pub no_venv: bool,
    pub dry_run: bool,
    pub output_mode: OutputMode,
    /// Run just this step instead of the variant's full list.
    pub only: Option<ReleaseStepType>,
}

impl ReleaseOptions {
    pub fn single(step: ReleaseStepType) -> Self {
        Self {
            only: Some(step),
            ..Self::default()
        }
    }

    /// The manual release is gated on its venv; everything else activates it
    /// when present and falls back to PATH.
    pub(crate) fn requires_venv(&self) -> bool {
        self.variant == ReleaseVariant::Manual && self.only.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePlan {
    pub project_dir: String,
    pub variant: ReleaseVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageMetadata>,
    pub output_dir: String,
    pub environment: Activation,
    pub steps: Vec<ReleasePlanStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleasePlanStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub status: ReleasePlanStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

impl From<PipelinePlanStep> for ReleasePlanStep {
    fn from(step: PipelinePlanStep) -> Self {
        let status = match step.status {
            pipeline::PipelineStepStatus::Ready => ReleasePlanStatus::Ready,
            pipeline::PipelineStepStatus::Missing => ReleasePlanStatus::Missing,
            pipeline::PipelineStepStatus::Disabled => ReleasePlanStatus::Disabled,
        };

        Self {
            command: command_of(&step.config),
            id: step.id,
            step_type: step.step_type,
            label: step.label,
            status,
            missing: step.missing,
        }
    }
}

pub(crate) fn command_of(config: &HashMap<String, serde_json::Value>) -> Option<String> {
    config
        .get("command")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePlanStatus {
    Ready,
    Missing,
    Disabled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRun {
    pub run_id: String,
    pub project_dir: String,
    pub variant: ReleaseVariant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<PackageMetadata>,
    pub environment: Activation,
    pub started_at: String,
    pub finished_at: String,
    pub result: PipelineRunResult,
    /// Steps left out of this run by config or flags.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub disabled: Vec<String>,
    /// Contents of the output directory after the run.
    pub artifacts: Vec<Artifact>,
    pub exit_code: i32,
}

impl ReleaseRun {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}
