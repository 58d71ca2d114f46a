use std::path::PathBuf;

use crate::artifacts::{self, Artifact};
use crate::config::ProjectConfig;
use crate::engine::pipeline::{
    PipelineRunStatus, PipelineStep, PipelineStepExecutor, PipelineStepResult,
};
use crate::error::{Error, ErrorCode, Result, StepFailedDetails};
use crate::metadata::PackageMetadata;
use crate::output::{BuildOutput, StepOutput, UploadOutput};
use crate::utils::command::{self, OutputMode};
use crate::utils::shell;
use crate::utils::template::{self, TemplateVars};
use crate::venv::Activation;

use super::types::{command_of, ReleaseStepType};

/// Lines of failing output kept in the error details.
const OUTPUT_TAIL_LINES: usize = 20;

pub(crate) struct ReleaseStepExecutor {
    root: PathBuf,
    output_dir: PathBuf,
    activation: Activation,
    metadata: Option<PackageMetadata>,
    mode: OutputMode,
}

impl ReleaseStepExecutor {
    pub fn new(
        project: &ProjectConfig,
        activation: Activation,
        metadata: Option<PackageMetadata>,
        mode: OutputMode,
    ) -> Self {
        Self {
            root: project.root.clone(),
            output_dir: project.output_dir(),
            activation,
            metadata,
            mode,
        }
    }

    fn step_result(
        &self,
        step: &PipelineStep,
        data: Option<serde_json::Value>,
        warnings: Vec<String>,
    ) -> PipelineStepResult {
        let mut result = PipelineStepResult::new(step, PipelineRunStatus::Success);
        result.exit_code = Some(0);
        result.data = data;
        result.warnings = warnings;
        result
    }

    fn execute_core_step(&self, step: &PipelineStep) -> Result<PipelineStepResult> {
        match ReleaseStepType::from_str(&step.step_type) {
            Some(ReleaseStepType::Lint) | Some(ReleaseStepType::Test) => self.run_check(step),
            Some(ReleaseStepType::Clean) => self.run_clean(step),
            Some(ReleaseStepType::Build) => self.run_build(step),
            Some(ReleaseStepType::Upload) => self.run_upload(step),
            None => Err(Error::internal_unexpected(format!(
                "Unknown release step type '{}'",
                step.step_type
            ))),
        }
    }

    /// Run the step's command with `{{artifacts}}` bound to `artifacts`.
    /// A non-zero exit becomes a `pipeline.<step>_failed` error.
    fn run_command(&self, step: &PipelineStep, artifacts: &[Artifact]) -> Result<StepOutput> {
        let template = command_of(&step.config).ok_or_else(|| {
            Error::config_missing_key(format!("{}.command", step.id), None)
        })?;

        let artifact_paths: Vec<String> = artifacts.iter().map(|a| a.path.clone()).collect();
        let quoted = shell::quote_args(&artifact_paths);
        let rendered = template::render(&template, &[(TemplateVars::ARTIFACTS, &quoted)]);

        log_status!("release", "{}: {}", step.id, rendered);

        let output = command::execute_shell(&rendered, Some(&self.root), self.mode, |cmd| {
            self.activation.apply(cmd)
        });

        if !output.success {
            return Err(Error::step_failed(StepFailedDetails {
                step: step.id.clone(),
                command: rendered,
                exit_code: output.exit_code,
                output_tail: command::output_tail(&output, OUTPUT_TAIL_LINES),
            }));
        }

        Ok(StepOutput::from_command(rendered, output))
    }

    fn run_check(&self, step: &PipelineStep) -> Result<PipelineStepResult> {
        let output = self.run_command(step, &[])?;
        let data = to_value(&output, "step output")?;
        Ok(self.step_result(step, Some(data), Vec::new()))
    }

    fn run_clean(&self, step: &PipelineStep) -> Result<PipelineStepResult> {
        let cleaned = artifacts::clean(&self.output_dir).map_err(|e| Error {
            code: ErrorCode::PipelineCleanFailed,
            ..e
        })?;
        let data = to_value(&cleaned, "clean output")?;
        Ok(self.step_result(step, Some(data), Vec::new()))
    }

    fn run_build(&self, step: &PipelineStep) -> Result<PipelineStepResult> {
        let before = artifacts::snapshot(&self.output_dir)?;
        let output = self.run_command(step, &[])?;
        let after = artifacts::list(&self.output_dir)?;
        let stale = artifacts::stale(&before, &after, self.metadata.as_ref());

        let mut warnings = Vec::new();
        if after.is_empty() {
            warnings.push(format!(
                "Build succeeded but {} contains no artifacts",
                self.output_dir.display()
            ));
        }
        if !stale.is_empty() {
            warnings.push(format!(
                "{} contains {} artifact(s) not produced by this build: {}",
                self.output_dir.display(),
                stale.len(),
                stale.join(", ")
            ));
        }

        let data = to_value(
            &BuildOutput {
                step: output,
                artifacts: after,
                stale,
            },
            "build output",
        )?;
        Ok(self.step_result(step, Some(data), warnings))
    }

    fn run_upload(&self, step: &PipelineStep) -> Result<PipelineStepResult> {
        let uploadable = artifacts::list(&self.output_dir)?;
        if uploadable.is_empty() {
            return Err(Error::no_artifacts(self.output_dir.display().to_string()));
        }

        let output = self.run_command(step, &uploadable)?;
        let data = to_value(
            &UploadOutput {
                step: output,
                uploaded: uploadable,
            },
            "upload output",
        )?;
        Ok(self.step_result(step, Some(data), Vec::new()))
    }
}

fn to_value<T: serde::Serialize>(value: &T, context: &str) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::internal_json(e.to_string(), Some(context.to_string())))
}

impl PipelineStepExecutor for ReleaseStepExecutor {
    fn execute_step(&self, step: &PipelineStep) -> Result<PipelineStepResult> {
        self.execute_core_step(step)
    }
}
