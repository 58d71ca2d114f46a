//! Public output types for pipeline step results.
//!
//! These land in `PipelineStepResult::data` and in the JSON response, so
//! every field name here is part of the CLI's output contract.

use serde::Serialize;

use crate::artifacts::Artifact;
use crate::utils::command::{CapturedOutput, CommandOutput};

// ============================================================================
// Command Steps
// ============================================================================

/// Result of a step that ran an external command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutput {
    pub command: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "CapturedOutput::is_empty")]
    pub output: CapturedOutput,
}

impl StepOutput {
    pub fn from_command(command: impl Into<String>, output: CommandOutput) -> Self {
        Self {
            command: command.into(),
            exit_code: output.exit_code,
            output: CapturedOutput::new(output.stdout, output.stderr),
        }
    }
}

// ============================================================================
// Build / Upload
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    #[serde(flatten)]
    pub step: StepOutput,
    pub artifacts: Vec<Artifact>,
    /// Artifacts in the output directory that this build did not produce.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stale: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutput {
    #[serde(flatten)]
    pub step: StepOutput,
    pub uploaded: Vec<Artifact>,
}
