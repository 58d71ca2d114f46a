use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlan {
    pub steps: Vec<PipelinePlanStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlanStep {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub config: HashMap<String, serde_json::Value>,
    pub status: PipelineStepStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStepStatus {
    Ready,
    Missing,
    Disabled,
}

pub trait PipelineCapabilityResolver {
    fn is_supported(&self, step: &PipelineStep) -> bool;
    fn missing(&self, step: &PipelineStep) -> Vec<String>;
}

pub trait PipelineStepExecutor {
    fn execute_step(&self, step: &PipelineStep) -> Result<PipelineStepResult>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStepResult {
    pub id: String,
    #[serde(rename = "type")]
    pub step_type: String,
    pub status: PipelineRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<crate::error::Hint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl PipelineStepResult {
    pub fn new(step: &PipelineStep, status: PipelineRunStatus) -> Self {
        Self {
            id: step.id.clone(),
            step_type: step.step_type.clone(),
            status,
            exit_code: None,
            missing: Vec::new(),
            warnings: Vec::new(),
            hints: Vec::new(),
            data: None,
            error: None,
            error_code: None,
            duration_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunResult {
    pub steps: Vec<PipelineStepResult>,
    pub status: PipelineRunStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub summary: PipelineRunSummary,
}

impl PipelineRunResult {
    /// The step that stopped the run, if any.
    pub fn first_failure(&self) -> Option<&PipelineStepResult> {
        self.steps.iter().find(|r| {
            matches!(
                r.status,
                PipelineRunStatus::Failed | PipelineRunStatus::Missing
            )
        })
    }

    /// Process exit code for this run: the failing step's own code, else 0.
    pub fn exit_code(&self) -> i32 {
        match self.first_failure() {
            Some(failed) => match failed.exit_code {
                Some(code) if code > 0 => code,
                _ => 1,
            },
            None => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunSummary {
    pub total_steps: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub missing: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineRunStatus {
    Success,
    Failed,
    Skipped,
    Missing,
}

pub fn plan(
    steps: &[PipelineStep],
    resolver: &dyn PipelineCapabilityResolver,
    disabled: &HashSet<String>,
    field: &str,
) -> Result<PipelinePlan> {
    validate_steps(steps, field)?;

    let planned_steps = steps
        .iter()
        .cloned()
        .map(|step| to_plan_step(step, resolver, disabled))
        .collect();

    Ok(PipelinePlan {
        steps: planned_steps,
        warnings: Vec::new(),
    })
}

fn validate_steps(steps: &[PipelineStep], field: &str) -> Result<()> {
    let mut seen = HashSet::new();
    for step in steps {
        if !seen.insert(step.id.as_str()) {
            return Err(Error::validation_invalid_argument(
                field,
                format!("Duplicate step id '{}'", step.id),
                None,
                None,
            ));
        }
    }
    Ok(())
}

fn to_plan_step(
    step: PipelineStep,
    resolver: &dyn PipelineCapabilityResolver,
    disabled: &HashSet<String>,
) -> PipelinePlanStep {
    let (status, missing) = if disabled.contains(&step.id) {
        (PipelineStepStatus::Disabled, Vec::new())
    } else if resolver.is_supported(&step) {
        (PipelineStepStatus::Ready, Vec::new())
    } else {
        (PipelineStepStatus::Missing, resolver.missing(&step))
    };

    PipelinePlanStep {
        id: step.id,
        step_type: step.step_type,
        label: step.label,
        config: step.config,
        status,
        missing,
    }
}

/// Run steps strictly in order, stopping at the first step that fails or
/// cannot run. Every step after that is reported as skipped and never executed.
pub fn run(
    steps: &[PipelineStep],
    executor: &dyn PipelineStepExecutor,
    resolver: &dyn PipelineCapabilityResolver,
    field: &str,
) -> Result<PipelineRunResult> {
    validate_steps(steps, field)?;

    let mut results: Vec<PipelineStepResult> = Vec::with_capacity(steps.len());
    let mut stopped_by: Option<String> = None;

    for step in steps {
        if let Some(ref blocker) = stopped_by {
            let mut skipped = PipelineStepResult::new(step, PipelineRunStatus::Skipped);
            skipped
                .warnings
                .push(format!("Skipped because '{}' did not succeed", blocker));
            results.push(skipped);
            continue;
        }

        let result = execute_single_step(step, executor, resolver);
        if result.status != PipelineRunStatus::Success {
            stopped_by = Some(step.id.clone());
        }
        results.push(result);
    }

    let status = derive_overall_status(&results);
    let summary = build_summary(&results, &status);

    Ok(PipelineRunResult {
        steps: results,
        status,
        warnings: Vec::new(),
        summary,
    })
}

fn derive_overall_status(results: &[PipelineStepResult]) -> PipelineRunStatus {
    if results
        .iter()
        .any(|r| matches!(r.status, PipelineRunStatus::Failed))
    {
        return PipelineRunStatus::Failed;
    }
    if results
        .iter()
        .any(|r| matches!(r.status, PipelineRunStatus::Missing))
    {
        return PipelineRunStatus::Missing;
    }
    if !results.is_empty()
        && results
            .iter()
            .all(|r| matches!(r.status, PipelineRunStatus::Skipped))
    {
        return PipelineRunStatus::Skipped;
    }
    PipelineRunStatus::Success
}

fn build_summary(results: &[PipelineStepResult], status: &PipelineRunStatus) -> PipelineRunSummary {
    let count = |wanted: PipelineRunStatus| results.iter().filter(|r| r.status == wanted).count();

    let next_actions = match status {
        PipelineRunStatus::Failed => {
            vec!["Fix the failing step and re-run the whole pipeline".to_string()]
        }
        PipelineRunStatus::Missing => {
            vec!["Install the missing tools into the active environment".to_string()]
        }
        _ => Vec::new(),
    };

    PipelineRunSummary {
        total_steps: results.len(),
        succeeded: count(PipelineRunStatus::Success),
        failed: count(PipelineRunStatus::Failed),
        skipped: count(PipelineRunStatus::Skipped),
        missing: count(PipelineRunStatus::Missing),
        next_actions,
    }
}

fn execute_single_step(
    step: &PipelineStep,
    executor: &dyn PipelineStepExecutor,
    resolver: &dyn PipelineCapabilityResolver,
) -> PipelineStepResult {
    if !resolver.is_supported(step) {
        let mut result = PipelineStepResult::new(step, PipelineRunStatus::Missing);
        result.missing = resolver.missing(step);
        return result;
    }

    let started = std::time::Instant::now();
    let mut result = match executor.execute_step(step) {
        Ok(mut result) => {
            if result.status == PipelineRunStatus::Success {
                result.missing = Vec::new();
                result.error = None;
            }
            result
        }
        Err(err) => {
            let mut result = PipelineStepResult::new(step, PipelineRunStatus::Failed);
            result.exit_code = err
                .details
                .get("exitCode")
                .and_then(|v| v.as_i64())
                .map(|c| c as i32);
            result.hints = err.hints.clone();
            result.data = Some(err.details.clone());
            result.error = Some(err.message.clone());
            result.error_code = Some(err.code.as_str().to_string());
            result
        }
    };
    result.duration_ms = Some(started.elapsed().as_millis() as u64);
    result
}
