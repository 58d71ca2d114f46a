use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,
    ConfigAlreadyExists,

    ValidationMissingArgument,
    ValidationInvalidArgument,
    ValidationInvalidJson,

    EnvironmentNotFound,

    PipelineLintFailed,
    PipelineTestFailed,
    PipelineCleanFailed,
    PipelineBuildFailed,
    PipelineUploadFailed,
    PipelineNoArtifacts,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",
            ErrorCode::ConfigAlreadyExists => "config.already_exists",

            ErrorCode::ValidationMissingArgument => "validation.missing_argument",
            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",
            ErrorCode::ValidationInvalidJson => "validation.invalid_json",

            ErrorCode::EnvironmentNotFound => "environment.not_found",

            ErrorCode::PipelineLintFailed => "pipeline.lint_failed",
            ErrorCode::PipelineTestFailed => "pipeline.test_failed",
            ErrorCode::PipelineCleanFailed => "pipeline.clean_failed",
            ErrorCode::PipelineBuildFailed => "pipeline.build_failed",
            ErrorCode::PipelineUploadFailed => "pipeline.upload_failed",
            ErrorCode::PipelineNoArtifacts => "pipeline.no_artifacts",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingArgumentDetails {
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentNotFoundDetails {
    pub path: String,
    pub expected_bin_dir: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFailedDetails {
    pub step: String,
    pub command: String,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output_tail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalJsonErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_missing_argument(args: Vec<String>) -> Self {
        Self::new(
            ErrorCode::ValidationMissingArgument,
            "Missing required argument",
            to_details(MissingArgumentDetails { args }),
        )
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let problem = problem.into();
        let details = to_details(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.clone(),
            id,
            tried,
        });

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid argument: {}", problem),
            details,
        )
    }

    pub fn validation_invalid_json(err: serde_json::Error, context: Option<String>) -> Self {
        let details = serde_json::json!({
            "error": err.to_string(),
            "context": context,
        });

        Self::new(ErrorCode::ValidationInvalidJson, "Invalid JSON", details)
    }

    pub fn config_missing_key(key: impl Into<String>, path: Option<String>) -> Self {
        Self::new(
            ErrorCode::ConfigMissingKey,
            "Missing required configuration key",
            to_details(ConfigMissingKeyDetails {
                key: key.into(),
                path,
            }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigInvalidJson,
            format!("Invalid JSON in configuration file {}", path),
            to_details(ConfigInvalidJsonDetails {
                path,
                error: err.to_string(),
            }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value for '{}': {}", key, problem),
            to_details(ConfigInvalidValueDetails {
                key,
                value,
                problem,
            }),
        )
    }

    pub fn config_already_exists(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ConfigAlreadyExists,
            format!("Configuration file already exists: {}", path),
            serde_json::json!({ "path": path }),
        )
        .with_hint("Pass --force to overwrite the existing file")
    }

    pub fn environment_not_found(
        path: impl Into<String>,
        expected_bin_dir: impl Into<String>,
    ) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::EnvironmentNotFound,
            format!("Virtual environment not found at {}", path),
            to_details(EnvironmentNotFoundDetails {
                path: path.clone(),
                expected_bin_dir: expected_bin_dir.into(),
            }),
        )
        .with_hint(format!("Create it with: python -m venv {}", path))
        .with_hint("Or run with --no-venv to use the tools already on PATH")
    }

    /// Error for a pipeline step that ran and exited non-zero.
    pub fn step_failed(details: StepFailedDetails) -> Self {
        let code = match details.step.as_str() {
            "lint" => ErrorCode::PipelineLintFailed,
            "test" => ErrorCode::PipelineTestFailed,
            "clean" => ErrorCode::PipelineCleanFailed,
            "build" => ErrorCode::PipelineBuildFailed,
            "upload" => ErrorCode::PipelineUploadFailed,
            _ => ErrorCode::InternalUnexpected,
        };
        let message = format!(
            "Step '{}' failed with exit code {}",
            details.step, details.exit_code
        );

        let mut err = Self::new(code, message, to_details(&details));
        // Exit codes 126/127 are the only universal POSIX signals worth translating.
        match details.exit_code {
            127 => {
                err = err.with_hint(
                    "Command not found. Check that the tool is installed in the active environment.",
                )
            }
            126 => err = err.with_hint("Permission denied. Check the command's file permissions."),
            _ => {}
        }
        if code == ErrorCode::PipelineUploadFailed {
            err.retryable = Some(true);
        }
        err
    }

    pub fn no_artifacts(output_dir: impl Into<String>) -> Self {
        let output_dir = output_dir.into();
        Self::new(
            ErrorCode::PipelineNoArtifacts,
            format!("No artifacts found in {}", output_dir),
            serde_json::json!({ "outputDir": output_dir }),
        )
        .with_hint("Run 'pkgship build' before uploading")
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalJsonErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(step: &str, exit_code: i32) -> Error {
        Error::step_failed(StepFailedDetails {
            step: step.to_string(),
            command: "cmd".to_string(),
            exit_code,
            output_tail: String::new(),
        })
    }

    #[test]
    fn step_failed_maps_step_to_code() {
        assert_eq!(failed("lint", 1).code, ErrorCode::PipelineLintFailed);
        assert_eq!(failed("test", 1).code, ErrorCode::PipelineTestFailed);
        assert_eq!(failed("build", 2).code, ErrorCode::PipelineBuildFailed);
        assert_eq!(failed("upload", 1).code, ErrorCode::PipelineUploadFailed);
    }

    #[test]
    fn step_failed_translates_command_not_found() {
        let err = failed("build", 127);
        assert_eq!(err.hints.len(), 1);
        assert!(err.hints[0].message.contains("not found"));
    }

    #[test]
    fn only_upload_failures_are_retryable() {
        assert_eq!(failed("upload", 1).retryable, Some(true));
        assert_eq!(failed("lint", 1).retryable, None);
    }

    #[test]
    fn step_failed_details_omit_empty_output() {
        let err = failed("lint", 1);
        assert!(err.details.get("outputTail").is_none());
        assert_eq!(err.details["exitCode"], 1);
    }
}
