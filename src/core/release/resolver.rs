use std::ffi::OsString;
use std::path::PathBuf;

use crate::engine::pipeline::{PipelineCapabilityResolver, PipelineStep};
use crate::utils::{shell, which};
use crate::venv::Activation;

use super::types::{command_of, ReleaseStepType};

/// Decides whether a step's tool is reachable on the PATH the step will run with.
pub(crate) struct ReleaseCapabilityResolver {
    search_path: Option<OsString>,
    cwd: PathBuf,
}

impl ReleaseCapabilityResolver {
    pub fn new(activation: &Activation, cwd: PathBuf) -> Self {
        Self {
            search_path: activation.path.clone(),
            cwd,
        }
    }

    /// Program a command step would invoke, if one can be named.
    fn program(step: &PipelineStep) -> Option<String> {
        command_of(&step.config).and_then(|command| shell::program_name(&command))
    }

    fn program_found(&self, program: &str) -> bool {
        shell::is_builtin(program)
            || which::find_program(program, self.search_path.as_deref(), &self.cwd).is_some()
    }
}

impl PipelineCapabilityResolver for ReleaseCapabilityResolver {
    fn is_supported(&self, step: &PipelineStep) -> bool {
        match ReleaseStepType::from_str(&step.step_type) {
            Some(ReleaseStepType::Clean) => true,
            Some(_) => match Self::program(step) {
                Some(program) => self.program_found(&program),
                // Shell constructs; let the shell decide at run time.
                None => true,
            },
            None => false,
        }
    }

    fn missing(&self, step: &PipelineStep) -> Vec<String> {
        match ReleaseStepType::from_str(&step.step_type) {
            Some(ReleaseStepType::Clean) => Vec::new(),
            Some(_) => match Self::program(step) {
                Some(program) if !self.program_found(&program) => {
                    vec![format!("Program '{}' not found on PATH", program)]
                }
                _ => Vec::new(),
            },
            None => vec![format!("Unknown step type '{}'", step.step_type)],
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn step(step_type: &str, command: &str) -> PipelineStep {
        let mut config = HashMap::new();
        config.insert("command".to_string(), serde_json::json!(command));
        PipelineStep {
            id: step_type.to_string(),
            step_type: step_type.to_string(),
            label: None,
            config,
        }
    }

    fn resolver_with(bin: &std::path::Path, cwd: &std::path::Path) -> ReleaseCapabilityResolver {
        let mut activation = Activation::none();
        activation.path = Some(bin.as_os_str().to_os_string());
        ReleaseCapabilityResolver::new(&activation, cwd.to_path_buf())
    }

    #[test]
    fn finds_tool_in_search_path() {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join("flake8");
        fs::write(&tool, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&tool, fs::Permissions::from_mode(0o755)).unwrap();

        let resolver = resolver_with(dir.path(), dir.path());
        assert!(resolver.is_supported(&step("lint", "flake8 src tests")));
        assert!(resolver.missing(&step("lint", "flake8 src tests")).is_empty());
    }

    #[test]
    fn reports_missing_tool() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_with(dir.path(), dir.path());
        let test_step = step("test", "pytest -q");
        assert!(!resolver.is_supported(&test_step));
        assert_eq!(
            resolver.missing(&test_step),
            vec!["Program 'pytest' not found on PATH"]
        );
    }

    #[test]
    fn shell_builtins_are_always_available() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_with(dir.path(), dir.path());
        assert!(resolver.is_supported(&step("lint", "exit 1")));
    }

    #[test]
    fn clean_needs_no_tool() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_with(dir.path(), dir.path());
        let clean = PipelineStep {
            id: "clean".to_string(),
            step_type: "clean".to_string(),
            label: None,
            config: HashMap::new(),
        };
        assert!(resolver.is_supported(&clean));
    }

    #[test]
    fn unknown_step_type_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let resolver = resolver_with(dir.path(), dir.path());
        assert!(!resolver.is_supported(&step("deploy", "true")));
    }
}
