use clap::Args;
use std::path::PathBuf;

use pkgship::utils::command::OutputMode;

pub type CmdResult<T> = pkgship::Result<(T, i32)>;

pub(crate) struct GlobalArgs {}

/// Flags shared by every command that runs pipeline steps.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long)]
    pub path: Option<String>,

    /// Use tools from PATH instead of the project's virtual environment
    #[arg(long)]
    pub no_venv: bool,

    /// Forward step output to stderr while it runs instead of capturing it
    #[arg(long)]
    pub stream: bool,
}

impl RunArgs {
    pub fn project_dir(&self) -> pkgship::Result<PathBuf> {
        pkgship::config::resolve_project_dir(self.path.as_deref())
    }

    pub fn output_mode(&self) -> OutputMode {
        if self.stream {
            OutputMode::Stream
        } else {
            OutputMode::Capture
        }
    }
}

pub mod artifacts;
pub mod ci;
pub mod config;
pub mod init;
pub mod release;
pub mod step;

/// Dispatch a command to its handler and map result to JSON.
macro_rules! dispatch {
    ($args:expr, $global:expr, $module:ident) => {
        crate::output::map_cmd_result_to_json($module::run($args, $global))
    };
}

pub(crate) fn run_json(
    command: crate::Commands,
    global: &GlobalArgs,
) -> (pkgship::Result<serde_json::Value>, i32) {
    crate::tty::status("pkgship is working...");

    use pkgship::release::ReleaseStepType;

    match command {
        crate::Commands::Lint(args) => {
            crate::output::map_cmd_result_to_json(step::run(ReleaseStepType::Lint, args, global))
        }
        crate::Commands::Test(args) => {
            crate::output::map_cmd_result_to_json(step::run(ReleaseStepType::Test, args, global))
        }
        crate::Commands::Clean(args) => {
            crate::output::map_cmd_result_to_json(step::run(ReleaseStepType::Clean, args, global))
        }
        crate::Commands::Build(args) => {
            crate::output::map_cmd_result_to_json(step::run(ReleaseStepType::Build, args, global))
        }
        crate::Commands::Upload(args) => {
            crate::output::map_cmd_result_to_json(step::run(ReleaseStepType::Upload, args, global))
        }
        crate::Commands::Release(args) => dispatch!(args, global, release),
        crate::Commands::Ci(args) => dispatch!(args, global, ci),
        crate::Commands::Artifacts(args) => dispatch!(args, global, artifacts),
        crate::Commands::Init(args) => dispatch!(args, global, init),
        crate::Commands::Config(args) => dispatch!(args, global, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn run_args_resolve_project_dir_from_path_flag() {
        let dir = TempDir::new().unwrap();
        let args = RunArgs {
            path: Some(dir.path().display().to_string()),
            stream: true,
            ..Default::default()
        };

        let resolved = args.project_dir().unwrap();

        assert_eq!(resolved, dir.path().canonicalize().unwrap());
        assert!(matches!(args.output_mode(), OutputMode::Stream));
    }

    #[test]
    fn run_args_reject_missing_project_dir() {
        let dir = TempDir::new().unwrap();
        let args = RunArgs {
            path: Some(dir.path().join("absent").display().to_string()),
            ..Default::default()
        };

        let err = args.project_dir().unwrap_err();

        assert_eq!(err.code, pkgship::ErrorCode::ValidationInvalidArgument);
        assert!(matches!(args.output_mode(), OutputMode::Capture));
    }
}
