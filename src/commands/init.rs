use clap::Args;
use serde::Serialize;

use pkgship::ci::{self, WorkflowResult};
use pkgship::config::{self, InitResult};

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct InitArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long)]
    path: Option<String>,

    /// Overwrite existing files
    #[arg(long)]
    force: bool,

    /// Also write the GitHub Actions workflow
    #[arg(long)]
    workflow: bool,
}

#[derive(Serialize)]
pub struct InitOutput {
    command: &'static str,
    config: InitResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    workflow: Option<WorkflowResult>,
}

pub fn run(args: InitArgs, _global: &GlobalArgs) -> CmdResult<InitOutput> {
    let project_dir = config::resolve_project_dir(args.path.as_deref())?;
    let written = config::init(&project_dir, args.force)?;

    let workflow = if args.workflow {
        let project = config::load(&project_dir)?;
        Some(ci::write_workflow(&project, args.force)?)
    } else {
        None
    };

    Ok((
        InitOutput {
            command: "init",
            config: written,
            workflow,
        },
        0,
    ))
}
