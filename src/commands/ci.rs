use clap::{Args, Subcommand};
use serde::Serialize;

use pkgship::ci::{self, CiEvent, CiRun, TriggerDecision, WorkflowResult};
use pkgship::config;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct CiArgs {
    #[command(subcommand)]
    command: CiCommand,
}

#[derive(Subcommand)]
enum CiCommand {
    /// Report whether an event triggers the pipeline
    Check {
        #[command(flatten)]
        event: EventArgs,
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        path: Option<String>,
    },
    /// Run lint, test, and build if the event triggers the pipeline
    Run {
        #[command(flatten)]
        event: EventArgs,
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        path: Option<String>,
        /// Forward step output to stderr while it runs instead of capturing it
        #[arg(long)]
        stream: bool,
    },
    /// Print the GitHub Actions workflow for the configured triggers
    Workflow {
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        path: Option<String>,
        /// Write it to .github/workflows/pkgship.yml instead of printing it
        #[arg(long)]
        write: bool,
        /// Overwrite an existing workflow file
        #[arg(long, requires = "write")]
        force: bool,
    },
}

/// Event to evaluate. Without flags, read from the GitHub Actions environment.
#[derive(Args)]
struct EventArgs {
    /// Push to this branch
    #[arg(long, conflicts_with_all = ["tag", "pull_request"])]
    branch: Option<String>,
    /// Push of this tag
    #[arg(long, conflicts_with = "pull_request")]
    tag: Option<String>,
    /// Pull request into this base branch
    #[arg(long, value_name = "BASE")]
    pull_request: Option<String>,
}

impl EventArgs {
    fn resolve(self) -> pkgship::Result<CiEvent> {
        if let Some(branch) = self.branch {
            return Ok(CiEvent::Push { branch });
        }
        if let Some(name) = self.tag {
            return Ok(CiEvent::Tag { name });
        }
        if let Some(base) = self.pull_request {
            return Ok(CiEvent::PullRequest { base });
        }
        CiEvent::from_env()
    }
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum CiOutput {
    #[serde(rename = "ci.check")]
    Check { decision: TriggerDecision },
    #[serde(rename = "ci.run")]
    Run { result: CiRun },
    #[serde(rename = "ci.workflow")]
    Workflow {
        #[serde(skip_serializing_if = "Option::is_none")]
        written: Option<WorkflowResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        yaml: Option<String>,
    },
}

pub fn run(args: CiArgs, _global: &GlobalArgs) -> CmdResult<CiOutput> {
    match args.command {
        CiCommand::Check { event, path } => {
            let project = config::load(&config::resolve_project_dir(path.as_deref())?)?;
            let decision = ci::evaluate(&project.config.ci, event.resolve()?);
            Ok((CiOutput::Check { decision }, 0))
        }
        CiCommand::Run {
            event,
            path,
            stream,
        } => {
            let project_dir = config::resolve_project_dir(path.as_deref())?;
            let mode = if stream {
                pkgship::utils::command::OutputMode::Stream
            } else {
                pkgship::utils::command::OutputMode::Capture
            };
            let result = ci::run(&project_dir, event.resolve()?, mode)?;
            let exit_code = result.exit_code;
            Ok((CiOutput::Run { result }, exit_code))
        }
        CiCommand::Workflow { path, write, force } => {
            let project = config::load(&config::resolve_project_dir(path.as_deref())?)?;
            if write {
                let written = ci::write_workflow(&project, force)?;
                return Ok((
                    CiOutput::Workflow {
                        written: Some(written),
                        yaml: None,
                    },
                    0,
                ));
            }
            let yaml = ci::workflow_yaml(&project.config.ci)?;
            Ok((
                CiOutput::Workflow {
                    written: None,
                    yaml: Some(yaml),
                },
                0,
            ))
        }
    }
}
