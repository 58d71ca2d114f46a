use clap::Args;

use pkgship::release::{self, ReleaseOptions, ReleaseRun, ReleaseStepType};

use super::{CmdResult, GlobalArgs, RunArgs};

/// Arguments for running one pipeline step on its own.
#[derive(Args, Debug)]
pub struct StepArgs {
    #[command(flatten)]
    pub run: RunArgs,
}

/// Run a single step with the same command resolution and environment as a
/// full release. The process exits with the step's own exit code.
pub fn run(step: ReleaseStepType, args: StepArgs, _global: &GlobalArgs) -> CmdResult<ReleaseRun> {
    let project_dir = args.run.project_dir()?;
    let options = ReleaseOptions {
        no_venv: args.run.no_venv,
        output_mode: args.run.output_mode(),
        ..ReleaseOptions::single(step)
    };

    let run = release::run(&project_dir, &options)?;
    let exit_code = run.exit_code;
    Ok((run, exit_code))
}
