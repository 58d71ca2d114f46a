use clap::Args;
use serde::Serialize;

use pkgship::release::{self, ReleaseOptions, ReleasePlan, ReleaseRun, ReleaseVariant};

use super::{CmdResult, GlobalArgs, RunArgs};

#[derive(Args)]
pub struct ReleaseArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Remove the output directory before building (overrides clean_before_build)
    #[arg(long, overrides_with = "no_clean")]
    clean: bool,

    /// Keep existing build output (overrides clean_before_build)
    #[arg(long, overrides_with = "clean")]
    no_clean: bool,

    /// Stop after the build step
    #[arg(long)]
    skip_upload: bool,

    /// Show the resolved steps and commands without running anything
    #[arg(long)]
    dry_run: bool,
}

impl ReleaseArgs {
    fn clean_override(&self) -> Option<bool> {
        match (self.clean, self.no_clean) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "command")]
pub enum ReleaseOutput {
    #[serde(rename = "release.plan")]
    Plan { plan: ReleasePlan },
    #[serde(rename = "release.run")]
    Run { run: ReleaseRun },
}

pub fn run(args: ReleaseArgs, _global: &GlobalArgs) -> CmdResult<ReleaseOutput> {
    let project_dir = args.run.project_dir()?;
    let options = ReleaseOptions {
        variant: ReleaseVariant::Manual,
        clean: args.clean_override(),
        skip_upload: args.skip_upload,
        no_venv: args.run.no_venv,
        dry_run: args.dry_run,
        output_mode: args.run.output_mode(),
        only: None,
    };

    if options.dry_run {
        let plan = release::plan(&project_dir, &options)?;
        return Ok((ReleaseOutput::Plan { plan }, 0));
    }

    let run = release::run(&project_dir, &options)?;
    let exit_code = run.exit_code;
    Ok((ReleaseOutput::Run { run }, exit_code))
}
