use clap::Args;
use serde::Serialize;

use pkgship::artifacts::{self, Artifact};
use pkgship::config;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ArtifactsArgs {
    /// Project directory (defaults to the current directory)
    #[arg(long)]
    path: Option<String>,

    /// Only list artifacts whose file name matches this glob (e.g. "*.whl")
    #[arg(long)]
    pattern: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactsOutput {
    output_dir: String,
    artifacts: Vec<Artifact>,
}

pub fn run(args: ArtifactsArgs, _global: &GlobalArgs) -> CmdResult<ArtifactsOutput> {
    let project = config::load(&config::resolve_project_dir(args.path.as_deref())?)?;
    let output_dir = project.output_dir();
    let artifacts = artifacts::select(artifacts::list(&output_dir)?, args.pattern.as_deref())?;

    Ok((
        ArtifactsOutput {
            output_dir: output_dir.display().to_string(),
            artifacts,
        },
        0,
    ))
}
