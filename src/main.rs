use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;
mod tty;

use commands::{artifacts, ci, config, init, release, step};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "pkgship")]
#[command(version = VERSION)]
#[command(about = "Lint, test, build, and upload Python packages with one fail-fast pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the lint step
    Lint(step::StepArgs),
    /// Run the test step
    Test(step::StepArgs),
    /// Remove the build output directory
    Clean(step::StepArgs),
    /// Run the build step
    Build(step::StepArgs),
    /// Upload the artifacts in the build output directory
    Upload(step::StepArgs),
    /// Run lint, test, clean, build, and upload in order, stopping at the first failure
    Release(release::ReleaseArgs),
    /// Evaluate CI triggers and run the CI pipeline
    Ci(ci::CiArgs),
    /// List artifacts in the build output directory
    Artifacts(artifacts::ArtifactsArgs),
    /// Write a starter pkgship.json for a project
    Init(init::InitArgs),
    /// Inspect and change pipeline configuration
    Config(config::ConfigArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let global = GlobalArgs {};

    let (json_result, exit_code) = commands::run_json(cli.command, &global);

    if output::print_json_result(json_result, exit_code).is_err() {
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
