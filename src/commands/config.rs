use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::Value;

use pkgship::config::{self, ProjectConfig};
use pkgship::defaults::{self, PipelineConfig};
use pkgship::paths;

use super::{CmdResult, GlobalArgs};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Display the effective configuration for a project (defaults + global + pkgship.json)
    Show {
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        path: Option<String>,
        /// Show only built-in defaults (ignore every pkgship.json)
        #[arg(long)]
        builtin: bool,
    },
    /// Set a global default at a JSON pointer path
    Set {
        /// JSON pointer path (e.g., /lint/command)
        pointer: String,
        /// Value to set (JSON; bare words are taken as strings)
        value: String,
    },
    /// Reset global defaults to built-in values (deletes the global pkgship.json)
    Reset,
    /// Show the global and project config file paths
    Path {
        /// Project directory (defaults to the current directory)
        #[arg(long)]
        path: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "command")]
pub enum ConfigOutput {
    #[serde(rename = "config.show")]
    Show {
        #[serde(skip_serializing_if = "Option::is_none")]
        project: Option<ProjectConfig>,
        #[serde(skip_serializing_if = "Option::is_none")]
        defaults: Option<PipelineConfig>,
    },
    #[serde(rename = "config.set")]
    Set {
        path: String,
        pointer: String,
        value: Value,
        defaults: PipelineConfig,
    },
    #[serde(rename = "config.reset")]
    Reset {
        path: String,
        deleted: bool,
        defaults: PipelineConfig,
    },
    #[serde(rename = "config.path")]
    Path {
        global: String,
        global_exists: bool,
        project: String,
        project_exists: bool,
    },
}

pub fn run(args: ConfigArgs, _global: &GlobalArgs) -> CmdResult<ConfigOutput> {
    match args.command {
        ConfigCommand::Show { path, builtin } => show(path.as_deref(), builtin),
        ConfigCommand::Set { pointer, value } => set(&pointer, &value),
        ConfigCommand::Reset => reset(),
        ConfigCommand::Path { path } => path_info(path.as_deref()),
    }
}

fn show(path: Option<&str>, builtin: bool) -> CmdResult<ConfigOutput> {
    if builtin {
        return Ok((
            ConfigOutput::Show {
                project: None,
                defaults: Some(defaults::builtin_defaults()),
            },
            0,
        ));
    }

    let project = config::load(&config::resolve_project_dir(path)?)?;
    Ok((
        ConfigOutput::Show {
            project: Some(project),
            defaults: None,
        },
        0,
    ))
}

fn set(pointer: &str, raw: &str) -> CmdResult<ConfigOutput> {
    let value: Value =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let current = defaults::load_defaults()?;
    let mut json = serde_json::to_value(&current).map_err(|e| {
        pkgship::Error::internal_json(e.to_string(), Some("serialize defaults".to_string()))
    })?;
    config::set_json_pointer(&mut json, pointer, value.clone())?;

    let updated: PipelineConfig = serde_json::from_value(json).map_err(|e| {
        pkgship::Error::validation_invalid_json(e, Some(format!("set {}", pointer)))
    })?;
    config::validate(&updated)?;
    defaults::save_defaults(&updated)?;

    Ok((
        ConfigOutput::Set {
            path: defaults::defaults_path()?,
            pointer: pointer.to_string(),
            value,
            defaults: updated,
        },
        0,
    ))
}

fn reset() -> CmdResult<ConfigOutput> {
    let deleted = defaults::reset_defaults()?;
    Ok((
        ConfigOutput::Reset {
            path: defaults::defaults_path()?,
            deleted,
            defaults: defaults::builtin_defaults(),
        },
        0,
    ))
}

fn path_info(path: Option<&str>) -> CmdResult<ConfigOutput> {
    let global = paths::global_config()?;
    let project = paths::project_config(&config::resolve_project_dir(path)?);
    Ok((
        ConfigOutput::Path {
            global: global.display().to_string(),
            global_exists: global.exists(),
            project: project.display().to_string(),
            project_exists: project.exists(),
        },
        0,
    ))
}
