//! Local process execution primitives.

use serde::Serialize;
use std::path::Path;
use std::process::{Command, Stdio};

/// How a child process's output is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Capture stdout/stderr into the returned `CommandOutput`.
    #[default]
    Capture,
    /// Forward stdout and stderr to our stderr as the child writes them.
    /// Our stdout stays reserved for the JSON response.
    Stream,
}

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    fn spawn_error(err: std::io::Error) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("Command error: {}", err),
            success: false,
            exit_code: -1,
        }
    }
}

/// Captured output from command execution.
/// Reusable primitive for any command that executes external processes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CapturedOutput {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: String, stderr: String) -> Self {
        Self { stdout, stderr }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }
}

fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    }

    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

/// Run a command string through the platform shell.
///
/// `configure` gets the `Command` before spawn, for environment overrides.
/// A command that cannot be spawned yields exit code -1 with the error in stderr.
pub fn execute_shell<F>(
    command: &str,
    current_dir: Option<&Path>,
    mode: OutputMode,
    configure: F,
) -> CommandOutput
where
    F: FnOnce(&mut Command),
{
    let mut cmd = shell_command(command);
    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }
    configure(&mut cmd);

    match mode {
        OutputMode::Capture => match cmd.output() {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput::spawn_error(e),
        },
        OutputMode::Stream => {
            cmd.stdin(Stdio::null());
            cmd.stdout(std::io::stderr());
            cmd.stderr(Stdio::inherit());
            match cmd.status() {
                Ok(status) => CommandOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    success: status.success(),
                    exit_code: status.code().unwrap_or(-1),
                },
                Err(e) => CommandOutput::spawn_error(e),
            }
        }
    }
}

/// Extract error text from command output.
///
/// Prefers stderr, falls back to stdout if stderr is empty.
pub fn error_text(output: &CommandOutput) -> &str {
    if output.stderr.trim().is_empty() {
        output.stdout.trim()
    } else {
        output.stderr.trim()
    }
}

/// Last `lines` lines of the most useful output stream.
pub fn output_tail(output: &CommandOutput, lines: usize) -> String {
    let text = error_text(output);
    let tail: Vec<&str> = text.lines().rev().take(lines).collect();
    tail.into_iter().rev().collect::<Vec<_>>().join("\n")
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn execute_shell_captures_stdout() {
        let out = execute_shell("echo hello", None, OutputMode::Capture, |_| {});
        assert!(out.success);
        assert_eq!(out.exit_code, 0);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn execute_shell_reports_exit_code() {
        let out = execute_shell("exit 3", None, OutputMode::Capture, |_| {});
        assert!(!out.success);
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn execute_shell_applies_env_and_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = execute_shell(
            "printf '%s' \"$PKGSHIP_MARKER\"; pwd",
            Some(dir.path()),
            OutputMode::Capture,
            |cmd| {
                cmd.env("PKGSHIP_MARKER", "marker");
            },
        );
        assert!(out.stdout.starts_with("marker"));
        let canonical = dir.path().canonicalize().unwrap();
        assert!(out.stdout.contains(canonical.file_name().unwrap().to_str().unwrap()));
    }

    #[test]
    fn execute_shell_stream_mode_returns_status_only() {
        let out = execute_shell("echo streamed; exit 2", None, OutputMode::Stream, |_| {});
        assert_eq!(out.exit_code, 2);
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn error_text_prefers_stderr() {
        let out = CommandOutput {
            stdout: "stdout content".to_string(),
            stderr: "stderr content".to_string(),
            success: false,
            exit_code: 1,
        };
        assert_eq!(error_text(&out), "stderr content");
    }

    #[test]
    fn error_text_falls_back_to_stdout() {
        let out = CommandOutput {
            stdout: "stdout content\n".to_string(),
            stderr: "  ".to_string(),
            success: false,
            exit_code: 1,
        };
        assert_eq!(error_text(&out), "stdout content");
    }

    #[test]
    fn output_tail_keeps_last_lines() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "a\nb\nc\nd".to_string(),
            success: false,
            exit_code: 1,
        };
        assert_eq!(output_tail(&out, 2), "c\nd");
    }
}
