//! External tool invocation
//!
//! Every external program candi drives (tar, cmake, make, spack, configure
//! scripts) goes through the [`ToolRunner`] trait so the sequencing logic can
//! be exercised without the tools installed.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

use crate::config::defaults;

/// External tool errors
#[derive(Error, Debug)]
pub enum ToolError {
    /// The program could not be started at all
    #[error("Failed to run '{program}': {error}")]
    Spawn { program: String, error: String },

    /// The program ran and exited unsuccessfully
    #[error("`{command}` exited with {}{}", describe_status(.status), format_tail(.tail))]
    Failed {
        command: String,
        status: Option<i32>,
        tail: String,
    },
}

impl ToolError {
    /// Exit status of the failed tool, when it exited normally
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::Failed { status, .. } => *status,
            Self::Spawn { .. } => None,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

fn format_tail(tail: &str) -> String {
    if tail.trim().is_empty() {
        String::new()
    } else {
        format!("\n{}", tail.trim_end())
    }
}

/// A single external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory (inherits the caller's when unset)
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: BTreeMap<String, String>,
    /// Append stdout and stderr to this file instead of capturing them
    pub log_file: Option<PathBuf>,
}

impl ToolInvocation {
    /// Create an invocation of `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Add an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run in the given directory
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Set environment variables
    #[must_use]
    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Send output to a log file
    #[must_use]
    pub fn log_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Command line as a shell user would type it
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// What a finished tool reported
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit status (`None` when killed by a signal)
    pub status: Option<i32>,
    /// Captured stdout (empty when logging to a file)
    pub stdout: String,
    /// Captured stderr (empty when logging to a file)
    pub stderr: String,
}

impl ToolOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given status
    pub fn failed(status: i32) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether the tool exited with status 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs external tools
///
/// `run` reports any exit status as `Ok`; only a failure to start the
/// program is an error. Use [`ToolRunner::run_checked`] when a non-zero exit
/// must abort.
pub trait ToolRunner: Send + Sync {
    /// Run the invocation to completion
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError>;

    /// Run the invocation and turn a non-zero exit into [`ToolError::Failed`]
    fn run_checked(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let output = self.run(invocation)?;
        if output.success() {
            return Ok(output);
        }

        let tail = match &invocation.log_file {
            Some(log) => read_tail(log, defaults::LOG_TAIL_LINES),
            None => tail_lines(&output.stderr, defaults::LOG_TAIL_LINES),
        };
        Err(ToolError::Failed {
            command: invocation.command_line(),
            status: output.status,
            tail,
        })
    }
}

/// [`ToolRunner`] backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemToolRunner;

impl SystemToolRunner {
    /// Create a new runner
    pub fn new() -> Self {
        Self
    }
}

impl ToolRunner for SystemToolRunner {
    fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput, ToolError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).envs(&invocation.env);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!("Running: {}", invocation.command_line());

        let spawn_error = |e: std::io::Error| ToolError::Spawn {
            program: invocation.program.clone(),
            error: e.to_string(),
        };

        if let Some(log_path) = &invocation.log_file {
            let log = open_log(log_path).map_err(spawn_error)?;
            let log_err = log.try_clone().map_err(spawn_error)?;
            let status = cmd
                .stdin(Stdio::null())
                .stdout(log)
                .stderr(log_err)
                .status()
                .map_err(spawn_error)?;
            return Ok(ToolOutput {
                status: status.code(),
                ..ToolOutput::default()
            });
        }

        let output = cmd.stdin(Stdio::null()).output().map_err(spawn_error)?;
        Ok(ToolOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn open_log(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::OpenOptions::new().create(true).append(true).open(path)
}

fn read_tail(path: &Path, lines: usize) -> String {
    fs::read_to_string(path)
        .map(|content| tail_lines(&content, lines))
        .unwrap_or_default()
}

/// Last `lines` lines of `text`
pub fn tail_lines(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
