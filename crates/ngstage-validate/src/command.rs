//! External command execution with an explicit environment.

use std::path::PathBuf;

use ngstage_common::error::{Result, StageError};

/// A command to run: program, arguments, working directory, and the
/// complete environment the child sees.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: PathBuf,
    /// Arguments in order.
    pub args: Vec<String>,
    /// Working directory, inherited when `None`.
    pub cwd: Option<PathBuf>,
    /// Environment variables; nothing else is inherited.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Creates a spec for `program` with no arguments and an empty environment.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Adds one environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Looks up an environment variable set on this spec.
    #[must_use]
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Output from a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code returned by the command, `-1` if killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands.
pub trait CommandRunner {
    /// Runs a command to completion and captures its output.
    ///
    /// A non-zero exit is reported through [`CommandOutput::exit_code`],
    /// not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands with [`std::process::Command`] and a cleared environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(program = %spec.program.display(), args = ?spec.args, "running command");

        let mut command = std::process::Command::new(&spec.program);
        let _ = command
            .args(&spec.args)
            .env_clear()
            .envs(spec.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &spec.cwd {
            let _ = command.current_dir(dir);
        }

        let output = command.output().map_err(|e| StageError::Command {
            program: spec.program.display().to_string(),
            source: e,
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}
