//! Blocking external command execution with captured output.
//!
//! Plugins never spawn processes themselves; they describe a [`CommandSpec`]
//! and hand it to the [`CommandRunner`] held by the run context.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use crate::error::{ReplayError, Result};
use crate::observability;

/// Argument vector, environment and working directory of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    argv: Vec<OsString>,
    /// `None` inherits the current process environment; `Some` replaces it.
    env: Option<BTreeMap<OsString, OsString>>,
    cwd: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            argv: vec![program.as_ref().to_os_string()],
            env: None,
            cwd: None,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.argv.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.argv
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Run with exactly this environment instead of inheriting ours.
    pub fn env_exact<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env = Some(
            vars.into_iter()
                .map(|(k, v)| (k.as_ref().to_os_string(), v.as_ref().to_os_string()))
                .collect(),
        );
        self
    }

    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.argv[0]
    }

    pub fn arguments(&self) -> &[OsString] {
        &self.argv[1..]
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Human readable command line, used in logs and error reports.
    pub fn display(&self) -> String {
        self.argv
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of one finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command: String,
    pub status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn stdout_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

impl fmt::Display for CommandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn indented(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
            for line in text.lines() {
                writeln!(f)?;
                write!(f, "  {line}")?;
            }
            Ok(())
        }

        write!(f, "Command execution result")?;
        if !self.command.is_empty() {
            write!(f, "\nCOMMAND:")?;
            indented(f, &self.command)?;
        }
        write!(f, "\nSTATUS:")?;
        indented(f, &self.status.to_string())?;
        if !self.stdout.is_empty() {
            write!(f, "\nSTDOUT:")?;
            indented(f, &self.stdout_lossy())?;
        }
        if !self.stderr.is_empty() {
            write!(f, "\nSTDERR:")?;
            indented(f, &self.stderr_lossy())?;
        }
        Ok(())
    }
}

/// Extension point for command execution.
///
/// The default is [`SystemCommandRunner`]; embedders and tests substitute their
/// own to observe or simulate virtualenv, pip and database tools.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion. A non-zero exit is a successful call with a
    /// failing [`CommandResult`]; only a failure to start the process is an `Err`.
    fn run(&self, command: &CommandSpec) -> Result<CommandResult>;
}

/// Runs commands as child processes of replay, blocking until they exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandResult> {
        let command_line = spec.display();
        let mut cmd = Command::new(spec.program());
        cmd.args(spec.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref env) = spec.env {
            cmd.env_clear().envs(env);
        }
        if let Some(ref dir) = spec.cwd {
            cmd.current_dir(dir);
        }

        let cwd = spec
            .cwd
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        observability::audit_command_invoked(&command_line, &cwd.to_string_lossy());
        tracing::debug!(command = %command_line, cwd = %cwd.display(), "Running command");

        let start = Instant::now();
        let output = cmd.output().map_err(|source| ReplayError::Spawn {
            command: command_line.clone(),
            source,
        })?;
        let status = exit_code(&output.status);

        observability::audit_command_completed(
            &command_line,
            status,
            start.elapsed().as_millis() as u64,
        );
        tracing::debug!(command = %command_line, status, "Command finished");

        Ok(CommandResult {
            command: command_line,
            status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Run `spec` with the [`SystemCommandRunner`].
pub fn run(spec: &CommandSpec) -> Result<CommandResult> {
    SystemCommandRunner.run(spec)
}

/// Shell convention: a signal-terminated process reports 128 + signal.
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
