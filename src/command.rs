//! External command descriptions and execution
//!
//! Every stage describes the tool it delegates to as a `CommandSpec`; the
//! host decides how to run it. `run_command` is the real execution path:
//! non-interactive commands get their own process group and are registered
//! for cleanup, interactive ones stay in the foreground so they can read the
//! terminal (sudo prompts, the launched application).

use crate::process_guard::{CommandProcessGroup, ForegroundChild, TrackedChild};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set for the child only
    pub env: Vec<(String, String)>,
    /// Variables removed from the child's environment
    pub env_remove: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Keep stdin attached and stay in the terminal's foreground group
    pub interactive: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            env_remove: Vec::new(),
            cwd: None,
            interactive: false,
        }
    }

    /// Build from an argv vector; the first element is the program
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone()).args(args))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " {:?}", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Result of running an external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl CommandOutcome {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            success: true,
        }
    }

    pub fn failure(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            success: false,
        }
    }

    /// Check if the command succeeded and return an error if not.
    pub fn ensure_success(&self, context: &str) -> crate::error::Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(crate::error::ProvisionError::command_failed(
                context,
                self.exit_code,
            ))
        }
    }
}

/// Execute a command, streaming its output to ours, and wait for it.
///
/// Non-interactive commands read from `/dev/null`, run in a new process group
/// and are tracked in the global `ChildRegistry` while they run. Interactive
/// ones hold a `ForegroundChild` marker, so Ctrl+C reaches the child and its
/// exit status decides the outcome.
pub fn run_command(spec: &CommandSpec) -> std::io::Result<CommandOutcome> {
    tracing::info!(
        "run_command: {} cwd={:?} interactive={}",
        spec,
        spec.cwd,
        spec.interactive
    );

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    for key in &spec.env_remove {
        cmd.env_remove(key);
    }
    for (key, value) in &spec.env {
        cmd.env(key, value);
    }
    if let Some(dir) = &spec.cwd {
        cmd.current_dir(dir);
    }

    let status = if spec.interactive {
        let _foreground = ForegroundChild::enter();
        cmd.stdin(Stdio::inherit()).status()?
    } else {
        cmd.stdin(Stdio::null()).in_new_process_group();
        let mut child = cmd.spawn()?;
        let _tracked = TrackedChild::register(child.id());
        child.wait()?
    };

    let outcome = CommandOutcome {
        exit_code: status.code(),
        success: status.success(),
    };
    if outcome.success {
        tracing::info!("{} exited successfully", spec.program);
    } else {
        tracing::warn!(
            "{} failed with exit code {}",
            spec.program,
            outcome.exit_code.unwrap_or(-1)
        );
    }
    Ok(outcome)
}
