//! Host queries and the Environment Descriptor
//!
//! Stages never cache facts about the machine. Each precondition asks the
//! `Host` again, so a tool installed by an earlier stage (or by the operator
//! in another terminal) is seen by the next one.

use crate::command::{run_command, CommandOutcome, CommandSpec};
use crate::process_guard::CommandProcessGroup;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Everything a stage may ask of, or do to, the machine it runs on.
pub trait Host {
    /// Is `binary` resolvable on PATH?
    fn tool_present(&self, binary: &str) -> bool;

    /// Does `path` exist (file or directory)?
    fn path_exists(&self, path: &Path) -> bool;

    /// Run an external command to completion.
    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutcome>;
}

/// The machine the provisioner is running on.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
    fn tool_present(&self, binary: &str) -> bool {
        binary_exists(binary)
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutcome> {
        run_command(spec)
    }
}

/// Check if a binary is available in PATH
fn binary_exists(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .in_new_process_group()
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Snapshot of which tools the host currently provides, and how to invoke
/// each one that was found.
///
/// Taken fresh by `probe`. Snapshots are never refreshed; probe again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentDescriptor {
    tools: BTreeMap<String, Option<String>>,
}

impl EnvironmentDescriptor {
    /// Query the host for each of `binaries`: first on PATH, then in each of
    /// `fallback_dirs` in order.
    pub fn probe<H: Host + ?Sized>(host: &H, binaries: &[&str], fallback_dirs: &[PathBuf]) -> Self {
        let tools = binaries
            .iter()
            .map(|name| ((*name).to_string(), locate(host, name, fallback_dirs)))
            .collect();
        let descriptor = Self { tools };
        tracing::debug!(
            "Environment probe: present={:?} missing={:?}",
            descriptor.present(),
            descriptor.missing()
        );
        descriptor
    }

    /// Whether `binary` was found when probed (false if it was not probed)
    pub fn has(&self, binary: &str) -> bool {
        self.location(binary).is_some()
    }

    /// How to invoke `binary`: its bare name when on PATH, else a full path
    pub fn location(&self, binary: &str) -> Option<&str> {
        self.tools.get(binary).and_then(|loc| loc.as_deref())
    }

    pub fn present(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|(_, loc)| loc.is_some())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn missing(&self) -> Vec<&str> {
        self.tools
            .iter()
            .filter(|(_, loc)| loc.is_none())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn all_present(&self) -> bool {
        self.tools.values().all(Option::is_some)
    }
}

fn locate<H: Host + ?Sized>(host: &H, binary: &str, fallback_dirs: &[PathBuf]) -> Option<String> {
    if host.tool_present(binary) {
        return Some(binary.to_string());
    }
    fallback_dirs
        .iter()
        .map(|dir| dir.join(binary))
        .find(|candidate| host.path_exists(candidate))
        .map(|candidate| candidate.to_string_lossy().into_owned())
}
