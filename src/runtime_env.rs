//! Isolated interpreter environments scoped to the checkout.
//!
//! The provisioner never mutates its own process environment. "Activating"
//! an environment means every command built through an `Activation` gets the
//! variables a shell `activate` script would set; dropping the `Activation`
//! deactivates it, whatever the stage's outcome.

use crate::command::CommandSpec;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A created environment directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnvironment {
    root: PathBuf,
}

impl RuntimeEnvironment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    /// Interpreter inside the environment
    pub fn interpreter(&self) -> PathBuf {
        self.bin_dir().join("python")
    }

    /// Marker written by environment creation; its presence means the
    /// environment is usable
    pub fn marker(&self) -> PathBuf {
        self.root.join("pyvenv.cfg")
    }

    /// Start using the environment for commands
    pub fn activate(&self) -> Activation<'_> {
        tracing::info!("Activated runtime environment {}", self.root.display());
        Activation { env: self }
    }

    fn search_path(&self) -> String {
        let mut paths = vec![self.bin_dir()];
        if let Some(existing) = std::env::var_os("PATH") {
            paths.extend(std::env::split_paths(&existing));
        }
        std::env::join_paths(paths)
            .unwrap_or_else(|_| OsString::from(self.bin_dir().as_os_str()))
            .to_string_lossy()
            .into_owned()
    }
}

/// An environment in use. Deactivated on drop.
#[derive(Debug)]
pub struct Activation<'a> {
    env: &'a RuntimeEnvironment,
}

impl Activation<'_> {
    /// Add the activation variables to `spec`
    pub fn command(&self, spec: CommandSpec) -> CommandSpec {
        spec.env("VIRTUAL_ENV", self.env.root.to_string_lossy())
            .env("PATH", self.env.search_path())
            .env_remove("PYTHONHOME")
    }

    pub fn environment(&self) -> &RuntimeEnvironment {
        self.env
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        tracing::info!("Deactivated runtime environment {}", self.env.root.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let env = RuntimeEnvironment::new("/work/app/.venv");
        assert_eq!(env.bin_dir(), PathBuf::from("/work/app/.venv/bin"));
        assert_eq!(env.interpreter(), PathBuf::from("/work/app/.venv/bin/python"));
        assert_eq!(env.marker(), PathBuf::from("/work/app/.venv/pyvenv.cfg"));
    }

    #[test]
    fn test_activation_sets_variables() {
        let env = RuntimeEnvironment::new("/work/app/.venv");
        let active = env.activate();
        let spec = active.command(CommandSpec::new("python").args(["-m", "app"]));

        let virtual_env = spec.env.iter().find(|(k, _)| k == "VIRTUAL_ENV").unwrap();
        assert_eq!(virtual_env.1, "/work/app/.venv");

        let path = spec.env.iter().find(|(k, _)| k == "PATH").unwrap();
        assert!(path.1.starts_with("/work/app/.venv/bin"));

        assert_eq!(spec.env_remove, vec!["PYTHONHOME"]);
        assert_eq!(spec.args, vec!["-m", "app"]);
    }
}
