// Shared fixtures for pipeline tests: a host that records every command and
// simulates the side effects of the tools it pretends to run.

#![allow(dead_code)]

use bootstrapper::command::{CommandOutcome, CommandSpec};
use bootstrapper::host::Host;
use bootstrapper::plan::ProvisionPlan;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const TEMPLATE: &str = "# Assistant configuration\n\
OPENAI_API_KEY=\n\
AZURE_OPENAI_API_KEY=your-azure-key\n\
AZURE_OPENAI_ENDPOINT=https://example.openai.azure.com/\n\
LOG_LEVEL=info\n";

/// Fake machine backed by a real scratch directory.
///
/// Paths are checked on the real filesystem so stages that read and write
/// files work unchanged; tools and commands are simulated.
pub struct FakeHost {
    tools: RefCell<BTreeSet<String>>,
    commands: RefCell<Vec<CommandSpec>>,
    failures: Vec<(String, i32)>,
    /// Commands that succeed without producing their side effect
    no_effect: Vec<String>,
    /// Files the simulated `git clone` creates, relative to the target
    checkout: Vec<(String, String)>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            tools: RefCell::new(BTreeSet::new()),
            commands: RefCell::new(Vec::new()),
            failures: Vec::new(),
            no_effect: Vec::new(),
            checkout: vec![
                (".env.template".to_string(), TEMPLATE.to_string()),
                ("requirements.txt".to_string(), "openai\n".to_string()),
                ("app/__main__.py".to_string(), "print('hi')\n".to_string()),
            ],
        }
    }

    /// Host where the package manager and every default tool are installed
    pub fn provisioned() -> Self {
        let host = Self::new();
        for tool in ["brew", "python3", "git", "docker"] {
            host.install(tool);
        }
        host
    }

    pub fn install(&self, binary: &str) {
        self.tools.borrow_mut().insert(binary.to_string());
    }

    /// Commands whose rendering contains `needle` exit with `code`
    pub fn fail_when(mut self, needle: &str, code: i32) -> Self {
        self.failures.push((needle.to_string(), code));
        self
    }

    /// Commands whose rendering contains `needle` exit 0 but change nothing
    pub fn no_effect_when(mut self, needle: &str) -> Self {
        self.no_effect.push(needle.to_string());
        self
    }

    /// Replace the files the simulated clone produces
    pub fn with_checkout(mut self, files: &[(&str, &str)]) -> Self {
        self.checkout = files
            .iter()
            .map(|(path, contents)| (path.to_string(), contents.to_string()))
            .collect();
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().iter().map(ToString::to_string).collect()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.commands().iter().any(|c| c.contains(needle))
    }

    pub fn last_command(&self) -> Option<CommandSpec> {
        self.commands.borrow().last().cloned()
    }

    /// Full specs of every command whose rendering contains `needle`
    pub fn specs_matching(&self, needle: &str) -> Vec<CommandSpec> {
        self.commands
            .borrow()
            .iter()
            .filter(|spec| spec.to_string().contains(needle))
            .cloned()
            .collect()
    }

    fn simulate(&self, spec: &CommandSpec) {
        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["-c", script] if script.contains("Homebrew") => self.install("brew"),
            ["install", .., package] => {
                let binary = if *package == "python" { "python3" } else { *package };
                self.install(binary);
            }
            ["clone", _url, target] => {
                let target = PathBuf::from(target);
                for (path, contents) in &self.checkout {
                    let file = target.join(path);
                    if let Some(parent) = file.parent() {
                        fs::create_dir_all(parent).unwrap();
                    }
                    fs::write(file, contents).unwrap();
                }
                fs::create_dir_all(&target).unwrap();
            }
            ["-m", "venv", root] => {
                let root = Path::new(root);
                fs::create_dir_all(root.join("bin")).unwrap();
                fs::write(root.join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();
            }
            _ => {}
        }
    }
}

impl Host for FakeHost {
    fn tool_present(&self, binary: &str) -> bool {
        self.tools.borrow().contains(binary)
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn run(&self, spec: &CommandSpec) -> std::io::Result<CommandOutcome> {
        self.commands.borrow_mut().push(spec.clone());
        let rendered = spec.to_string();
        if let Some((_, code)) = self.failures.iter().find(|(n, _)| rendered.contains(n.as_str())) {
            return Ok(CommandOutcome::failure(*code));
        }
        if !self.no_effect.iter().any(|n| rendered.contains(n.as_str())) {
            self.simulate(spec);
        }
        Ok(CommandOutcome::success())
    }
}

/// Default plan pointed at a test repository, without fallback bin
/// directories so the real machine's `/usr/local/bin` cannot leak into tool
/// probes
pub fn test_plan() -> ProvisionPlan {
    let mut plan = ProvisionPlan::default();
    plan.repository.url = "https://github.com/example-org/assistant-app.git".to_string();
    plan.repository.revision = "v0.1.0".to_string();
    plan.package_manager.bin_dirs.clear();
    plan
}
