//! Provisioning plan handling: the incidental values every stage reads.
//!
//! Tool names, installer URLs, repository coordinates and file names are not
//! part of the provisioning contract, so they live here with built-in
//! defaults and can be overridden by a JSON plan file. The application
//! repository has no default: it must come from `--plan` or from a
//! `bootstrapper.json` in the working directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Plan file picked up from the working directory when `--plan` is not given
pub const PLAN_FILE_NAME: &str = "bootstrapper.json";

/// Package manager used to install missing tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManagerPlan {
    /// Binary looked up on PATH (e.g. `brew`)
    pub binary: String,
    /// Command that installs the package manager when it is absent
    pub installer: Vec<String>,
    /// Arguments placed before the package name (e.g. `["install"]`)
    pub install_args: Vec<String>,
    /// Directories searched when a tool is not on PATH, e.g. where a freshly
    /// installed package manager puts its binaries
    #[serde(default)]
    pub bin_dirs: Vec<String>,
}

impl PackageManagerPlan {
    pub fn bin_dir_paths(&self) -> Vec<PathBuf> {
        self.bin_dirs.iter().map(PathBuf::from).collect()
    }
}

/// A tool that must be on PATH before the application can be fetched and run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRequirement {
    /// Binary looked up on PATH
    pub binary: String,
    /// Package providing the binary
    pub package: String,
    /// Extra arguments for this package only (e.g. `["--cask"]`)
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl ToolRequirement {
    pub fn new(binary: &str, package: &str) -> Self {
        Self {
            binary: binary.to_string(),
            package: package.to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Where the application comes from and where it lands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPlan {
    pub url: String,
    /// Tag, branch or commit checked out after cloning
    pub revision: String,
    /// Directory name created under the working directory
    pub target_dir: String,
}

/// Isolated interpreter environment created inside the checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePlan {
    /// Interpreter used to create the environment
    pub interpreter: String,
    /// Environment directory, relative to the checkout
    pub env_dir: String,
    /// Dependency manifest, relative to the checkout
    pub manifest: String,
}

/// Secret keys collected at the configure stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretsPlan {
    /// Template copied into the config file, relative to the checkout
    pub template: String,
    /// Resulting config file, relative to the checkout
    pub config: String,
    /// Key that must be supplied
    pub required_key: String,
    /// Key that may be skipped
    pub optional_key: Option<String>,
    /// Plain value asked for only when the optional key was supplied
    pub dependent_key: Option<String>,
}

/// How the fetched application is started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPlan {
    /// Module run with `<interpreter> -m <module>`
    pub module: String,
    /// Script run with `<interpreter> <script>` when the module is unavailable
    pub fallback_script: String,
}

/// Complete provisioning plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionPlan {
    pub package_manager: PackageManagerPlan,
    pub tools: Vec<ToolRequirement>,
    pub repository: RepositoryPlan,
    pub runtime: RuntimePlan,
    pub secrets: SecretsPlan,
    pub launch: LaunchPlan,
}

impl Default for ProvisionPlan {
    fn default() -> Self {
        Self {
            package_manager: PackageManagerPlan {
                binary: "brew".to_string(),
                installer: vec![
                    "/bin/bash".to_string(),
                    "-c".to_string(),
                    "curl -fsSL https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh | bash"
                        .to_string(),
                ],
                install_args: vec!["install".to_string()],
                bin_dirs: vec![
                    "/opt/homebrew/bin".to_string(),
                    "/usr/local/bin".to_string(),
                    "/home/linuxbrew/.linuxbrew/bin".to_string(),
                ],
            },
            tools: vec![
                ToolRequirement::new("python3", "python"),
                ToolRequirement::new("git", "git"),
                ToolRequirement {
                    binary: "docker".to_string(),
                    package: "docker".to_string(),
                    extra_args: vec!["--cask".to_string()],
                },
            ],
            repository: RepositoryPlan {
                url: String::new(),
                revision: String::new(),
                target_dir: "assistant-app".to_string(),
            },
            runtime: RuntimePlan {
                interpreter: "python3".to_string(),
                env_dir: ".venv".to_string(),
                manifest: "requirements.txt".to_string(),
            },
            secrets: SecretsPlan {
                template: ".env.template".to_string(),
                config: ".env".to_string(),
                required_key: "OPENAI_API_KEY".to_string(),
                optional_key: Some("AZURE_OPENAI_API_KEY".to_string()),
                dependent_key: Some("AZURE_OPENAI_ENDPOINT".to_string()),
            },
            launch: LaunchPlan {
                module: "app".to_string(),
                fallback_script: "main.py".to_string(),
            },
        }
    }
}

impl ProvisionPlan {
    /// Save the plan to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize plan to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write plan to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load a plan from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read plan from {:?}", path.as_ref()))?;

        let plan: Self = serde_json::from_str(&content).context("Failed to parse plan JSON")?;

        Ok(plan)
    }

    /// Plan file in `workdir`, if one is there
    pub fn discover(workdir: &Path) -> Option<PathBuf> {
        let path = workdir.join(PLAN_FILE_NAME);
        path.is_file().then_some(path)
    }

    /// Validate the plan
    pub fn validate(&self) -> Result<()> {
        if self.repository.url.trim().is_empty() {
            anyhow::bail!(
                "No application repository configured: pass --plan <FILE> or put {} in the working directory",
                PLAN_FILE_NAME
            );
        }

        if self.package_manager.binary.trim().is_empty() {
            anyhow::bail!("Package manager binary must be specified");
        }
        if self.package_manager.installer.is_empty() {
            anyhow::bail!("Package manager installer command must be specified");
        }
        if let Some(dir) = self.package_manager.bin_dirs.iter().find(|d| !Path::new(d).is_absolute()) {
            anyhow::bail!("Package manager bin directory must be absolute: {}", dir);
        }

        for tool in &self.tools {
            if tool.binary.trim().is_empty() || tool.package.trim().is_empty() {
                anyhow::bail!("Every tool needs both a binary and a package name");
            }
        }

        let url = self.repository.url.trim();
        if !url.starts_with("http://")
            && !url.starts_with("https://")
            && !url.starts_with("git://")
            && !url.starts_with("ssh://")
            && !url.starts_with("git@")
            && !url.starts_with("file://")
        {
            anyhow::bail!(
                "Repository URL must start with http://, https://, git://, ssh://, git@ or file://"
            );
        }
        if self.repository.revision.trim().is_empty() {
            anyhow::bail!("Repository revision must be pinned");
        }
        require_relative_name("Target directory", &self.repository.target_dir)?;

        if self.runtime.interpreter.trim().is_empty() {
            anyhow::bail!("Runtime interpreter must be specified");
        }
        require_relative_name("Environment directory", &self.runtime.env_dir)?;
        require_relative_name("Manifest", &self.runtime.manifest)?;

        require_relative_name("Template", &self.secrets.template)?;
        require_relative_name("Config file", &self.secrets.config)?;
        if self.secrets.template == self.secrets.config {
            anyhow::bail!("Template and config file must differ");
        }
        require_key("Required secret key", &self.secrets.required_key)?;
        if let Some(key) = &self.secrets.optional_key {
            require_key("Optional secret key", key)?;
        }
        if let Some(key) = &self.secrets.dependent_key {
            if self.secrets.optional_key.is_none() {
                anyhow::bail!("Dependent key {} has no optional secret to depend on", key);
            }
            require_key("Dependent key", key)?;
        }

        if self.launch.module.trim().is_empty() && self.launch.fallback_script.trim().is_empty() {
            anyhow::bail!("At least one launch entry point must be specified");
        }

        Ok(())
    }

    /// Binaries the tools stage must make available, in declared order
    pub fn tool_binaries(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.binary.as_str()).collect()
    }
}

fn require_relative_name(what: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        anyhow::bail!("{} must be specified", what);
    }
    if Path::new(trimmed).is_absolute() || trimmed.split('/').any(|part| part == "..") {
        anyhow::bail!("{} must be a relative path inside the checkout: {}", what, value);
    }
    Ok(())
}

fn require_key(what: &str, key: &str) -> Result<()> {
    if !crate::env_file::is_valid_key(key) {
        anyhow::bail!(
            "{} must be letters, digits and underscores, starting with a letter: {:?}",
            what,
            key
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Default plan pointed at an application
    fn pinned() -> ProvisionPlan {
        let mut plan = ProvisionPlan::default();
        plan.repository.url = "https://git.example.com/assistant-app.git".to_string();
        plan.repository.revision = "v1.2.0".to_string();
        plan
    }

    #[test]
    fn test_default_plan_needs_a_repository() {
        let err = ProvisionPlan::default().validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("No application repository configured"));
        assert!(message.contains("--plan"));

        assert!(pinned().validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_url_scheme() {
        let mut plan = pinned();
        plan.repository.url = "ftp://example.com/app.git".to_string();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_discover_plan_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ProvisionPlan::discover(dir.path()), None);

        let path = dir.path().join(PLAN_FILE_NAME);
        pinned().save_to_file(&path).unwrap();
        assert_eq!(ProvisionPlan::discover(dir.path()), Some(path));
    }

    #[test]
    fn test_default_tools_cover_interpreter_vcs_and_container_runtime() {
        let plan = ProvisionPlan::default();
        assert_eq!(plan.tool_binaries(), vec!["python3", "git", "docker"]);
    }

    #[test]
    fn test_rejects_unpinned_revision() {
        let mut plan = pinned();
        plan.repository.revision = "  ".to_string();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_rejects_escaping_target_dir() {
        let mut plan = pinned();
        plan.repository.target_dir = "../elsewhere".to_string();
        assert!(plan.validate().is_err());

        plan.repository.target_dir = "/opt/app".to_string();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_secret_key() {
        let mut plan = pinned();
        plan.secrets.required_key = "OPENAI-API-KEY".to_string();
        assert!(plan.validate().is_err());

        plan.secrets.required_key = "1KEY".to_string();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_rejects_dependent_without_optional() {
        let mut plan = pinned();
        plan.secrets.optional_key = None;
        assert!(plan.validate().is_err());

        plan.secrets.dependent_key = None;
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");

        let mut plan = pinned();
        plan.repository.revision = "abc1234".to_string();
        plan.save_to_file(&path).unwrap();

        let loaded = ProvisionPlan::load_from_file(&path).unwrap();
        assert_eq!(loaded, plan);
    }

    #[test]
    fn test_tool_extra_args_default_to_empty() {
        let json = r#"{"binary": "git", "package": "git"}"#;
        let tool: ToolRequirement = serde_json::from_str(json).unwrap();
        assert!(tool.extra_args.is_empty());
    }
}
