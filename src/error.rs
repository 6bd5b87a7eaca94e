//! Error handling module for the provisioner
//!
//! Every failure a stage can report is one of these variants. All of them are
//! terminal for the run: nothing is retried and nothing is recovered locally.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for provisioning
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A required tool is absent and installing it did not make it available
    #[error("Missing prerequisite: {tool} ({detail})")]
    MissingPrerequisite { tool: String, detail: String },

    /// The fetch destination is already occupied
    #[error("Target directory already exists: {}", path.display())]
    TargetExists { path: PathBuf },

    /// A file expected after fetch is not there
    #[error("Missing {what}: {}", path.display())]
    MissingArtifact { what: String, path: PathBuf },

    /// The mandatory secret was left empty
    #[error("{key} is required and cannot be empty")]
    EmptyRequiredInput { key: String },

    /// A delegated tool exited unsuccessfully
    #[error("{context} failed (exit code {})", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    CommandFailed { context: String, code: Option<i32> },

    /// Operator pressed Ctrl+C at a prompt
    #[error("Interrupted by user")]
    Interrupted,

    /// Terminal could not be put into or out of raw mode
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// The provisioning plan is invalid
    #[error("Plan error: {0}")]
    Plan(String),

    /// IO errors (file operations, spawning processes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Create a missing-prerequisite error
    pub fn missing_prerequisite(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MissingPrerequisite {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    /// Create a missing-artifact error
    pub fn missing_artifact(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingArtifact {
            what: what.into(),
            path: path.into(),
        }
    }

    /// Create a command failure error
    pub fn command_failed(context: impl Into<String>, code: Option<i32>) -> Self {
        Self::CommandFailed {
            context: context.into(),
            code,
        }
    }

    /// Create a terminal error
    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::Terminal(msg.into())
    }

    /// Create a plan error
    pub fn plan(msg: impl Into<String>) -> Self {
        Self::Plan(msg.into())
    }

    /// Short label for the error class, used as the prefix of the final message
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingPrerequisite { .. } => "missing prerequisite",
            Self::TargetExists { .. } => "target exists",
            Self::MissingArtifact { .. } => "missing artifact",
            Self::EmptyRequiredInput { .. } => "empty input",
            Self::CommandFailed { .. } => "command failed",
            Self::Interrupted => "interrupted",
            Self::Terminal(_) => "terminal",
            Self::Plan(_) => "plan",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}
