//! Bootstrapper library
//!
//! Staged, fail-fast provisioning: each stage checks whether its end-state
//! already holds, acts only when it does not, and the first failure ends the
//! run.

pub mod cli;
pub mod command;
pub mod env_file;
pub mod error;
pub mod host;
pub mod plan;
pub mod process_guard;
pub mod progress;
pub mod prompt;
pub mod runner;
pub mod runtime_env;
pub mod stages;

// Re-export main types for convenience
pub use command::{run_command, CommandOutcome, CommandSpec};
pub use env_file::{EnvDocument, EnvLine, SetOutcome};
pub use error::{ProvisionError, Result};
pub use host::{EnvironmentDescriptor, Host, SystemHost};
pub use plan::ProvisionPlan;
pub use process_guard::{ChildRegistry, CommandProcessGroup, ForegroundChild, TrackedChild};
pub use progress::{RunProgress, StageId, StageOutcome, TransitionError};
pub use prompt::{Prompter, ScriptedPrompter, Secret, TerminalPrompter};
pub use runner::{Readiness, RunReport, Stage, StageContext, StageFailure, StageRunner};
pub use runtime_env::{Activation, RuntimeEnvironment};
pub use stages::pipeline;
