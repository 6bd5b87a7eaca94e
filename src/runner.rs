//! The Stage Runner.
//!
//! Runs stages strictly in order. For each stage: ask whether its end-state
//! already holds, run the effecting action only if it does not, then confirm
//! the postcondition. The first failure ends the run; nothing is rolled back.

use crate::command::CommandSpec;
use crate::error::{ProvisionError, Result};
use crate::host::{EnvironmentDescriptor, Host};
use crate::plan::ProvisionPlan;
use crate::progress::{RunProgress, StageId, StageOutcome};
use crate::prompt::Prompter;
use crate::runtime_env::RuntimeEnvironment;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Answer of a stage's idempotency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The end-state already holds; skip the effecting action
    Satisfied,
    /// The effecting action must run
    Pending,
}

/// One provisioning step.
pub trait Stage {
    fn id(&self) -> StageId;

    /// Idempotency check. A pure query against the host; errors here mean
    /// the stage cannot run at all (e.g. the target is already occupied).
    fn check(&self, _ctx: &StageContext<'_>) -> Result<Readiness> {
        Ok(Readiness::Pending)
    }

    /// The effecting action
    fn apply(&self, ctx: &mut StageContext<'_>) -> Result<()>;

    /// Postcondition, run after `apply` and after a satisfied check. May
    /// record facts later stages need.
    fn complete(&self, _ctx: &mut StageContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Everything a stage can reach while it runs.
pub struct StageContext<'a> {
    pub host: &'a dyn Host,
    pub prompter: &'a mut dyn Prompter,
    pub plan: &'a ProvisionPlan,
    workdir: PathBuf,
    dry_run: bool,
    runtime: Option<RuntimeEnvironment>,
    warnings: Vec<String>,
}

impl<'a> StageContext<'a> {
    pub fn new(
        host: &'a dyn Host,
        prompter: &'a mut dyn Prompter,
        plan: &'a ProvisionPlan,
        workdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            host,
            prompter,
            plan,
            workdir: workdir.into(),
            dry_run: false,
            runtime: None,
            warnings: Vec::new(),
        }
    }

    /// Evaluate checks only; never apply
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Directory the application is fetched into
    pub fn target_dir(&self) -> PathBuf {
        self.workdir.join(&self.plan.repository.target_dir)
    }

    /// A path inside the fetched application
    pub fn in_checkout(&self, relative: &str) -> PathBuf {
        self.target_dir().join(relative)
    }

    pub fn runtime(&self) -> Option<&RuntimeEnvironment> {
        self.runtime.as_ref()
    }

    pub fn set_runtime(&mut self, env: RuntimeEnvironment) {
        self.runtime = Some(env);
    }

    /// Fresh snapshot of where `binaries` can be found
    pub fn probe(&self, binaries: &[&str]) -> EnvironmentDescriptor {
        EnvironmentDescriptor::probe(
            self.host,
            binaries,
            &self.plan.package_manager.bin_dir_paths(),
        )
    }

    /// How to invoke `binary` right now; its bare name if it cannot be found
    pub fn tool_command(&self, binary: &str) -> String {
        self.probe(&[binary])
            .location(binary)
            .unwrap_or(binary)
            .to_string()
    }

    /// Record a non-fatal problem and show it to the operator
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        eprintln!("⚠ {}", message);
        self.warnings.push(message);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Run a command and turn a non-zero exit into `CommandFailed`
    pub fn run(&self, spec: &CommandSpec, context: &str) -> Result<()> {
        let outcome = self.host.run(spec).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProvisionError::missing_prerequisite(&spec.program, format!("{} not runnable", context))
            } else {
                ProvisionError::Io(e)
            }
        })?;
        outcome.ensure_success(context)
    }
}

/// A stage failed; the run is over.
#[derive(Debug, Error)]
#[error("{message} at {stage}: {error}")]
pub struct StageFailure {
    pub stage: StageId,
    pub message: &'static str,
    #[source]
    pub error: ProvisionError,
}

impl StageFailure {
    fn new(stage: StageId, error: ProvisionError) -> Self {
        Self {
            stage,
            message: stage.failure_message(),
            error,
        }
    }

    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        match self.error {
            ProvisionError::Interrupted => 130,
            _ => 1,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<(StageId, StageOutcome)>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn outcome_of(&self, stage: StageId) -> Option<StageOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == stage)
            .map(|(_, outcome)| *outcome)
    }
}

/// Executes an ordered list of stages.
#[derive(Debug, Default)]
pub struct StageRunner {
    progress: RunProgress,
}

impl StageRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> &RunProgress {
        &self.progress
    }

    /// Run every stage in order, stopping at the first failure.
    pub fn run_all(
        &mut self,
        stages: &[Box<dyn Stage>],
        ctx: &mut StageContext<'_>,
    ) -> std::result::Result<RunReport, StageFailure> {
        for stage in stages {
            let id = stage.id();
            self.progress
                .begin(id)
                .map_err(|e| StageFailure::new(id, ProvisionError::plan(e.to_string())))?;

            println!("==> {}", id);
            match self.run_stage(stage.as_ref(), ctx) {
                Ok(outcome) => {
                    self.progress
                        .finish(outcome)
                        .map_err(|e| StageFailure::new(id, ProvisionError::plan(e.to_string())))?;
                    println!("✓ {} ({})", id.description(), outcome.label());
                }
                Err(error) => {
                    // The stage error is returned either way
                    if let Err(e) = self.progress.fail() {
                        tracing::error!("Progress for {} not recorded: {}", id, e);
                    }
                    tracing::error!("Stage {} failed: {}", id, error);
                    return Err(StageFailure::new(id, error));
                }
            }
        }

        tracing::info!("All {} stages completed", stages.len());
        Ok(RunReport {
            outcomes: self.progress.finished().to_vec(),
            warnings: ctx.warnings().to_vec(),
        })
    }

    fn run_stage(&self, stage: &dyn Stage, ctx: &mut StageContext<'_>) -> Result<StageOutcome> {
        let id = stage.id();
        match stage.check(ctx)? {
            Readiness::Satisfied => {
                tracing::info!("{}: already satisfied, skipping action", id);
                stage.complete(ctx)?;
                Ok(StageOutcome::Skipped)
            }
            Readiness::Pending if ctx.is_dry_run() => {
                tracing::info!("{}: [DRY RUN] action skipped", id);
                Ok(StageOutcome::Planned)
            }
            Readiness::Pending => {
                stage.apply(ctx)?;
                stage.complete(ctx)?;
                Ok(StageOutcome::Applied)
            }
        }
    }
}
