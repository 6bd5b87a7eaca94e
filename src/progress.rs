//! Provisioning progress state machine
//!
//! Tracks which stage is running and which stages have finished, and refuses
//! any transition that would skip a stage, repeat one, or continue after a
//! failure.
//!
//! # Stage Flow
//!
//! ```text
//! PackageManager
//!     ↓
//! Tools
//!     ↓
//! Fetch
//!     ↓
//! RuntimeEnvironment
//!     ↓
//! Dependencies
//!     ↓
//! Configure
//!     ↓
//! Launch
//!
//! (Any stage can fail; a failed run accepts no further transitions)
//! ```

use std::fmt;
use strum::{EnumIter, IntoEnumIterator};
use thiserror::Error;

/// Provisioning stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
#[repr(u8)]
pub enum StageId {
    /// Ensure the package manager is installed
    PackageManager = 1,
    /// Ensure interpreter, version control and container runtime are installed
    Tools = 2,
    /// Clone the pinned application revision
    Fetch = 3,
    /// Create the isolated interpreter environment
    RuntimeEnvironment = 4,
    /// Install dependencies from the manifest
    Dependencies = 5,
    /// Collect secrets and write the config file
    Configure = 6,
    /// Start the application
    Launch = 7,
}

impl StageId {
    /// Returns the 1-based position of this stage
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns the stage that follows this one, or None after the last stage
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::PackageManager => Some(Self::Tools),
            Self::Tools => Some(Self::Fetch),
            Self::Fetch => Some(Self::RuntimeEnvironment),
            Self::RuntimeEnvironment => Some(Self::Dependencies),
            Self::Dependencies => Some(Self::Configure),
            Self::Configure => Some(Self::Launch),
            Self::Launch => None,
        }
    }

    /// Returns the first stage of every run
    pub const fn first() -> Self {
        Self::PackageManager
    }

    /// Returns a human-readable description of this stage
    pub const fn description(self) -> &'static str {
        match self {
            Self::PackageManager => "Checking package manager",
            Self::Tools => "Checking prerequisite tools",
            Self::Fetch => "Fetching application",
            Self::RuntimeEnvironment => "Preparing runtime environment",
            Self::Dependencies => "Installing dependencies",
            Self::Configure => "Writing configuration",
            Self::Launch => "Launching application",
        }
    }

    /// Message shown when this stage fails
    pub const fn failure_message(self) -> &'static str {
        match self {
            Self::PackageManager => "Package manager is not available",
            Self::Tools => "A prerequisite tool could not be installed",
            Self::Fetch => "Could not fetch the application",
            Self::RuntimeEnvironment => "Could not create the runtime environment",
            Self::Dependencies => "Dependency installation failed",
            Self::Configure => "Configuration could not be written",
            Self::Launch => "The application could not be launched",
        }
    }

    /// Number of stages in a run
    pub fn count() -> usize {
        Self::iter().count()
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.order(), Self::count(), self.description())
    }
}

/// How a stage finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The effecting action ran and its postcondition holds
    Applied,
    /// The end-state already held; the effecting action was not run
    Skipped,
    /// Dry run: the effecting action would have run
    Planned,
}

impl StageOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Applied => "done",
            Self::Skipped => "already satisfied",
            Self::Planned => "would run",
        }
    }
}

/// Errors that can occur during progress transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Attempted to start a stage out of order
    #[error("Cannot start {to} (expected {expected})")]
    OutOfOrder { to: StageId, expected: StageId },

    /// Attempted to start a stage while another is still running
    #[error("Cannot start {to} while {running} is still running")]
    StageRunning { running: StageId, to: StageId },

    /// Attempted to finish when nothing is running
    #[error("No stage is running")]
    NothingRunning,

    /// Attempted any transition after the run finished or failed
    #[error("Run already {}", if *failed { "failed" } else { "finished" })]
    Terminal { failed: bool },
}

/// Forward-only record of a provisioning run.
///
/// # Example
///
/// ```
/// use bootstrapper::progress::{RunProgress, StageId, StageOutcome};
///
/// let mut progress = RunProgress::new();
/// progress.begin(StageId::PackageManager).unwrap();
/// progress.finish(StageOutcome::Skipped).unwrap();
///
/// // Cannot skip stages
/// assert!(progress.begin(StageId::Fetch).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RunProgress {
    running: Option<StageId>,
    finished: Vec<(StageId, StageOutcome)>,
    failed_at: Option<StageId>,
}

impl RunProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stage currently running, if any
    #[inline]
    pub fn running(&self) -> Option<StageId> {
        self.running
    }

    /// Stages that finished, in order, with how they finished
    pub fn finished(&self) -> &[(StageId, StageOutcome)] {
        &self.finished
    }

    /// The stage at which the run failed, if any
    #[inline]
    pub fn failed_at(&self) -> Option<StageId> {
        self.failed_at
    }

    /// True once every stage has finished
    pub fn is_complete(&self) -> bool {
        self.failed_at.is_none() && self.finished.len() == StageId::count()
    }

    /// The stage that must run next, or None if the run is over
    pub fn expected_next(&self) -> Option<StageId> {
        if self.failed_at.is_some() {
            return None;
        }
        match self.finished.last() {
            None => Some(StageId::first()),
            Some((last, _)) => last.next(),
        }
    }

    /// Mark `stage` as running. It must be the next stage in order.
    pub fn begin(&mut self, stage: StageId) -> Result<(), TransitionError> {
        if self.failed_at.is_some() {
            return Err(TransitionError::Terminal { failed: true });
        }
        if let Some(running) = self.running {
            return Err(TransitionError::StageRunning { running, to: stage });
        }
        let expected = self
            .expected_next()
            .ok_or(TransitionError::Terminal { failed: false })?;
        if stage != expected {
            return Err(TransitionError::OutOfOrder { to: stage, expected });
        }
        self.running = Some(stage);
        Ok(())
    }

    /// Mark the running stage as finished
    pub fn finish(&mut self, outcome: StageOutcome) -> Result<StageId, TransitionError> {
        let stage = self.running.take().ok_or(TransitionError::NothingRunning)?;
        self.finished.push((stage, outcome));
        Ok(stage)
    }

    /// Mark the running stage as failed. No further transitions are accepted.
    pub fn fail(&mut self) -> Result<StageId, TransitionError> {
        let stage = self.running.take().ok_or(TransitionError::NothingRunning)?;
        self.failed_at = Some(stage);
        Ok(stage)
    }
}
