//! Stage 3: clone the pinned revision into a fresh directory.

use crate::command::CommandSpec;
use crate::error::{ProvisionError, Result};
use crate::progress::StageId;
use crate::runner::{Readiness, Stage, StageContext};

pub struct FetchStage;

impl Stage for FetchStage {
    fn id(&self) -> StageId {
        StageId::Fetch
    }

    /// An existing target is never merged into or overwritten
    fn check(&self, ctx: &StageContext<'_>) -> Result<Readiness> {
        let target = ctx.target_dir();
        if ctx.host.path_exists(&target) {
            return Err(ProvisionError::TargetExists { path: target });
        }
        Ok(Readiness::Pending)
    }

    fn apply(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let repo = &ctx.plan.repository;
        let git = ctx.tool_command("git");
        let target = ctx.target_dir();

        let clone = CommandSpec::new(git.clone())
            .args(["clone", repo.url.as_str()])
            .arg(target.to_string_lossy())
            .env("GIT_TERMINAL_PROMPT", "0")
            .current_dir(ctx.workdir());
        ctx.run(&clone, "git clone")?;

        let checkout = CommandSpec::new(git)
            .args(["-c", "advice.detachedHead=false", "checkout", repo.revision.as_str()])
            .current_dir(&target);
        ctx.run(&checkout, &format!("git checkout {}", repo.revision))
    }

    fn complete(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let target = ctx.target_dir();
        if ctx.host.path_exists(&target) {
            Ok(())
        } else {
            Err(ProvisionError::missing_artifact("application checkout", target))
        }
    }
}
