//! Stage 5: install the manifest's dependencies into the runtime environment.

use crate::command::CommandSpec;
use crate::error::{ProvisionError, Result};
use crate::progress::StageId;
use crate::runner::{Stage, StageContext};

pub struct DependenciesStage;

impl Stage for DependenciesStage {
    fn id(&self) -> StageId {
        StageId::Dependencies
    }

    fn apply(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let manifest = ctx.in_checkout(&ctx.plan.runtime.manifest);
        if !ctx.host.path_exists(&manifest) {
            return Err(ProvisionError::missing_artifact("dependency manifest", manifest));
        }

        let runtime = ctx.runtime().cloned().ok_or_else(|| {
            ProvisionError::missing_artifact(
                "runtime environment",
                ctx.in_checkout(&ctx.plan.runtime.env_dir),
            )
        })?;
        let active = runtime.activate();
        let spec = active
            .command(CommandSpec::new(runtime.interpreter().to_string_lossy()))
            .args(["-m", "pip", "install", "-r"])
            .arg(manifest.to_string_lossy())
            .current_dir(ctx.target_dir());
        ctx.run(&spec, "dependency installation")
    }
}
