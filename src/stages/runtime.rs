//! Stage 4: create the isolated interpreter environment inside the checkout.

use crate::command::CommandSpec;
use crate::error::{ProvisionError, Result};
use crate::progress::StageId;
use crate::runner::{Readiness, Stage, StageContext};
use crate::runtime_env::RuntimeEnvironment;

pub struct RuntimeEnvironmentStage;

fn environment(ctx: &StageContext<'_>) -> RuntimeEnvironment {
    RuntimeEnvironment::new(ctx.in_checkout(&ctx.plan.runtime.env_dir))
}

impl Stage for RuntimeEnvironmentStage {
    fn id(&self) -> StageId {
        StageId::RuntimeEnvironment
    }

    fn check(&self, ctx: &StageContext<'_>) -> Result<Readiness> {
        if ctx.host.path_exists(&environment(ctx).marker()) {
            Ok(Readiness::Satisfied)
        } else {
            Ok(Readiness::Pending)
        }
    }

    fn apply(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let env = environment(ctx);
        let interpreter = ctx.tool_command(&ctx.plan.runtime.interpreter);
        let spec = CommandSpec::new(interpreter)
            .args(["-m", "venv"])
            .arg(env.root().to_string_lossy())
            .current_dir(ctx.target_dir());
        ctx.run(&spec, "runtime environment creation")
    }

    fn complete(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let env = environment(ctx);
        if !ctx.host.path_exists(&env.marker()) {
            return Err(ProvisionError::missing_artifact(
                "runtime environment",
                env.root(),
            ));
        }
        ctx.set_runtime(env);
        Ok(())
    }
}
