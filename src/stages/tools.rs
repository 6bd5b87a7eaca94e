//! Stage 2: interpreter, version control and container runtime.
//!
//! Each tool is checked and installed on its own; the first one that cannot
//! be made available ends the run and is named in the error.

use crate::command::CommandSpec;
use crate::error::{ProvisionError, Result};
use crate::plan::ToolRequirement;
use crate::progress::StageId;
use crate::runner::{Readiness, Stage, StageContext};

pub struct ToolsStage;

impl ToolsStage {
    fn install(ctx: &StageContext<'_>, tool: &ToolRequirement) -> Result<()> {
        let pm = &ctx.plan.package_manager;
        let program = ctx.tool_command(&pm.binary);
        let spec = CommandSpec::new(program)
            .args(pm.install_args.iter().cloned())
            .args(tool.extra_args.iter().cloned())
            .arg(tool.package.clone())
            // casks may ask for a sudo password
            .interactive();

        println!("Installing {}...", tool.package);
        ctx.run(&spec, &format!("{} install {}", pm.binary, tool.package))
            .map_err(|e| ProvisionError::missing_prerequisite(&tool.binary, e.to_string()))?;

        if !ctx.probe(&[tool.binary.as_str()]).has(&tool.binary) {
            return Err(ProvisionError::missing_prerequisite(
                &tool.binary,
                format!("not found after installing package {}", tool.package),
            ));
        }
        Ok(())
    }
}

impl Stage for ToolsStage {
    fn id(&self) -> StageId {
        StageId::Tools
    }

    fn check(&self, ctx: &StageContext<'_>) -> Result<Readiness> {
        let env = ctx.probe(&ctx.plan.tool_binaries());
        if env.all_present() {
            Ok(Readiness::Satisfied)
        } else {
            tracing::info!("Missing tools: {:?}", env.missing());
            Ok(Readiness::Pending)
        }
    }

    fn apply(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        for tool in &ctx.plan.tools {
            // Probe per tool: an earlier install may have pulled this one in
            if ctx.probe(&[tool.binary.as_str()]).has(&tool.binary) {
                tracing::info!("{} already present", tool.binary);
                continue;
            }
            Self::install(ctx, tool)?;
        }
        Ok(())
    }

    fn complete(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let env = ctx.probe(&ctx.plan.tool_binaries());
        match env.missing().first() {
            None => Ok(()),
            Some(missing) => Err(ProvisionError::missing_prerequisite(
                *missing,
                "not available",
            )),
        }
    }
}
