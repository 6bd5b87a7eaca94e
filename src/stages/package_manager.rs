//! Stage 1: make sure the package manager exists.

use crate::command::CommandSpec;
use crate::error::{ProvisionError, Result};
use crate::progress::StageId;
use crate::runner::{Readiness, Stage, StageContext};

pub struct PackageManagerStage;

impl Stage for PackageManagerStage {
    fn id(&self) -> StageId {
        StageId::PackageManager
    }

    fn check(&self, ctx: &StageContext<'_>) -> Result<Readiness> {
        let binary = ctx.plan.package_manager.binary.as_str();
        let env = ctx.probe(&[binary]);
        match env.location(binary) {
            Some(location) => {
                tracing::info!("Package manager found: {}", location);
                Ok(Readiness::Satisfied)
            }
            None => Ok(Readiness::Pending),
        }
    }

    fn apply(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let pm = &ctx.plan.package_manager;
        let spec = CommandSpec::from_argv(&pm.installer)
            .ok_or_else(|| ProvisionError::plan("package manager installer is empty"))?
            .current_dir(ctx.workdir())
            .interactive();

        println!("Installing {}...", pm.binary);
        ctx.run(&spec, &format!("{} installer", pm.binary))
            .map_err(|e| ProvisionError::missing_prerequisite(&pm.binary, e.to_string()))
    }

    fn complete(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let binary = ctx.plan.package_manager.binary.as_str();
        if ctx.probe(&[binary]).has(binary) {
            Ok(())
        } else {
            Err(ProvisionError::missing_prerequisite(
                binary,
                "not found after installation",
            ))
        }
    }
}
