//! Stage 7: hand the terminal over to the fetched application.

use crate::command::CommandSpec;
use crate::error::{ProvisionError, Result};
use crate::progress::StageId;
use crate::runner::{Stage, StageContext};
use std::path::{Path, PathBuf};

pub struct LaunchStage;

/// How the application is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPoint {
    /// `<interpreter> -m <module>`
    Module(String),
    /// `<interpreter> <script>`
    Script(PathBuf),
}

/// Files whose presence means `module` can be run with `-m`
fn module_files(checkout: &Path, module: &str) -> Vec<PathBuf> {
    let relative: PathBuf = module.split('.').collect();
    vec![
        checkout.join(&relative).join("__main__.py"),
        checkout.join(relative).with_extension("py"),
    ]
}

/// Pick the primary invocation if its entry point exists, else the fallback
pub fn resolve_entry_point(ctx: &StageContext<'_>) -> Result<EntryPoint> {
    let launch = &ctx.plan.launch;
    let checkout = ctx.target_dir();

    if !launch.module.is_empty()
        && module_files(&checkout, &launch.module)
            .iter()
            .any(|path| ctx.host.path_exists(path))
    {
        return Ok(EntryPoint::Module(launch.module.clone()));
    }

    let script = checkout.join(&launch.fallback_script);
    if !launch.fallback_script.is_empty() && ctx.host.path_exists(&script) {
        tracing::info!(
            "Module {} unavailable, falling back to {}",
            launch.module,
            launch.fallback_script
        );
        return Ok(EntryPoint::Script(script));
    }

    Err(ProvisionError::missing_artifact(
        "application entry point",
        checkout,
    ))
}

impl Stage for LaunchStage {
    fn id(&self) -> StageId {
        StageId::Launch
    }

    fn apply(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        let runtime = ctx.runtime().cloned().ok_or_else(|| {
            ProvisionError::missing_artifact(
                "runtime environment",
                ctx.in_checkout(&ctx.plan.runtime.env_dir),
            )
        })?;
        let entry = resolve_entry_point(ctx)?;

        let active = runtime.activate();
        let base = CommandSpec::new(runtime.interpreter().to_string_lossy());
        let spec = match &entry {
            EntryPoint::Module(module) => base.args(["-m", module.as_str()]),
            EntryPoint::Script(script) => base.arg(script.to_string_lossy()),
        };
        let spec = active
            .command(spec)
            .current_dir(ctx.target_dir())
            .interactive();

        println!("Launching {}", spec);
        ctx.run(&spec, "application")
    }
}
