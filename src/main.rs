//! Bootstrapper - Main entry point
//!
//! Runs the provisioning pipeline, or one of the plan subcommands.

use anyhow::Context;
use bootstrapper::cli::{Cli, Commands, PlanCommands};
use bootstrapper::host::SystemHost;
use bootstrapper::plan::ProvisionPlan;
use bootstrapper::process_guard;
use bootstrapper::prompt::TerminalPrompter;
use bootstrapper::runner::{StageContext, StageRunner};
use bootstrapper::stages;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Initialize the logger; RUST_LOG overrides the verbosity flags
fn init_logger(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .init();
}

/// Read the plan at `path`, or the built-in one
fn read_plan(path: Option<&Path>) -> anyhow::Result<ProvisionPlan> {
    match path {
        Some(path) => {
            info!("Loading plan from: {:?}", path);
            ProvisionPlan::load_from_file(path)
        }
        None => Ok(ProvisionPlan::default()),
    }
}

fn load_plan(path: Option<&Path>) -> anyhow::Result<ProvisionPlan> {
    let plan = read_plan(path)?;
    plan.validate().context("Invalid plan")?;
    Ok(plan)
}

/// `--workdir`, defaulting to the current directory
fn resolve_workdir(cli: &Cli) -> PathBuf {
    match cli.workdir.clone().map_or_else(std::env::current_dir, Ok) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("✗ Cannot determine working directory: {}", e);
            std::process::exit(1);
        }
    }
}

/// `--plan`, else a plan file found in the working directory
fn plan_path(cli: &Cli, workdir: &Path) -> Option<PathBuf> {
    cli.plan.clone().or_else(|| ProvisionPlan::discover(workdir))
}

fn main() {
    let cli = Cli::parse_args();
    init_logger(cli.log_level());
    info!("Bootstrapper starting up");

    // Terminate in-flight tools if we are interrupted
    if let Err(e) = process_guard::init_signal_handlers() {
        tracing::warn!("Failed to initialize signal handlers: {}", e);
    }
    debug!("Signal handlers initialized");

    match &cli.command {
        Some(Commands::Plan {
            action: PlanCommands::Validate { path },
        }) => validate_plan(path),
        Some(Commands::Plan {
            action: PlanCommands::Show,
        }) => show_plan(&cli),
        None => run_pipeline(&cli),
    }
}

fn validate_plan(path: &Path) {
    info!("Validating plan file: {:?}", path);
    match load_plan(Some(path)) {
        Ok(_) => println!("✓ Plan file is valid: {}", path.display()),
        Err(e) => {
            error!("Plan validation failed: {:#}", e);
            eprintln!("✗ Plan validation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Print the effective plan without validating it, so an incomplete plan
/// can be inspected and saved as a starting point
fn show_plan(cli: &Cli) {
    let path = plan_path(cli, &resolve_workdir(cli));
    let rendered = read_plan(path.as_deref()).and_then(|plan| {
        serde_json::to_string_pretty(&plan).context("Failed to serialize plan to JSON")
    });
    match rendered {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("✗ {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run_pipeline(cli: &Cli) {
    let workdir = resolve_workdir(cli);
    let plan = match load_plan(plan_path(cli, &workdir).as_deref()) {
        Ok(plan) => plan,
        Err(e) => {
            error!("Failed to load plan: {:#}", e);
            eprintln!("✗ {:#}", e);
            std::process::exit(1);
        }
    };

    if cli.dry_run {
        println!("[DRY RUN] Checking stages only; nothing will be installed or written");
    }
    run_stages(&plan, workdir, cli.dry_run);
}

fn run_stages(plan: &ProvisionPlan, workdir: PathBuf, dry_run: bool) {
    let host = SystemHost;
    let mut prompter = TerminalPrompter::new();
    let mut ctx = StageContext::new(&host, &mut prompter, plan, workdir).with_dry_run(dry_run);

    let pipeline = stages::pipeline();
    match StageRunner::new().run_all(&pipeline, &mut ctx) {
        Ok(report) => {
            if !report.warnings.is_empty() {
                println!("Finished with {} warning(s)", report.warnings.len());
            }
            info!("Provisioning finished");
            println!("✓ Done");
        }
        Err(failure) => {
            error!("{}", failure);
            eprintln!("✗ {}", failure);
            std::process::exit(failure.exit_code());
        }
    }
}
