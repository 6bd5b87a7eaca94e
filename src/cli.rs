use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Bootstrapper - provision a workstation and launch the assistant application
#[derive(Parser, Debug)]
#[command(name = "bootstrapper")]
#[command(about = "Install prerequisites, fetch the application, configure secrets and launch it")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: evaluate every stage's check and report what would run.
    ///
    /// No installer, clone or dependency command is executed, no secret is
    /// prompted for and no file is written.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// JSON plan file; defaults to bootstrapper.json in the working directory
    #[arg(long, value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Directory the application is fetched into (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect or check provisioning plans
    Plan {
        #[command(subcommand)]
        action: PlanCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PlanCommands {
    /// Print the effective plan as JSON
    Show,
    /// Validate a plan file
    Validate {
        /// Path to the plan file to validate
        path: PathBuf,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }

    /// Default log filter for the requested verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
