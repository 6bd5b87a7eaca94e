//! The provisioning stages, one module per stage.
//!
//! Each struct implements `Stage`; `pipeline()` returns them in run order.

pub mod configure;
pub mod dependencies;
pub mod fetch;
pub mod launch;
pub mod package_manager;
pub mod runtime;
pub mod tools;

use crate::runner::Stage;

pub use configure::ConfigureStage;
pub use dependencies::DependenciesStage;
pub use fetch::FetchStage;
pub use launch::LaunchStage;
pub use package_manager::PackageManagerStage;
pub use runtime::RuntimeEnvironmentStage;
pub use tools::ToolsStage;

/// All stages in execution order
pub fn pipeline() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(PackageManagerStage),
        Box::new(ToolsStage),
        Box::new(FetchStage),
        Box::new(RuntimeEnvironmentStage),
        Box::new(DependenciesStage),
        Box::new(ConfigureStage),
        Box::new(LaunchStage),
    ]
}
